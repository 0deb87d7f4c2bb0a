use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorBody;

use crate::classifier::InferenceError;
use crate::upload::UploadError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("inference worker failed: {0}")]
    Worker(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Inference(InferenceError::InvalidImage(_)) => "invalid_image",
            ApiError::Inference(InferenceError::IndexOutOfRange { .. }) => "label_mismatch",
            ApiError::Inference(InferenceError::Model(_)) | ApiError::Worker(_) => {
                "inference_failed"
            }
            ApiError::Upload(UploadError::Empty | UploadError::MissingImage) => "missing_image",
            ApiError::Upload(UploadError::TooLarge { .. } | UploadError::ExceedsLimit { .. }) => {
                "payload_too_large"
            }
            ApiError::Upload(UploadError::UnsupportedMediaType(_)) => "unsupported_media_type",
            ApiError::Upload(
                UploadError::InvalidBase64(_)
                | UploadError::InvalidDataUrl(_)
                | UploadError::MalformedBody(_),
            ) => "bad_request",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Inference(InferenceError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(UploadError::TooLarge { .. } | UploadError::ExceedsLimit { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Upload(UploadError::UnsupportedMediaType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }

        HttpResponse::build(status).json(ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        })
    }
}
