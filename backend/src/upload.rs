use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use shared::ImageKind;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload is empty")]
    Empty,
    #[error("no image found in the request")]
    MissingImage,
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("upload exceeds the {limit} byte limit")]
    ExceedsLimit { limit: usize },
    #[error("unsupported media type {0}, expected JPEG or PNG")]
    UnsupportedMediaType(String),
    #[error("image_data is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("malformed data URL: {0}")]
    InvalidDataUrl(&'static str),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

pub fn image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

pub fn validate_size(image_data: &[u8], limit: usize) -> Result<(), UploadError> {
    if image_data.is_empty() {
        return Err(UploadError::Empty);
    }
    if image_data.len() > limit {
        return Err(UploadError::TooLarge {
            size: image_data.len(),
            limit,
        });
    }
    Ok(())
}

/// Checks a declared media type. Unlabelled uploads are left to content
/// sniffing during decoding.
pub fn check_media_type(mime: Option<&str>) -> Result<Option<ImageKind>, UploadError> {
    match mime.map(str::trim) {
        None | Some("") | Some("application/octet-stream") => Ok(None),
        Some(mime) => ImageKind::from_mime(mime)
            .map(Some)
            .ok_or_else(|| UploadError::UnsupportedMediaType(mime.to_string())),
    }
}

/// Decodes plain base64 or a `data:<mime>;base64,<payload>` URL.
pub fn decode_base64(image_data: &str) -> Result<Vec<u8>, UploadError> {
    let payload = match image_data.trim().strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or(UploadError::InvalidDataUrl("missing payload"))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or(UploadError::InvalidDataUrl("only base64 data URLs are supported"))?;
            check_media_type(Some(mime))?;
            payload
        }
        None => image_data.trim(),
    };
    Ok(STANDARD.decode(payload)?)
}
