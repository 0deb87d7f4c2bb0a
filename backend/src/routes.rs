use std::path::PathBuf;
use std::time::Instant;

use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::error::JsonPayloadError;
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use log::info;
use serde::Serialize;
use shared::{ClassifyRequest, ClassifyResponse};
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::error::ApiError;
use crate::upload::{self, UploadError};

/// Process-wide state handed to every handler.
pub struct AppState {
    pub classifier: Classifier,
    pub max_upload_bytes: usize,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(classifier: Classifier, max_upload_bytes: usize) -> Self {
        Self {
            classifier,
            max_upload_bytes,
            started_at: Utc::now(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    labels: usize,
    started_at: DateTime<Utc>,
}

pub fn configure_routes(
    cfg: &mut web::ServiceConfig,
    state: web::Data<AppState>,
    static_dir: Option<PathBuf>,
) {
    // base64 inflates uploads by a third
    let json_limit = state.max_upload_bytes / 3 * 4 + 1024;
    let json_config = web::JsonConfig::default()
        .limit(json_limit)
        .error_handler(|err, _req| {
            let upload_error = match err {
                JsonPayloadError::OverflowKnownLength { length, limit } => UploadError::TooLarge {
                    size: length,
                    limit,
                },
                JsonPayloadError::Overflow { limit } => UploadError::ExceedsLimit { limit },
                other => UploadError::MalformedBody(other.to_string()),
            };
            ApiError::from(upload_error).into()
        });

    cfg.app_data(state)
        .app_data(json_config)
        .service(web::resource("/api/classify").route(web::post().to(classify_upload)))
        .service(web::resource("/api/classify/base64").route(web::post().to(classify_base64)))
        .service(web::resource("/api/labels").route(web::get().to(list_labels)))
        .service(web::resource("/api/health").route(web::get().to(health)));

    if let Some(dir) = static_dir {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

async fn classify_upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let image = read_image_field(&mut payload, state.max_upload_bytes).await?;
    classify(state, image).await
}

async fn classify_base64(
    state: web::Data<AppState>,
    request: web::Json<ClassifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let image = upload::decode_base64(&request.image_data)?;
    classify(state, image).await
}

/// Picks the field named `image`, or the first non-empty field otherwise.
async fn read_image_field(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>, UploadError> {
    let mut fallback: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| UploadError::MalformedBody(e.to_string()))?
    {
        let is_image = field.name() == Some("image");
        let mime = field.content_type().map(|m| m.essence_str().to_string());

        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| UploadError::MalformedBody(e.to_string()))?;
            let size = image_data.len() + data.len();
            if size > limit {
                return Err(UploadError::TooLarge { size, limit });
            }
            image_data.extend_from_slice(&data);
        }

        if is_image {
            upload::check_media_type(mime.as_deref())?;
            return Ok(image_data);
        }
        if fallback.is_none() && !image_data.is_empty() {
            fallback = Some((mime, image_data));
        }
    }

    let (mime, image_data) = fallback.ok_or(UploadError::MissingImage)?;
    upload::check_media_type(mime.as_deref())?;
    Ok(image_data)
}

async fn classify(state: web::Data<AppState>, image: Vec<u8>) -> Result<HttpResponse, ApiError> {
    upload::validate_size(&image, state.max_upload_bytes)?;

    let id = Uuid::new_v4();
    let image_hash = upload::image_hash(&image);
    let started = Instant::now();

    let classifier = state.classifier.clone();
    let prediction = web::block(move || classifier.predict(&image))
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))??;

    info!(
        "Request {} classified image {} as {} ({:.3}) in {:?}",
        id,
        image_hash,
        prediction.label,
        prediction.confidence,
        started.elapsed()
    );

    Ok(HttpResponse::Ok().json(ClassifyResponse {
        id,
        label: prediction.label,
        class_index: prediction.class_index,
        confidence: prediction.confidence,
        scores: prediction.scores,
        class_labels: state.classifier.labels().names(),
        image_hash,
    }))
}

async fn list_labels(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.classifier.labels().entries())
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        model: state.classifier.describe_model(),
        labels: state.classifier.labels().len(),
        started_at: state.started_at,
    })
}
