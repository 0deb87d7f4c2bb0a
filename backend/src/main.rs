mod classifier;
mod config;
mod error;
mod routes;
mod upload;

#[cfg(test)]
mod test_support;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use classifier::{Classifier, ModelHost, TorchModel};
use config::AppConfig;
use routes::{AppState, configure_routes};
use std::env;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| fatal("Invalid configuration", e))?;
    let input_spec = config
        .input_spec()
        .map_err(|e| fatal("Invalid configuration", e))?;
    let labels = config
        .label_table()
        .map_err(|e| fatal("Invalid configuration", e))?;

    // The model is loaded exactly once; nothing is served if this fails.
    let model = TorchModel::load(&config.model).map_err(|e| fatal("Model loading failed", e))?;
    log::info!("Loaded model: {}", model.describe());

    let classifier = Classifier::new(Arc::new(model), labels, input_spec);
    if config.model.verify_on_start {
        let width = classifier
            .verify_output_width()
            .map_err(|e| fatal("Model does not match the label table", e))?;
        log::info!("Model output width {} matches the label table", width);
    }

    let state = web::Data::new(AppState::new(classifier, config.server.max_upload_bytes));
    let static_dir = config.server.static_dir.clone();
    let static_dir = if static_dir.is_dir() {
        log::info!("Serving static files from {}", static_dir.display());
        Some(static_dir)
    } else {
        log::info!("No static directory at {}, API only", static_dir.display());
        None
    };
    let cors_max_age = config.server.cors_max_age;

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(cors_max_age),
            )
            .configure(|cfg| configure_routes(cfg, state.clone(), static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn fatal(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}
