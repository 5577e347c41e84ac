mod ai;
mod analysis;
mod config;
mod error;
mod history;
mod imaging;
mod routes;

use std::io;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};

use ai::{AiProvider as _, create_provider};
use analysis::AnalysisService;
use config::AppConfig;
use history::HistoryService;
use routes::configure_routes;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    log::info!("Loaded configuration: {config:?}");

    let provider = create_provider(&config).map_err(|e| {
        log::error!("Failed to initialize AI provider: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    log::info!(
        "AI service initialized with provider: {}, model: {}",
        provider.name(),
        config.ai_model
    );

    let history_service = match &config.history_file {
        Some(path) => {
            log::info!("History persisted to {}", path.display());
            HistoryService::with_persistence(config.max_history_items, path)
                .await
                .map_err(|e| {
                    log::error!("Failed to load history file: {e}");
                    io::Error::other(e.to_string())
                })?
        }
        None => HistoryService::new(config.max_history_items),
    };

    let analysis_service = web::Data::new(AnalysisService::new(&config, provider));
    let history_service = web::Data::new(history_service);
    let config_data = web::Data::new(config.clone());

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(analysis_service.clone())
            .app_data(history_service.clone())
            .app_data(config_data.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
