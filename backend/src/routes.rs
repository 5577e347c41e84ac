use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use futures::TryStreamExt;
use log::info;
use serde_json::json;

use crate::analysis::AnalysisService;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::history::HistoryService;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/analyze").route(web::post().to(analyze_room)))
        .service(
            web::resource("/api/history")
                .route(web::get().to(get_history))
                .route(web::delete().to(clear_history)),
        )
        .service(web::resource("/api/health").route(web::get().to(health_check)))
        .service(web::resource("/api/config").route(web::get().to(get_client_config)));
}

async fn analyze_room(
    analysis_service: web::Data<AnalysisService>,
    history_service: web::Data<HistoryService>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    info!("Received request for room analysis");

    while let Ok(Some(field)) = payload.try_next().await {
        let declared_content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_default();

        let result = analysis_service
            .analyze(field, &declared_content_type)
            .await?;
        history_service.append(result.clone()).await?;

        return Ok(HttpResponse::Ok().json(result));
    }

    Err(AppError::Multipart(
        "no file field in multipart payload".to_string(),
    ))
}

async fn get_history(history_service: web::Data<HistoryService>) -> HttpResponse {
    let entries = history_service.list().await;
    info!("Retrieving {} history entries", entries.len());
    HttpResponse::Ok().json(entries)
}

async fn clear_history(
    history_service: web::Data<HistoryService>,
) -> Result<HttpResponse, AppError> {
    history_service.clear().await?;
    Ok(HttpResponse::Ok().json(json!({"message": "History cleared successfully."})))
}

async fn health_check(analysis_service: web::Data<AnalysisService>) -> HttpResponse {
    let ai_health = analysis_service.health_check().await;
    let status = if ai_health.is_ok() { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(json!({
        "status": status,
        "service": "AI Room Cleaner",
        "timestamp": Utc::now().to_rfc3339(),
        "dependencies": {
            "ai_service": ai_health,
        },
    }))
}

/// Non-secret runtime configuration for clients; the credential never
/// leaves the process.
async fn get_client_config(config: web::Data<AppConfig>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "ai_provider": config.ai_provider,
        "ai_model": config.ai_model,
        "max_image_size_mb": config.max_image_size_mb,
        "max_image_dimension": config.max_image_dimension,
    }))
}
