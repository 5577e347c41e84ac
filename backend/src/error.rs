use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::ai::AiError;
use crate::config::ConfigError;
use crate::history::HistoryError;
use crate::imaging::ImageError;

/// Domain errors crossing the HTTP boundary. Every pipeline stage raises
/// the most specific variant; the mapping to status codes happens only
/// here, and the caller always gets a structured body without internals.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("Invalid multipart payload: {0}")]
    Multipart(String),
}

impl AppError {
    fn error_name(&self) -> &'static str {
        match self {
            AppError::Image(ImageError::Validation(_)) => "ImageValidationError",
            AppError::Image(ImageError::TooLarge { .. }) => "ImageTooLargeError",
            AppError::Image(ImageError::Processing(_)) => "ImageProcessingError",
            AppError::Image(ImageError::Upload(_)) => "UploadError",
            AppError::Ai(AiError::InvalidApiKey(_)) => "InvalidAPIKeyError",
            AppError::Ai(AiError::ApiResponse(_)) => "APIResponseError",
            AppError::Ai(AiError::Provider(_)) => "AIProviderError",
            AppError::Ai(AiError::Unparseable(_)) => "AIError",
            AppError::Config(_) => "ConfigError",
            AppError::History(_) => "HistoryError",
            AppError::Multipart(_) => "MultipartError",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Image(ImageError::Validation(_))
            | AppError::Image(ImageError::Upload(_))
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Image(ImageError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Image(ImageError::Processing(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Ai(AiError::InvalidApiKey(_))
            | AppError::Ai(AiError::ApiResponse(_))
            | AppError::Ai(AiError::Unparseable(_)) => StatusCode::BAD_GATEWAY,
            AppError::Ai(AiError::Provider(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.error_name(),
            "message": self.to_string(),
        }))
    }
}
