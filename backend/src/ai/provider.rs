use async_trait::async_trait;
use shared::ProviderHealth;

use crate::ai::gemini_provider::GeminiProvider;
use crate::ai::openai_provider::OpenAiProvider;
use crate::config::{AppConfig, ConfigError};
use crate::imaging::ProcessedImage;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),
    #[error("Unexpected provider response: {0}")]
    ApiResponse(String),
    #[error("AI provider request failed: {0}")]
    Provider(String),
    #[error("{0}")]
    Unparseable(String),
}

impl AiError {
    pub(crate) fn unexpected_format() -> Self {
        AiError::Unparseable("AI response is not in the expected format.".to_string())
    }
}

/// A multimodal AI backend capable of describing the mess in a room photo.
///
/// `analyze` returns the provider's raw text; parsing it into tasks is the
/// response parser's job. `health_check` never fails; problems are folded
/// into the returned status. No retries happen at this layer.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, image: &ProcessedImage, prompt: &str) -> Result<String, AiError>;

    async fn health_check(&self) -> ProviderHealth;
}

/// Selects a provider from the explicit `AI_PROVIDER` identifier. Model
/// names play no part in dispatch; an unrecognized identifier is a
/// configuration error, not a guessed default.
pub fn create_provider(config: &AppConfig) -> Result<Box<dyn AiProvider>, ConfigError> {
    match config.ai_provider.to_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        "google" => Ok(Box::new(GeminiProvider::new(config)?)),
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}
