use std::env;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_PROMPT: &str = "You are a meticulous cleaning assistant. Look at this photo of a room \
and identify every source of mess or clutter you can see. Respond with JSON in the form \
{\"tasks\": [{\"mess\": \"<short description>\", \"reason\": \"<why it needs attention>\"}]} \
and nothing else.";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("Unknown or unsupported AI provider: {0}")]
    UnknownProvider(String),
    #[error("{0} API key is not configured")]
    MissingCredential(&'static str),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Application configuration, loaded once at startup and read-only for the
/// lifetime of the pipeline.
#[derive(Clone)]
pub struct AppConfig {
    pub ai_provider: String,
    pub ai_model: String,
    pub ai_api_key: Option<String>,
    /// Base URL override for the provider API, mainly for proxies.
    pub ai_api_endpoint: Option<String>,
    pub ai_prompt: String,
    pub max_image_size_mb: usize,
    pub max_image_dimension: u32,
    pub high_risk_dimension: u32,
    pub max_history_items: usize,
    pub request_timeout_secs: u64,
    pub openai_max_tokens: u32,
    pub history_file: Option<PathBuf>,
    pub port: u16,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("ai_provider", &self.ai_provider)
            .field("ai_model", &self.ai_model)
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "***"))
            .field("ai_api_endpoint", &self.ai_api_endpoint)
            .field("max_image_size_mb", &self.max_image_size_mb)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("high_risk_dimension", &self.high_risk_dimension)
            .field("max_history_items", &self.max_history_items)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("openai_max_tokens", &self.openai_max_tokens)
            .field("history_file", &self.history_file)
            .field("port", &self.port)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. `from_env`
    /// plugs in the process environment; tests use a map.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ai_provider = lookup("AI_PROVIDER")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("AI_PROVIDER"))?;
        let ai_model = lookup("AI_MODEL")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("AI_MODEL"))?;
        let ai_api_key = lookup("AI_API_KEY").filter(|v| !v.is_empty());
        let ai_api_endpoint = lookup("AI_API_ENDPOINT").filter(|v| !v.is_empty());
        let ai_prompt = lookup("AI_PROMPT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

        Ok(Self {
            ai_provider,
            ai_model,
            ai_api_key,
            ai_api_endpoint,
            ai_prompt,
            max_image_size_mb: parse_or(&lookup, "MAX_IMAGE_SIZE_MB", 10)?,
            max_image_dimension: parse_or(&lookup, "MAX_IMAGE_DIMENSION", 1024)?,
            high_risk_dimension: parse_or(&lookup, "HIGH_RISK_DIMENSION", 8000)?,
            max_history_items: parse_or(&lookup, "MAX_HISTORY_ITEMS", 50)?,
            request_timeout_secs: parse_or(&lookup, "AI_REQUEST_TIMEOUT_SECS", 60)?,
            openai_max_tokens: parse_or(&lookup, "OPENAI_MAX_TOKENS", 1000)?,
            history_file: lookup("HISTORY_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            port: parse_or(&lookup, "PORT", 8000)?,
        })
    }

    pub fn max_image_size_bytes(&self) -> usize {
        self.max_image_size_mb * 1024 * 1024
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
