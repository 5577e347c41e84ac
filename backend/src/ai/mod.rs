pub mod gemini_provider;
pub mod openai_provider;
pub mod prompt;
pub mod provider;
pub mod response_parser;

pub use provider::{AiError, AiProvider, create_provider};
