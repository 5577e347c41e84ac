use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, error, warn};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use shared::ProviderHealth;

use crate::ai::openai_provider::transport_error;
use crate::ai::provider::{AiError, AiProvider};
use crate::config::{AppConfig, ConfigError};
use crate::imaging::ProcessedImage;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiProvider {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .ai_api_key
            .clone()
            .ok_or(ConfigError::MissingCredential("Google"))?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            api_base: config
                .ai_api_endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: config.ai_model.clone(),
        })
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn analyze(&self, image: &ProcessedImage, prompt: &str) -> Result<String, AiError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: ProcessedImage::MIME_TYPE,
                            data: BASE64.encode(&image.bytes),
                        },
                    },
                ],
            }],
        };

        let response = self
            .http_client
            .post(format!(
                "{}/models/{}:generateContent",
                self.api_base, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AiError::InvalidApiKey(
                "Google API key is invalid or has insufficient permissions.".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Gemini reports a bad key as a 400 with an explanatory message.
            if status == StatusCode::BAD_REQUEST && body.contains("API key not valid") {
                return Err(AiError::InvalidApiKey(
                    "Google API key is invalid.".to_string(),
                ));
            }
            error!("Gemini API returned {status}: {body}");
            return Err(AiError::Provider(format!("Gemini API returned {status}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::ApiResponse(format!("malformed Gemini response: {e}")))?;

        if parsed.candidates.is_empty() {
            if let Some(reason) = parsed
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
            {
                warn!("Gemini blocked the request: {reason}");
                return Err(AiError::ApiResponse(format!(
                    "content blocked by Gemini safety filter: {reason}"
                )));
            }
            return Err(AiError::ApiResponse(
                "Gemini returned no candidates.".to_string(),
            ));
        }

        let content: String = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect();

        if content.trim().is_empty() {
            return Err(AiError::ApiResponse(
                "Gemini returned a response with no text content.".to_string(),
            ));
        }

        debug!("Raw Gemini response: {content}");
        Ok(content)
    }

    async fn health_check(&self) -> ProviderHealth {
        let result = self
            .http_client
            .get(format!("{}/models", self.api_base))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => ProviderHealth::ok(self.name()),
            Ok(response) => ProviderHealth::error(
                self.name(),
                format!("Gemini API returned {}", response.status()),
            ),
            Err(e) => ProviderHealth::error(self.name(), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_inline_data_parts() {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: "prompt" },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: "AAAA".to_string(),
                        },
                    },
                ],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
    }

    #[test]
    fn candidate_text_deserializes_across_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#,
        )
        .unwrap();
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();
        assert_eq!(text, "ab");
    }

    #[test]
    fn block_reason_deserializes() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#,
        )
        .unwrap();
        assert!(parsed.candidates.is_empty());
        assert_eq!(
            parsed.prompt_feedback.unwrap().block_reason.as_deref(),
            Some("SAFETY")
        );
    }
}
