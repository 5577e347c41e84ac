use actix_web::web;
use chrono::Utc;
use futures_util::Stream;
use log::info;
use shared::{AnalysisResult, ProviderHealth};

use crate::ai::{AiProvider, prompt, response_parser};
use crate::analysis::score;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::imaging::ImageService;

/// Runs the full analysis pipeline for one upload: bounded ingestion,
/// prompt sanitization, the provider call, response parsing, and score
/// derivation. Stages execute strictly in that order; errors cross this
/// boundary unmodified.
pub struct AnalysisService {
    image_service: ImageService,
    provider: Box<dyn AiProvider>,
    raw_prompt: String,
    model: String,
}

impl AnalysisService {
    pub fn new(config: &AppConfig, provider: Box<dyn AiProvider>) -> Self {
        Self {
            image_service: ImageService::new(config),
            provider,
            raw_prompt: config.ai_prompt.clone(),
            model: config.ai_model.clone(),
        }
    }

    pub async fn analyze<S, E>(
        &self,
        stream: S,
        declared_content_type: &str,
    ) -> Result<AnalysisResult, AppError>
    where
        S: Stream<Item = Result<web::Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        info!(
            "Analyzing room with provider: {}, model: {}",
            self.provider.name(),
            self.model
        );

        let image = self
            .image_service
            .ingest(stream, declared_content_type)
            .await?;
        let sanitized_prompt = prompt::clean(&self.raw_prompt);
        let raw_text = self.provider.analyze(&image, &sanitized_prompt).await?;
        let tasks = response_parser::parse(&raw_text)?;
        let cleanliness_score = score::cleanliness_score(&tasks);

        let now = Utc::now();
        let result = AnalysisResult {
            id: format!("analysis-{}", now.timestamp_millis()),
            timestamp: now,
            tasks,
            cleanliness_score,
        };
        info!(
            "Analysis {} found {} tasks, score {}",
            result.id,
            result.tasks.len(),
            result.cleanliness_score
        );
        Ok(result)
    }

    pub async fn health_check(&self) -> ProviderHealth {
        self.provider.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiError;
    use crate::history::HistoryService;
    use crate::imaging::ProcessedImage;
    use async_trait::async_trait;
    use futures::stream;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::convert::Infallible;
    use std::io::Cursor;

    struct StubProvider {
        response: String,
    }

    #[async_trait]
    impl AiProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn analyze(
            &self,
            _image: &ProcessedImage,
            _prompt: &str,
        ) -> Result<String, AiError> {
            Ok(self.response.clone())
        }

        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth::ok(self.name())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig::from_source(|key| match key {
            "AI_PROVIDER" => Some("openai".to_string()),
            "AI_MODEL" => Some("test-model".to_string()),
            "AI_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn jpeg_upload(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 120, 90]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .unwrap();
        buffer
    }

    #[actix_web::test]
    async fn a_valid_upload_flows_end_to_end_into_history() {
        let service = AnalysisService::new(
            &test_config(),
            Box::new(StubProvider {
                response: r#"{"tasks":[{"mess":"clothes on floor","reason":"untidy"}]}"#
                    .to_string(),
            }),
        );
        let history = HistoryService::new(50);

        let upload = jpeg_upload(200, 200);
        let stream = stream::iter(vec![Ok::<_, Infallible>(web::Bytes::from(upload))]);
        let result = service.analyze(stream, "image/jpeg").await.unwrap();

        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].mess, "clothes on floor");
        assert_eq!(result.cleanliness_score, 90);

        history.append(result.clone()).await.unwrap();
        let entries = history.list().await;
        assert_eq!(entries[0].id, result.id);
    }

    #[actix_web::test]
    async fn an_unparseable_provider_response_surfaces_as_an_ai_error() {
        let service = AnalysisService::new(
            &test_config(),
            Box::new(StubProvider {
                response: "not useful at all".to_string(),
            }),
        );

        let upload = jpeg_upload(50, 50);
        let stream = stream::iter(vec![Ok::<_, Infallible>(web::Bytes::from(upload))]);
        let result = service.analyze(stream, "image/jpeg").await;
        assert!(matches!(result, Err(AppError::Ai(AiError::Unparseable(_)))));
    }

    #[actix_web::test]
    async fn an_empty_task_list_scores_a_clean_room() {
        let service = AnalysisService::new(
            &test_config(),
            Box::new(StubProvider {
                response: r#"{"tasks":[]}"#.to_string(),
            }),
        );

        let upload = jpeg_upload(50, 50);
        let stream = stream::iter(vec![Ok::<_, Infallible>(web::Bytes::from(upload))]);
        let result = service.analyze(stream, "image/jpeg").await.unwrap();
        assert!(result.tasks.is_empty());
        assert_eq!(result.cleanliness_score, 100);
    }
}
