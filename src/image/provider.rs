//! Image service traits and utilities.

use crate::error::Result;
use crate::image::types::{EditRequest, GeneratedImage, GenerationRequest};
use async_trait::async_trait;

/// Text-to-image generation service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates `request.count` images from the request's prompt.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>>;

    /// Returns the name of this service for display.
    fn name(&self) -> &str;
}

/// Instruction-driven image editing service.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Edits the request's image.
    ///
    /// `Ok(None)` means the service answered but produced no image, which is
    /// a different failure from an `Err`.
    async fn edit(&self, request: &EditRequest) -> Result<Option<GeneratedImage>>;
}

/// Extension trait for generators with retry logic.
#[async_trait]
pub trait ImageGeneratorExt: ImageGenerator {
    /// Generates with automatic retries on transient failures.
    async fn generate_with_retries(
        &self,
        request: &GenerationRequest,
        max_retries: u32,
    ) -> Result<Vec<GeneratedImage>> {
        let mut attempt = 0;
        loop {
            match self.generate(request).await {
                Ok(images) => return Ok(images),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T: ImageGenerator> ImageGeneratorExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StudioError;
    use crate::testing::ScriptedGenerator;

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let generator = ScriptedGenerator::new(vec![
            Err(StudioError::RateLimited { retry_after: None }),
            Ok(1),
        ]);
        let images = generator
            .generate_with_retries(&GenerationRequest::new("a cat"), 2)
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_permanent_errors() {
        let generator = ScriptedGenerator::new(vec![
            Err(StudioError::Auth("nope".into())),
            Ok(1),
        ]);
        let result = generator
            .generate_with_retries(&GenerationRequest::new("a cat"), 3)
            .await;
        assert!(matches!(result, Err(StudioError::Auth(_))));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let generator = ScriptedGenerator::new(vec![
            Err(StudioError::RateLimited { retry_after: None }),
            Err(StudioError::RateLimited { retry_after: None }),
            Ok(1),
        ]);
        let result = generator
            .generate_with_retries(&GenerationRequest::new("a cat"), 1)
            .await;
        assert!(matches!(result, Err(StudioError::RateLimited { .. })));
        assert_eq!(generator.calls(), 2);
    }
}
