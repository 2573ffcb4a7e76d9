//! Gemini API (Google) implementations of the image and chat services.
//!
//! One [`GeminiProvider`] covers all three surfaces:
//! - text-to-image through Imagen (`:predict`),
//! - instruction edits through a Gemini image model (`:generateContent`),
//! - image-grounded chat through a Gemini text model (`:generateContent`).

mod chat;
mod image;
mod wire;

pub use chat::GeminiChatHandle;

use crate::error::{parse_retry_after, sanitize_error_message, Result, StudioError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Imagen model variants used for generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImagenModel {
    /// Imagen 4 (balanced).
    #[default]
    Imagen4,
    /// Imagen 4 Fast.
    Imagen4Fast,
    /// Imagen 4 Ultra.
    Imagen4Ultra,
}

impl ImagenModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imagen4 => "imagen-4.0-generate-001",
            Self::Imagen4Fast => "imagen-4.0-fast-generate-001",
            Self::Imagen4Ultra => "imagen-4.0-ultra-generate-001",
        }
    }
}

/// Gemini image model variants used for edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiEditModel {
    /// Nano Banana - Gemini 2.5 Flash Image.
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image.
    NanoBananaPro,
}

impl GeminiEditModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }
}

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

/// Builder for [`GeminiProvider`].
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    image_model: ImagenModel,
    edit_model: GeminiEditModel,
    chat_model: Option<String>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL (for proxies and tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the generation model.
    pub fn image_model(mut self, model: ImagenModel) -> Self {
        self.image_model = model;
        self
    }

    /// Sets the edit model.
    pub fn edit_model(mut self, model: GeminiEditModel) -> Self {
        self.edit_model = model;
        self
    }

    /// Sets the chat model identifier.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                StudioError::Auth(
                    "GOOGLE_API_KEY not set and no API key provided".into(),
                )
            })?;

        Ok(GeminiProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            image_model: self.image_model,
            edit_model: self.edit_model,
            chat_model: self
                .chat_model
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        })
    }
}

/// Gemini API client implementing generation, editing, and chat.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    image_model: ImagenModel,
    edit_model: GeminiEditModel,
    chat_model: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// POSTs `body` and decodes a successful JSON response.
    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        tracing::debug!(%url, "sending Gemini request");
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }
        Ok(response.json().await?)
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> StudioError {
    let text = sanitize_error_message(text);
    if status == 404 {
        return StudioError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return StudioError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return StudioError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return StudioError::ContentBlocked(text);
    }
    StudioError::Api {
        status,
        message: text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_model_ids() {
        assert_eq!(ImagenModel::default().as_str(), "imagen-4.0-generate-001");
        assert_eq!(
            GeminiEditModel::default().as_str(),
            "gemini-2.5-flash-image"
        );
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .base_url("http://localhost:9999/v1beta/")
            .chat_model("gemini-2.5-pro")
            .build()
            .unwrap();
        assert_eq!(provider.chat_model, "gemini-2.5-pro");
        assert_eq!(
            provider.endpoint("m", "predict"),
            "http://localhost:9999/v1beta/models/m:predict"
        );
    }

    #[test]
    fn test_builder_rejects_blank_key() {
        let result = GeminiProviderBuilder::new().api_key("  ").build();
        assert!(matches!(result, Err(StudioError::Auth(_))));
    }

    #[test]
    fn test_parse_error_mapping() {
        let empty = HeaderMap::new();
        assert!(matches!(
            parse_error(401, "bad key", &empty),
            StudioError::Auth(_)
        ));
        assert!(matches!(
            parse_error(404, "", &empty),
            StudioError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(400, "request blocked by safety filters", &empty),
            StudioError::ContentBlocked(_)
        ));
        assert!(matches!(
            parse_error(500, "oops", &empty),
            StudioError::Api { status: 500, .. }
        ));

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        match parse_error(429, "", &headers) {
            StudioError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(7)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
