//! Image-grounded chat over Gemini `generateContent`.

use super::wire::{is_safety_finish, Content, GenerateContentRequest, GenerateContentResponse, Part};
use super::GeminiProvider;
use crate::chat::{ConversationService, SessionSeed};
use crate::error::{Result, StudioError};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// Conversation state for one Gemini chat.
///
/// The API is stateless, so the handle carries the history that is replayed
/// with every turn.
#[derive(Debug)]
pub struct GeminiChatHandle {
    contents: Mutex<Vec<Content>>,
}

impl GeminiChatHandle {
    fn seeded(seed: &SessionSeed) -> Self {
        Self {
            contents: Mutex::new(vec![Content::user(vec![
                Part::inline(seed.image.mime_type.clone(), seed.image.to_base64()),
                Part::text(seed.instruction.clone()),
            ])]),
        }
    }

    fn history(&self) -> Vec<Content> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, user: Content, model: Content) {
        let mut contents = self.contents.lock().unwrap_or_else(PoisonError::into_inner);
        contents.push(user);
        contents.push(model);
    }

    /// Number of recorded contents, seed included.
    pub fn len(&self) -> usize {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nothing has been recorded (never the case once seeded).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn reply_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(message) = response.block_message() {
        return Err(StudioError::ContentBlocked(message));
    }
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| StudioError::UnexpectedResponse("No candidates in Gemini response".into()))?;
    if let Some(reason) = candidate.finish_reason.as_deref() {
        if is_safety_finish(reason) {
            return Err(StudioError::ContentBlocked(format!(
                "Reply blocked by Gemini safety filter: {reason}"
            )));
        }
    }
    Ok(candidate
        .content
        .into_iter()
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait]
impl ConversationService for GeminiProvider {
    type Handle = GeminiChatHandle;

    async fn create_session(&self, seed: &SessionSeed) -> Result<GeminiChatHandle> {
        Ok(GeminiChatHandle::seeded(seed))
    }

    async fn send_turn(&self, handle: &GeminiChatHandle, text: &str) -> Result<String> {
        let user = Content::user(vec![Part::text(text)]);
        let mut contents = handle.history();
        contents.push(user.clone());

        let url = self.endpoint(&self.chat_model, "generateContent");
        let body = GenerateContentRequest {
            contents: &contents,
            generation_config: None,
        };
        let response: GenerateContentResponse = self.post_json(&url, &body).await?;
        let reply = reply_text(response)?;

        handle.record(user, Content::model_text(reply.clone()));
        tracing::debug!(turns = handle.len(), "Gemini chat turn complete");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::UploadedImage;

    fn seed() -> SessionSeed {
        SessionSeed {
            image: UploadedImage::new(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0]),
            instruction: "Confirm".into(),
        }
    }

    #[test]
    fn test_handle_is_seeded_with_image_then_instruction() {
        let handle = GeminiChatHandle::seeded(&seed());
        let history = handle.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role.as_deref(), Some("user"));
        let parts = &history[0].parts;
        assert_eq!(
            parts[0].inline_data.as_ref().map(|d| d.mime_type.as_str()),
            Some("image/png")
        );
        assert_eq!(parts[1].text.as_deref(), Some("Confirm"));
    }

    #[test]
    fn test_record_appends_both_sides() {
        let handle = GeminiChatHandle::seeded(&seed());
        handle.record(
            Content::user(vec![Part::text("hi")]),
            Content::model_text("hello"),
        );
        let history = handle.history();
        assert_eq!(handle.len(), 3);
        assert_eq!(history[2].role.as_deref(), Some("model"));
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A red "}, {"text": "car."}]},
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(reply_text(resp).unwrap(), "A red car.");
    }

    #[test]
    fn test_reply_text_errors() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            reply_text(resp),
            Err(StudioError::UnexpectedResponse(_))
        ));

        let resp: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(matches!(reply_text(resp), Err(StudioError::ContentBlocked(_))));
    }
}
