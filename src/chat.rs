//! Conversational service trait.

use crate::error::Result;
use crate::image::UploadedImage;
use async_trait::async_trait;

/// Content a new conversation is seeded with before any turn is sent.
#[derive(Debug, Clone)]
pub struct SessionSeed {
    /// The image the conversation is about.
    pub image: UploadedImage,
    /// Instruction sent alongside the image.
    pub instruction: String,
}

/// A chat-capable service that keeps per-conversation context.
///
/// The handle is opaque to callers. Whoever created it owns it, and dropping
/// it abandons the conversation.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Opaque reference to one conversation.
    type Handle: Send + Sync + 'static;

    /// Starts a conversation seeded with `seed`.
    async fn create_session(&self, seed: &SessionSeed) -> Result<Self::Handle>;

    /// Sends one user turn and returns the model's reply text.
    async fn send_turn(&self, handle: &Self::Handle, text: &str) -> Result<String>;
}
