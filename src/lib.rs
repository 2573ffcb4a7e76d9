#![warn(missing_docs)]
//! genstudio - image studio core.
//!
//! Generate images from text, edit an uploaded image by instruction, chat
//! about an uploaded image, and keep results in a persisted gallery.
//!
//! # Quick Start
//!
//! ```no_run
//! use genstudio::{Command, FileStore, GalleryStore, GeminiProvider, Outcome, Studio};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let gemini = Arc::new(GeminiProvider::builder().build()?);
//!     let gallery = GalleryStore::load(FileStore::new("gallery"));
//!     let mut studio = Studio::new(gemini.clone(), gemini.clone(), gemini, gallery);
//!
//!     let request = genstudio::GenerationRequest::new("A golden retriever puppy");
//!     if let Outcome::Generated(items) = studio.dispatch(Command::Generate(request)).await? {
//!         println!("saved {} image(s)", items.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini` (default): Imagen/Gemini implementations of the services
//! - `cli`: the `genstudio` command-line front end

pub mod analyze;
pub mod chat;
pub mod config;
mod error;
pub mod gallery;
pub mod image;
pub mod storage;
pub mod studio;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(test)]
mod testing;

// Re-export error types at crate root
pub use error::{Result, StudioError};

pub use analyze::{
    AnalyzeSessions, PrimingOutcome, SessionState, SessionToken, SessionView, Speaker, Turn,
    TurnOutcome,
};
pub use chat::{ConversationService, SessionSeed};
pub use config::StudioConfig;
pub use gallery::{GalleryItem, GalleryKind, GalleryStore, GalleryView, NewGalleryItem};
pub use image::{
    AspectRatio, EditRequest, GeneratedImage, GenerationRequest, ImageEditor, ImageFormat,
    ImageGenerator, ImageGeneratorExt, UploadedImage,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use studio::{Command, Outcome, Studio, Tab};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiEditModel, GeminiProvider, GeminiProviderBuilder, ImagenModel};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, StudioError};
    pub use crate::gallery::{GalleryStore, NewGalleryItem};
    pub use crate::image::{GenerationRequest, ImageEditor, ImageGenerator, UploadedImage};
    pub use crate::storage::{FileStore, KeyValueStore};
    pub use crate::studio::{Command, Outcome, Studio};

    #[cfg(feature = "gemini")]
    pub use crate::gemini::GeminiProvider;
}
