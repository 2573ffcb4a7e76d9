//! Image generation and editing.

mod provider;
mod types;

pub use provider::{ImageEditor, ImageGenerator, ImageGeneratorExt};
pub use types::{
    decode_data_url, AspectRatio, EditRequest, GeneratedImage, GenerationMetadata,
    GenerationRequest, ImageFormat, UploadedImage, MAX_IMAGES_PER_REQUEST,
};
