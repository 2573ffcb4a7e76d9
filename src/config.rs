//! Studio configuration.

use crate::image::{AspectRatio, GenerationRequest, ImageFormat};
use std::path::PathBuf;

/// Environment variable overriding the gallery directory.
pub const GALLERY_DIR_ENV: &str = "GENSTUDIO_GALLERY_DIR";

/// Settings shared by the front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    /// Where the gallery file lives.
    pub gallery_dir: PathBuf,
    /// Images per generation when the user does not choose.
    pub default_count: u32,
    /// Aspect ratio when the user does not choose.
    pub default_aspect_ratio: AspectRatio,
    /// Output format for generated images.
    pub default_format: ImageFormat,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            gallery_dir: default_gallery_dir(),
            default_count: 1,
            default_aspect_ratio: AspectRatio::Square,
            default_format: ImageFormat::Jpeg,
        }
    }
}

impl StudioConfig {
    /// Defaults, with `GENSTUDIO_GALLERY_DIR` applied if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(GALLERY_DIR_ENV).filter(|d| !d.is_empty()) {
            config.gallery_dir = PathBuf::from(dir);
        }
        config
    }

    /// Sets the gallery directory.
    pub fn with_gallery_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.gallery_dir = dir.into();
        self
    }

    /// A generation request for `prompt` carrying the configured defaults.
    pub fn generation_request(&self, prompt: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(prompt)
            .with_count(self.default_count)
            .with_aspect_ratio(self.default_aspect_ratio)
            .with_format(self.default_format)
    }
}

fn default_gallery_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("genstudio")
}
