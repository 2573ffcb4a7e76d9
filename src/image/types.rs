//! Core types for image generation and editing.

use crate::error::{Result, StudioError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum number of images a single generation request may ask for.
pub const MAX_IMAGES_PER_REQUEST: u32 = 4;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    #[default]
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Maps a MIME type reported by a service back to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Aspect ratios accepted by the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 landscape.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 standard landscape.
    #[serde(rename = "4:3")]
    Standard,
    /// 3:4 standard portrait.
    #[serde(rename = "3:4")]
    StandardPortrait,
}

impl AspectRatio {
    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1:1" => Ok(Self::Square),
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            "4:3" => Ok(Self::Standard),
            "3:4" => Ok(Self::StandardPortrait),
            other => Err(StudioError::InvalidRequest(format!(
                "unsupported aspect ratio: {other}"
            ))),
        }
    }
}

/// An image supplied by the user, for editing or analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime_type: String,
    /// Display name (usually the file name).
    pub name: Option<String>,
}

impl UploadedImage {
    /// Wraps raw bytes, detecting the MIME type from magic bytes (PNG fallback).
    pub fn new(data: Vec<u8>) -> Self {
        let mime_type = ImageFormat::from_magic_bytes(&data)
            .unwrap_or(ImageFormat::Png)
            .mime_type()
            .to_string();
        Self {
            data,
            mime_type,
            name: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Reads an image from disk.
    ///
    /// The MIME type comes from magic bytes, then the file extension, then PNG.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let format = ImageFormat::from_magic_bytes(&data)
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(ImageFormat::from_extension)
            })
            .unwrap_or(ImageFormat::Png);
        Ok(Self {
            data,
            mime_type: format.mime_type().to_string(),
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        })
    }

    /// Encodes the image bytes as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// A request to generate one or more images from text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Things the image should not contain.
    pub negative_prompt: Option<String>,
    /// Number of images to produce.
    pub count: u32,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Output format.
    pub format: ImageFormat,
}

impl GenerationRequest {
    /// Creates a new single-image request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            count: 1,
            aspect_ratio: AspectRatio::default(),
            format: ImageFormat::default(),
        }
    }

    /// Sets the negative prompt. Blank values are ignored.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        self.negative_prompt = (!negative.trim().is_empty()).then_some(negative);
        self
    }

    /// Sets the number of images, clamped to `1..=MAX_IMAGES_PER_REQUEST`.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.clamp(1, MAX_IMAGES_PER_REQUEST);
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the output format.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// The prompt text actually sent to the service.
    pub fn full_prompt(&self) -> String {
        match &self.negative_prompt {
            Some(negative) => format!("{} --no {}", self.prompt, negative),
            None => self.prompt.clone(),
        }
    }
}

/// A request to edit an image by instruction.
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// The source image.
    pub image: UploadedImage,
    /// What to change.
    pub instruction: String,
}

impl EditRequest {
    /// Creates a new edit request.
    pub fn new(image: UploadedImage, instruction: impl Into<String>) -> Self {
        Self {
            image,
            instruction: instruction.into(),
        }
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Request duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated or edited image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, format: ImageFormat, metadata: GenerationMetadata) -> Self {
        Self {
            data,
            format,
            metadata,
        }
    }

    /// Decodes a base64 payload returned by a service.
    ///
    /// The format comes from the reported MIME type, then magic bytes.
    pub fn from_base64(
        payload: &str,
        mime_type: Option<&str>,
        metadata: GenerationMetadata,
    ) -> Result<Self> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| StudioError::Decode(e.to_string()))?;
        let format = mime_type
            .and_then(ImageFormat::from_mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&data))
            .ok_or_else(|| StudioError::Decode("Unknown image format".into()))?;
        Ok(Self::new(data, format, metadata))
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            self.to_base64()
        )
    }
}

/// Splits a `data:<mime>;base64,<payload>` URL and decodes the payload.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| StudioError::Decode("not a data URL".into()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| StudioError::Decode("data URL is not base64".into()))?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| StudioError::Decode(e.to_string()))?;
    Ok((mime.to_string(), data))
}
