//! Core types for image generation.

use crate::error::{LuminaError, Result};
use crate::prompt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
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

    /// Maps a MIME type reported by the service to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
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

/// Width-to-height ratio in `W:H` form, e.g. `16:9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates a ratio; both sides must be positive.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    /// Width component.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height component.
    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || format!("invalid aspect ratio '{s}': expected W:H, e.g. 16:9");
        let (w, h) = s.trim().split_once(':').ok_or_else(invalid)?;
        let width = w.parse::<u32>().map_err(|_| invalid())?;
        let height = h.parse::<u32>().map_err(|_| invalid())?;
        Self::new(width, height).ok_or_else(invalid)
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(ratio: AspectRatio) -> Self {
        ratio.to_string()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// ~1024px on the long edge.
    #[default]
    #[serde(rename = "1K")]
    OneK,
    /// ~2048px.
    #[serde(rename = "2K")]
    TwoK,
    /// ~4096px.
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    /// Returns the API value ("1K", "2K", "4K").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Self::OneK),
            "2K" => Ok(Self::TwoK),
            "4K" => Ok(Self::FourK),
            _ => Err(format!("invalid image size '{s}': expected 1K, 2K or 4K")),
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harm-category block threshold sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyFilterLevel {
    /// Block low, medium and high probability content.
    BlockLowAndAbove,
    /// Block medium and high probability content.
    BlockMediumAndAbove,
    /// Block only high probability content.
    #[default]
    BlockOnlyHigh,
    /// Do not block on probability.
    BlockNone,
    /// Filter disabled.
    Off,
}

impl SafetyFilterLevel {
    /// Returns the API threshold value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
            Self::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            Self::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            Self::BlockNone => "BLOCK_NONE",
            Self::Off => "OFF",
        }
    }
}

impl FromStr for SafetyFilterLevel {
    type Err = String;

    /// Accepts the API names plus the legacy `BLOCK_SOME`/`BLOCK_FEW`/`BLOCK_MOST`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLOCK_LOW_AND_ABOVE" | "BLOCK_MOST" => Ok(Self::BlockLowAndAbove),
            "BLOCK_MEDIUM_AND_ABOVE" => Ok(Self::BlockMediumAndAbove),
            "BLOCK_ONLY_HIGH" | "BLOCK_SOME" | "BLOCK_FEW" => Ok(Self::BlockOnlyHigh),
            "BLOCK_NONE" => Ok(Self::BlockNone),
            "OFF" => Ok(Self::Off),
            _ => Err(format!("invalid safety filter level '{s}'")),
        }
    }
}

impl fmt::Display for SafetyFilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether people may appear in generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonGeneration {
    /// No restriction.
    #[default]
    AllowAll,
    /// Adults only.
    AllowAdult,
    /// No people.
    DontAllow,
}

impl PersonGeneration {
    /// Returns the config value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllowAll => "allow_all",
            Self::AllowAdult => "allow_adult",
            Self::DontAllow => "dont_allow",
        }
    }
}

impl FromStr for PersonGeneration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow_all" => Ok(Self::AllowAll),
            "allow_adult" => Ok(Self::AllowAdult),
            "dont_allow" => Ok(Self::DontAllow),
            _ => Err(format!(
                "invalid person generation '{s}': expected allow_all, allow_adult or dont_allow"
            )),
        }
    }
}

/// An input image sent alongside the prompt for editing or composition.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Detected format.
    pub format: ImageFormat,
}

impl ReferenceImage {
    /// Wraps raw bytes, detecting the format from magic bytes (PNG if unknown).
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let format = ImageFormat::from_magic_bytes(&data).unwrap_or_default();
        Self { data, format }
    }
}

/// Fully merged parameters for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The user's prompt, before augmentation.
    pub prompt: String,
    /// Number of images asked for. Always at least 1.
    pub count: u32,
    /// Style clauses, in the order given.
    pub styles: Vec<String>,
    /// Variation clauses, in the order given.
    pub variations: Vec<String>,
    /// Aspect ratio of the output.
    pub aspect_ratio: AspectRatio,
    /// Output resolution tier.
    pub image_size: ImageSize,
    /// Model identifier, e.g. `gemini-3-pro-image-preview`.
    pub model_name: String,
    /// Things to keep out of the image.
    pub negative_prompt: Option<String>,
    /// Person guidance appended to the prompt.
    pub person_generation: PersonGeneration,
    /// Seed for reproducible results.
    pub seed: Option<u64>,
    /// Input images for editing/composition.
    pub reference_images: Vec<ReferenceImage>,
}

impl GenerationRequest {
    /// Creates a single-image request with default parameters.
    pub fn new(prompt: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            count: 1,
            styles: Vec::new(),
            variations: Vec::new(),
            aspect_ratio: AspectRatio::default(),
            image_size: ImageSize::default(),
            model_name: model_name.into(),
            negative_prompt: None,
            person_generation: PersonGeneration::default(),
            seed: None,
            reference_images: Vec::new(),
        }
    }

    /// Sets the number of images. Zero is rejected.
    pub fn with_count(mut self, count: u32) -> Result<Self> {
        if count == 0 {
            return Err(LuminaError::Usage(
                "count must be a positive integer".into(),
            ));
        }
        self.count = count;
        Ok(self)
    }

    /// Adds a style clause.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.styles.push(style.into());
        self
    }

    /// Adds a variation clause.
    pub fn with_variation(mut self, variation: impl Into<String>) -> Self {
        self.variations.push(variation.into());
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the output resolution tier.
    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = size;
        self
    }

    /// Sets the seed for deterministic generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Adds an input image for editing/composition.
    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_images.push(image);
        self
    }

    /// The text actually sent to the model: styles, variations, the strict
    /// count clause, then negative prompt and person guidance.
    pub fn final_prompt(&self) -> String {
        let augmented = prompt::augment(&self.prompt, &self.styles, &self.variations, self.count);
        prompt::apply_guidance(
            &augmented,
            self.negative_prompt.as_deref(),
            self.person_generation,
        )
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Round-trip time of the generation call in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Position in the service response, starting at 0.
    pub index: usize,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        index: usize,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            data,
            format,
            index,
            metadata,
        }
    }

    /// MIME type of the payload.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
