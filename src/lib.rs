//! Lumina - generate images from text prompts with Gemini.
//!
//! One invocation is one request: settings are resolved from dotenv files
//! and the environment, the prompt is augmented with styles, variations
//! and a strict image count, a single `generateContent` call is made, and
//! every returned image is written to the output directory.
//!
//! # Quick Start
//!
//! ```no_run
//! use lumina::{GeminiProvider, GenerationRequest, OutputWriter, Settings};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> lumina::Result<()> {
//!     let settings = Settings::load(None, &[])?;
//!     let provider = GeminiProvider::from_settings(&settings)?;
//!     let request = GenerationRequest::new("A red cube", &settings.model_name)
//!         .with_count(2)?
//!         .with_style("pencil sketch");
//!     let writer = OutputWriter::new(&settings.output_dir, &request.prompt);
//!     let outcome = lumina::pipeline::run(&provider, &request, &writer).await?;
//!     for file in outcome.files {
//!         println!("{}", file.path.display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
mod error;
pub mod image;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod prompt;

// Re-export error types at crate root
pub use error::{LuminaError, Result};

pub use config::{Credential, InitOutcome, Settings};
pub use image::providers::{GeminiBackend, GeminiProvider, GeminiProviderBuilder};
pub use image::{
    AspectRatio, GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat,
    ImageProvider, ImageSize, PersonGeneration, ReferenceImage, SafetyFilterLevel,
};
pub use output::{OutputFile, OutputWriter};
pub use pipeline::GenerationOutcome;
