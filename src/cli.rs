//! Command-line surface and argument resolution.

use crate::config::Settings;
use crate::error::{LuminaError, Result};
use crate::image::{AspectRatio, GenerationRequest, ImageSize, ReferenceImage};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const AFTER_HELP: &str = "\
EXAMPLES:
  lumina -p \"A majestic lion on Mars\"
  lumina -p \"A city street\" --style Cyberpunk --style Neon --variation Rainy
  lumina -p \"Add a red hat to the cat\" -i cat.png
  lumina -p \"Space battle fleet\" --aspect-ratio 16:9 --image-size 4K
  echo \"A cyberpunk street food vendor\" | lumina
  lumina -p \"A robot\" --count 4";

#[derive(Debug, Parser)]
#[command(name = "lumina")]
#[command(about = "Generate images from text prompts with Gemini")]
#[command(version, after_help = AFTER_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub generate: GenerateArgs,

    /// Read configuration from this dotenv file instead of ~/.config/lumina/.env
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output logs and the final report as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the default config file if it does not exist
    Init,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Text prompt; read from stdin when omitted and input is piped
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Number of images to ask for
    #[arg(short = 'n', long, default_value_t = 1, allow_negative_numbers = true)]
    pub count: i64,

    /// Artistic style to apply (repeatable)
    #[arg(long = "style", value_name = "STYLE")]
    pub styles: Vec<String>,

    /// Visual variation to apply (repeatable)
    #[arg(long = "variation", value_name = "VARIATION")]
    pub variations: Vec<String>,

    /// Aspect ratio as W:H, e.g. 16:9
    #[arg(long, value_name = "W:H")]
    pub aspect_ratio: Option<String>,

    /// Output resolution
    #[arg(long, value_enum)]
    pub image_size: Option<ImageSizeArg>,

    /// Model to use
    #[arg(long)]
    pub model_name: Option<String>,

    /// Directory to save images in
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// File name for the output image (indexed when several are returned)
    #[arg(short, long)]
    pub filename: Option<PathBuf>,

    /// Reference image for editing or composition (repeatable)
    #[arg(short, long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,

    /// Things to keep out of the image, e.g. "blur, text"
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Seed for reproducible results
    #[arg(long)]
    pub seed: Option<u64>,

    /// Google AI Studio API key (overrides config)
    #[arg(long, conflicts_with = "project_id")]
    pub api_key: Option<String>,

    /// Google Cloud project for Vertex AI (overrides config)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Vertex AI location
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageSizeArg {
    #[value(name = "1K", alias = "1k")]
    OneK,
    #[value(name = "2K", alias = "2k")]
    TwoK,
    #[value(name = "4K", alias = "4k")]
    FourK,
}

impl From<ImageSizeArg> for ImageSize {
    fn from(arg: ImageSizeArg) -> Self {
        match arg {
            ImageSizeArg::OneK => ImageSize::OneK,
            ImageSizeArg::TwoK => ImageSize::TwoK,
            ImageSizeArg::FourK => ImageSize::FourK,
        }
    }
}

impl GenerateArgs {
    /// Config entries these flags override, applied after every other layer.
    ///
    /// A credential flag also blanks the other credential so the flag wins
    /// over whatever the config file holds.
    pub fn config_overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(key) = &self.api_key {
            overrides.push(("API_KEY", key.clone()));
            overrides.push(("PROJECT_ID", String::new()));
        }
        if let Some(project) = &self.project_id {
            overrides.push(("PROJECT_ID", project.clone()));
            overrides.push(("API_KEY", String::new()));
        }
        if let Some(location) = &self.location {
            overrides.push(("LOCATION", location.clone()));
        }
        if let Some(dir) = &self.output_dir {
            overrides.push(("OUTPUT_DIR", dir.display().to_string()));
        }
        overrides
    }

    /// Checks the flags that need no settings.
    ///
    /// Runs before configuration is loaded so a bad flag is reported as a
    /// usage error even when no credentials are set up yet.
    pub fn validate(&self) -> Result<()> {
        self.count()?;
        self.aspect_ratio()?;
        Ok(())
    }

    fn count(&self) -> Result<u32> {
        u32::try_from(self.count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| {
                LuminaError::Usage(format!(
                    "--count must be a positive integer, got {}",
                    self.count
                ))
            })
    }

    fn aspect_ratio(&self) -> Result<Option<AspectRatio>> {
        self.aspect_ratio
            .as_deref()
            .map(|raw| raw.parse::<AspectRatio>().map_err(LuminaError::Usage))
            .transpose()
    }

    /// True when the prompt has to come from stdin.
    pub fn needs_stdin(&self) -> bool {
        self.prompt.is_none()
    }

    /// Builds the request from flags, piped stdin and settings defaults.
    ///
    /// `--prompt` wins over `stdin`; with neither, this is a usage error.
    /// Validation happens here, before any network call.
    pub fn resolve(&self, stdin: Option<String>, settings: &Settings) -> Result<GenerationRequest> {
        let prompt = match &self.prompt {
            Some(prompt) => prompt.trim().to_string(),
            None => {
                if stdin.as_deref().is_some_and(|s| !s.trim().is_empty()) {
                    tracing::debug!("reading prompt from stdin");
                }
                stdin.map(|s| s.trim().to_string()).unwrap_or_default()
            }
        };
        if prompt.is_empty() {
            return Err(LuminaError::Usage(
                "prompt required: use --prompt or pipe text via stdin".into(),
            ));
        }

        let count = self.count()?;
        let aspect_ratio = self.aspect_ratio()?.unwrap_or(settings.aspect_ratio);

        let mut request = GenerationRequest::new(
            prompt,
            self.model_name
                .clone()
                .unwrap_or_else(|| settings.model_name.clone()),
        )
        .with_count(count)?
        .with_aspect_ratio(aspect_ratio)
        .with_image_size(self.image_size.map(Into::into).unwrap_or(settings.image_size));

        request.styles = self.styles.clone();
        request.variations = self.variations.clone();
        request.negative_prompt = self.negative_prompt.clone();
        request.person_generation = settings.person_generation;
        if let Some(seed) = self.seed {
            request = request.with_seed(seed);
        }

        for path in &self.images {
            if !path.exists() {
                tracing::warn!(path = %path.display(), "reference image not found, skipping");
                continue;
            }
            let data = std::fs::read(path)?;
            request = request.with_reference_image(ReferenceImage::from_bytes(data));
        }
        if !request.reference_images.is_empty() {
            tracing::info!(count = request.reference_images.len(), "using reference images");
        }

        Ok(request)
    }
}

/// Decodes a prompt piped on stdin.
pub fn prompt_from_stdin(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|_| LuminaError::Usage("prompt on stdin is not valid UTF-8".into()))
}
