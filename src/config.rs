//! Run configuration.
//!
//! Settings are resolved once per invocation from layered key/value sources
//! and passed explicitly to every component. Layers, last writer wins:
//!
//! 1. the user config file (`~/.config/lumina/.env` unless overridden)
//! 2. `.env` in the working directory
//! 3. the process environment
//! 4. command-line overrides
//!
//! The process environment is only read, never modified.

use crate::error::{LuminaError, Result};
use crate::image::{AspectRatio, ImageSize, PersonGeneration, SafetyFilterLevel};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default Gemini image model.
pub const DEFAULT_MODEL_NAME: &str = "gemini-3-pro-image-preview";

/// Default Vertex AI region.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Keys read from the environment and dotenv files.
pub const CONFIG_KEYS: [&str; 9] = [
    "API_KEY",
    "PROJECT_ID",
    "LOCATION",
    "MODEL_NAME",
    "OUTPUT_DIR",
    "ASPECT_RATIO",
    "IMAGE_SIZE",
    "SAFETY_FILTER_LEVEL",
    "PERSON_GENERATION",
];

/// How requests are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Google AI Studio API key (public Developer API).
    ApiKey(String),
    /// Google Cloud project (Vertex AI with ambient gcloud credentials).
    Project(String),
}

/// Resolved, immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The single credential in use.
    pub credential: Credential,
    /// Vertex AI region; ignored in API-key mode.
    pub location: String,
    /// Default model.
    pub model_name: String,
    /// Where images are written.
    pub output_dir: PathBuf,
    /// Default aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Default resolution tier.
    pub image_size: ImageSize,
    /// Harm-category threshold.
    pub safety_filter_level: SafetyFilterLevel,
    /// Person guidance appended to prompts.
    pub person_generation: PersonGeneration,
}

impl Settings {
    /// Builds settings from a key/value map, applying defaults for every
    /// unset optional key. Empty values count as unset.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let credential = match (get("API_KEY"), get("PROJECT_ID")) {
            (Some(key), None) => Credential::ApiKey(key),
            (None, Some(project)) => Credential::Project(project),
            (Some(_), Some(_)) => {
                return Err(LuminaError::Config(
                    "both API_KEY and PROJECT_ID are set; keep exactly one".into(),
                ))
            }
            (None, None) => {
                return Err(LuminaError::Config(
                    "no credentials: set API_KEY or PROJECT_ID".into(),
                ))
            }
        };

        let output_dir = match get("OUTPUT_DIR") {
            Some(dir) => PathBuf::from(shellexpand::tilde(&dir).into_owned()),
            None => default_output_dir(),
        };

        Ok(Self {
            credential,
            location: get("LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            model_name: get("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            output_dir,
            aspect_ratio: parse_key(&get, "ASPECT_RATIO")?,
            image_size: parse_key(&get, "IMAGE_SIZE")?,
            safety_filter_level: parse_key(&get, "SAFETY_FILTER_LEVEL")?,
            person_generation: parse_key(&get, "PERSON_GENERATION")?,
        })
    }

    /// Loads settings from the config file, `./.env`, the process
    /// environment and finally `overrides`.
    pub fn load(dotenv: Option<&Path>, overrides: &[(&str, String)]) -> Result<Self> {
        let mut vars = HashMap::new();

        match dotenv {
            Some(path) => merge_dotenv(&mut vars, path)?,
            None => {
                if let Some(path) = default_config_path() {
                    merge_dotenv(&mut vars, &path)?;
                }
            }
        }
        merge_local_dotenv(&mut vars, Path::new(".env"));

        for key in CONFIG_KEYS {
            if let Ok(value) = std::env::var(key) {
                vars.insert(key.to_string(), value);
            }
        }
        for (key, value) in overrides {
            vars.insert((*key).to_string(), value.clone());
        }

        let settings = Self::from_vars(&vars)?;
        match &settings.credential {
            Credential::ApiKey(_) => tracing::debug!("using authentication: API key"),
            Credential::Project(project) => {
                tracing::debug!(project = %project, location = %settings.location, "using authentication: Vertex AI")
            }
        }
        Ok(settings)
    }
}

fn parse_key<T, F>(get: &F, key: &str) -> Result<T>
where
    T: FromStr<Err = String> + Default,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: String| LuminaError::Config(format!("{key}: {e}"))),
        None => Ok(T::default()),
    }
}

/// Reads a dotenv file into `vars`. A missing file is skipped.
fn merge_dotenv(vars: &mut HashMap<String, String>, path: &Path) -> Result<()> {
    if !path.is_file() {
        return Ok(());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        LuminaError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    for item in iter {
        let (key, value) = item.map_err(|e| {
            LuminaError::Config(format!("malformed {}: {e}", path.display()))
        })?;
        vars.insert(key, value);
    }

    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(())
}

/// Like [`merge_dotenv`], but a malformed file is skipped with a warning.
///
/// Used for the `.env` in the working directory, which may belong to
/// another project.
fn merge_local_dotenv(vars: &mut HashMap<String, String>, path: &Path) {
    let mut local = HashMap::new();
    match merge_dotenv(&mut local, path) {
        Ok(()) => vars.extend(local),
        Err(e) => tracing::warn!(error = %e, "ignoring {}", path.display()),
    }
}

/// `~/.config/lumina/.env`, or `None` when no home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(".config")
            .join("lumina")
            .join(".env")
    })
}

/// `~/Pictures/Lumina_Generated`, or the working directory without a home.
pub fn default_output_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join("Pictures").join("Lumina_Generated"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Result of [`init_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A new config file was written.
    Created(PathBuf),
    /// A config file was already present and was left untouched.
    AlreadyExists(PathBuf),
}

/// Writes the default config file at `path` unless one already exists.
///
/// The file is created with mode 0600 on unix since it holds the API key.
pub fn init_config(path: &Path) -> Result<InitOutcome> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LuminaError::Output {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Ok(InitOutcome::AlreadyExists(path.to_path_buf()))
        }
        Err(source) => {
            return Err(LuminaError::Output {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    file.write_all(default_config_contents().as_bytes())
        .map_err(|source| LuminaError::Output {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(path = %path.display(), "initialized config file");
    Ok(InitOutcome::Created(path.to_path_buf()))
}

fn default_config_contents() -> String {
    format!(
        "# Lumina configuration (keep this file private)\n\
         \n\
         # AUTHENTICATION (choose one)\n\
         API_KEY=\n\
         PROJECT_ID=\n\
         \n\
         LOCATION={DEFAULT_LOCATION}\n\
         MODEL_NAME={DEFAULT_MODEL_NAME}\n\
         OUTPUT_DIR={}\n\
         ASPECT_RATIO={}\n\
         IMAGE_SIZE={}\n\
         SAFETY_FILTER_LEVEL={}\n\
         PERSON_GENERATION={}\n",
        default_output_dir().display(),
        AspectRatio::default(),
        ImageSize::default(),
        SafetyFilterLevel::default(),
        PersonGeneration::default().as_str(),
    )
}
