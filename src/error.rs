//! Error types for image generation runs.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur during a generation run.
///
/// Every variant is terminal for the run. [`LuminaError::exit_code`] maps
/// each one to the process status the binary exits with.
#[derive(Debug, thiserror::Error)]
pub enum LuminaError {
    /// Bad command-line input.
    #[error("{0}")]
    Usage(String),

    /// Missing, conflicting or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential rejected or unavailable.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Quota exhausted, rate limited or billing disabled.
    #[error("quota exceeded: {message}")]
    Quota {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Prompt or output rejected by the safety filter.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Network or HTTP transport error (including timeouts).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// API returned an error response that has no better classification.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The service answered, but not with anything usable.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Failed to decode base64 image data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Output location could not be prepared or written.
    #[error("cannot write to {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Some images were saved before a later one failed.
    #[error(
        "wrote {} of {total} images before failing: {source}",
        .written.len()
    )]
    PartialWrite {
        written: Vec<PathBuf>,
        total: usize,
        source: std::io::Error,
    },

    /// I/O error (e.g. reading a reference image).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LuminaError {
    /// Process exit code for this error.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 2 | usage |
    /// | 3 | configuration |
    /// | 4 | authentication |
    /// | 5 | quota |
    /// | 6 | blocked by safety filter |
    /// | 7 | network |
    /// | 8 | unexpected response |
    /// | 9 | local I/O, nothing written |
    /// | 10 | partial write |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) => 3,
            Self::Auth(_) => 4,
            Self::Quota { .. } => 5,
            Self::ContentBlocked(_) => 6,
            Self::Transport(_) => 7,
            Self::Api { .. } | Self::UnexpectedResponse(_) | Self::Decode(_) | Self::Json(_) => 8,
            Self::Output { .. } | Self::Io(_) => 9,
            Self::PartialWrite { .. } => 10,
        }
    }

    /// A remediation hint to print after the error message, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Usage(_) => Some("Run `lumina --help` for usage."),
            Self::Config(_) => Some(
                "Run `lumina init` and set API_KEY or PROJECT_ID in ~/.config/lumina/.env.",
            ),
            Self::Auth(_) => {
                Some("Check API_KEY, or run `gcloud auth login` when using PROJECT_ID.")
            }
            Self::Api { status: 404, .. } => {
                Some("Verify MODEL_NAME and that the model is enabled for your project and region.")
            }
            _ => None,
        }
    }

    /// Returns the suggested wait before trying again, if the service sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Quota { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, LuminaError>;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Redacts API keys from provider error text and caps its length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_ERROR_MESSAGE_LEN));
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if let Some(pos) = word.find("key=") {
            out.push_str(&word[..pos + 4]);
            out.push_str("[REDACTED]");
        } else if word.starts_with("AIza") && word.len() > 20 {
            out.push_str("[REDACTED]");
        } else {
            out.push_str(word);
        }
    }

    let trimmed = out.trim();
    if trimmed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
