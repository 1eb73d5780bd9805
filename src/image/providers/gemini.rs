//! Gemini (Google) image generation provider.
//!
//! Talks to `generateContent` on either the public Developer API (API key)
//! or Vertex AI (project + gcloud credentials). Exactly one request is made
//! per [`ImageProvider::generate`] call.

use crate::config::{Credential, Settings};
use crate::error::{parse_retry_after, sanitize_error_message, LuminaError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, SafetyFilterLevel,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEVELOPER_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Which Google API backend serves the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiBackend {
    /// Gemini Developer API (generativelanguage.googleapis.com), API key auth.
    Developer {
        /// Google AI Studio API key.
        api_key: String,
    },
    /// Vertex AI (aiplatform.googleapis.com), bearer token auth.
    Vertex {
        /// GCP project ID.
        project: String,
        /// GCP location (e.g. "us-central1" or "global").
        location: String,
    },
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone)]
pub struct GeminiProviderBuilder {
    backend: Option<GeminiBackend>,
    safety_filter_level: SafetyFilterLevel,
    base_url: Option<String>,
    access_token: Option<String>,
    timeout: Duration,
}

impl Default for GeminiProviderBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            safety_filter_level: SafetyFilterLevel::default(),
            base_url: None,
            access_token: None,
            timeout: Duration::from_secs(300),
        }
    }
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the Developer API with this key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.backend = Some(GeminiBackend::Developer {
            api_key: key.into(),
        });
        self
    }

    /// Uses Vertex AI in this project and location.
    pub fn project(mut self, project: impl Into<String>, location: impl Into<String>) -> Self {
        self.backend = Some(GeminiBackend::Vertex {
            project: project.into(),
            location: location.into(),
        });
        self
    }

    /// Sets the harm-category threshold sent with each request.
    pub fn safety_filter_level(mut self, level: SafetyFilterLevel) -> Self {
        self.safety_filter_level = level;
        self
    }

    /// Overrides the API host, e.g. to point at a local mock server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Uses a fixed Vertex AI bearer token instead of asking `gcloud`.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider.
    pub fn build(self) -> Result<GeminiProvider> {
        let backend = self.backend.ok_or_else(|| {
            LuminaError::Config("no credentials: set API_KEY or PROJECT_ID".into())
        })?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(GeminiProvider {
            client,
            backend,
            safety_filter_level: self.safety_filter_level,
            base_url: self.base_url,
            access_token: self.access_token,
        })
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    backend: GeminiBackend,
    safety_filter_level: SafetyFilterLevel,
    base_url: Option<String>,
    access_token: Option<String>,
}

/// Get a bearer token by running `gcloud auth print-access-token`.
fn gcloud_access_token() -> Result<String> {
    let output = std::process::Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .map_err(|e| {
            LuminaError::Auth(format!(
                "Failed to run gcloud CLI: {}. Install it from https://cloud.google.com/sdk/docs/install",
                e
            ))
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LuminaError::Auth(format!(
            "gcloud auth failed: {}",
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Builder preloaded with the credential and safety level from `settings`.
    pub fn builder_from_settings(settings: &Settings) -> GeminiProviderBuilder {
        let builder = Self::builder().safety_filter_level(settings.safety_filter_level);
        match &settings.credential {
            Credential::ApiKey(key) => builder.api_key(key.clone()),
            Credential::Project(project) => {
                builder.project(project.clone(), settings.location.clone())
            }
        }
    }

    /// Builds a provider straight from `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::builder_from_settings(settings).build()
    }

    /// Returns a reference to the active backend.
    pub fn backend(&self) -> &GeminiBackend {
        &self.backend
    }

    fn endpoint(&self, model: &str) -> String {
        match &self.backend {
            GeminiBackend::Developer { .. } => {
                let base = self.base_url.as_deref().unwrap_or(DEVELOPER_API_BASE);
                format!("{base}/v1beta/models/{model}:generateContent")
            }
            GeminiBackend::Vertex { project, location } => {
                let base = match &self.base_url {
                    Some(url) => url.clone(),
                    None if location == "global" => "https://aiplatform.googleapis.com".into(),
                    None => format!("https://{location}-aiplatform.googleapis.com"),
                };
                format!(
                    "{base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
                )
            }
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        match &self.backend {
            GeminiBackend::Developer { api_key } => Ok(builder.header("x-goog-api-key", api_key)),
            GeminiBackend::Vertex { .. } => {
                let token = match &self.access_token {
                    Some(token) => token.clone(),
                    None => gcloud_access_token()?,
                };
                Ok(builder.bearer_auth(token))
            }
        }
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>> {
        let start = Instant::now();

        let url = self.endpoint(&request.model_name);
        let body = GeminiRequest::from_generation_request(request, self.safety_filter_level);

        tracing::debug!(
            model = %request.model_name,
            size = %request.image_size,
            ratio = %request.aspect_ratio,
            count = request.count,
            references = request.reference_images.len(),
            "sending generation request"
        );

        let response = self
            .authorize(self.client.post(&url))?
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let text = response.text().await?;
        let gemini_response: GeminiResponse = serde_json::from_str(&text)?;

        let metadata = GenerationMetadata {
            model: Some(request.model_name.clone()),
            duration_ms: Some(start.elapsed().as_millis() as u64),
        };
        extract_images(gemini_response, &metadata)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>> {
        self.generate_impl(request).await
    }

    fn name(&self) -> &str {
        match self.backend {
            GeminiBackend::Developer { .. } => "Gemini (Developer API)",
            GeminiBackend::Vertex { .. } => "Gemini (Vertex AI)",
        }
    }
}

const SAFETY_FINISH_REASONS: [&str; 7] = [
    "SAFETY",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "IMAGE_RECITATION",
    "RECITATION",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
];

/// Collects every inline image from every candidate, in order.
fn extract_images(
    response: GeminiResponse,
    metadata: &GenerationMetadata,
) -> Result<Vec<GeneratedImage>> {
    // Prompt blocks come back as HTTP 200
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(LuminaError::ContentBlocked(msg));
        }
    }

    let mut images = Vec::new();
    let mut texts = Vec::new();
    let mut blocked = None;
    let mut failed = None;

    for candidate in response.candidates {
        match candidate.finish_reason.as_deref() {
            Some(reason) if SAFETY_FINISH_REASONS.contains(&reason) => {
                blocked = Some(reason.to_string())
            }
            Some(reason @ ("IMAGE_OTHER" | "NO_IMAGE")) => failed = Some(reason.to_string()),
            _ => {} // STOP, MAX_TOKENS, etc. are normal
        }

        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts {
            if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
                let preview: String = text.chars().take(200).collect();
                tracing::debug!(text = %preview, "model text");
                texts.push(text);
            }
            if let Some(inline) = part.inline_data {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(inline.data.trim())
                    .map_err(|e| LuminaError::Decode(e.to_string()))?;
                let format = ImageFormat::from_mime_type(&inline.mime_type)
                    .or_else(|| ImageFormat::from_magic_bytes(&data))
                    .unwrap_or_default();
                images.push(GeneratedImage::new(
                    data,
                    format,
                    images.len(),
                    metadata.clone(),
                ));
            }
        }
    }

    if !images.is_empty() {
        if let Some(reason) = blocked {
            tracing::warn!(reason = %reason, "some output was withheld by the safety filter");
        }
        return Ok(images);
    }

    if let Some(reason) = blocked {
        return Err(LuminaError::ContentBlocked(format!(
            "Content blocked by Gemini safety filter: {}",
            reason
        )));
    }
    if let Some(reason) = failed {
        return Err(LuminaError::UnexpectedResponse(format!(
            "Generation failed: {}. Try a different prompt.",
            reason
        )));
    }
    if !texts.is_empty() {
        return Err(LuminaError::UnexpectedResponse(format!(
            "No image returned; model replied: {}",
            sanitize_error_message(&texts.join(" "))
        )));
    }
    Err(LuminaError::UnexpectedResponse(
        "No image data in Gemini response".into(),
    ))
}

/// Maps a non-success HTTP response to an error category.
fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> LuminaError {
    let (message, api_status) = match serde_json::from_str::<GeminiErrorEnvelope>(text) {
        Ok(envelope) => (
            sanitize_error_message(&envelope.error.message),
            envelope.error.status.unwrap_or_default(),
        ),
        Err(_) => (sanitize_error_message(text), String::new()),
    };

    if status == 401 || status == 403 {
        return LuminaError::Auth(message);
    }
    if message.contains("API key not valid") || message.contains("API_KEY_INVALID") {
        return LuminaError::Auth(message);
    }
    if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return LuminaError::Quota {
            message,
            retry_after,
        };
    }
    if status == 402 {
        return LuminaError::Quota {
            message: format!("billing not enabled: {message}"),
            retry_after: None,
        };
    }
    let lower = message.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return LuminaError::ContentBlocked(message);
    }
    LuminaError::Api { status, message }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: ImageConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest, safety: SafetyFilterLevel) -> Self {
        let mut parts = Vec::new();

        // Reference images go first, then the prompt
        for image in &req.reference_images {
            parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.format.mime_type().to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                },
            });
        }

        let prompt = req.final_prompt();
        tracing::debug!(prompt = %prompt, "full prompt");
        parts.push(GeminiRequestPart::Text { text: prompt });

        Self {
            contents: vec![GeminiContent {
                role: "user",
                parts,
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: req.aspect_ratio.to_string(),
                    image_size: req.image_size.as_str().to_string(),
                },
                seed: req.seed,
            },
            safety_settings: HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: safety.as_str(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}
