//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationRequest};
use async_trait::async_trait;

/// Trait for image generation backends.
///
/// One call per request: implementations must not retry, and must return
/// every image the service produced in response order.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates images for the given request.
    ///
    /// The number of images returned may differ from `request.count`;
    /// that is not an error.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}
