//! One generation run: call the provider once, then save what came back.

use crate::error::Result;
use crate::image::{GenerationRequest, ImageProvider};
use crate::output::{OutputFile, OutputWriter};
use serde::Serialize;

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    /// Files written, in response order.
    pub files: Vec<OutputFile>,
    /// Images asked for.
    pub requested: u32,
    /// Images the service returned.
    pub returned: usize,
}

impl GenerationOutcome {
    /// `(requested, returned)` when the service did not honor the count.
    pub fn count_mismatch(&self) -> Option<(u32, usize)> {
        (self.requested as usize != self.returned).then_some((self.requested, self.returned))
    }
}

/// Generates images for `request` and writes them with `writer`.
///
/// A count different from the one requested is logged as a warning and
/// otherwise accepted.
pub async fn run(
    provider: &dyn ImageProvider,
    request: &GenerationRequest,
    writer: &OutputWriter,
) -> Result<GenerationOutcome> {
    tracing::debug!(provider = provider.name(), "generating");
    let images = provider.generate(request).await?;

    if images.len() != request.count as usize {
        tracing::warn!(
            requested = request.count,
            returned = images.len(),
            "service returned a different number of images than requested"
        );
    }

    let files = writer.write_all(&images)?;

    Ok(GenerationOutcome {
        files,
        requested: request.count,
        returned: images.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LuminaError;
    use crate::image::{GeneratedImage, GenerationMetadata, ImageFormat};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FixedProvider {
        returns: usize,
    }

    #[async_trait]
    impl ImageProvider for FixedProvider {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<GeneratedImage>> {
            Ok((0..self.returns)
                .map(|i| {
                    GeneratedImage::new(
                        vec![0u8; 8],
                        ImageFormat::Png,
                        i,
                        GenerationMetadata::default(),
                    )
                })
                .collect())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BlockingProvider;

    #[async_trait]
    impl ImageProvider for BlockingProvider {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<GeneratedImage>> {
            Err(LuminaError::ContentBlocked("IMAGE_SAFETY".into()))
        }

        fn name(&self) -> &str {
            "blocking"
        }
    }

    fn request(count: u32) -> GenerationRequest {
        GenerationRequest::new("A red cube", "m")
            .with_count(count)
            .unwrap()
    }

    /// Log sink shared between a test subscriber and the assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Runs with a thread-local subscriber that records warnings and above.
    async fn run_capturing_warnings(returns: usize, count: u32) -> (GenerationOutcome, String) {
        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let tmp = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(tmp.path(), "A red cube");
        let outcome = run(&FixedProvider { returns }, &request(count), &writer)
            .await
            .unwrap();
        (outcome, logs.contents())
    }

    #[tokio::test]
    async fn test_count_mismatch_logs_a_warning() {
        let (outcome, logs) = run_capturing_warnings(1, 3).await;
        assert_eq!(outcome.files.len(), 1);
        assert!(logs.contains("WARN"), "logs: {logs}");
        assert!(logs.contains("different number of images"), "logs: {logs}");
        assert!(logs.contains("requested=3"), "logs: {logs}");
        assert!(logs.contains("returned=1"), "logs: {logs}");
    }

    #[tokio::test]
    async fn test_matching_count_logs_nothing() {
        let (outcome, logs) = run_capturing_warnings(2, 2).await;
        assert_eq!(outcome.files.len(), 2);
        assert!(logs.is_empty(), "logs: {logs}");
    }

    #[tokio::test]
    async fn test_matching_count() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(tmp.path(), "A red cube");
        let outcome = run(&FixedProvider { returns: 2 }, &request(2), &writer)
            .await
            .unwrap();
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.count_mismatch(), None);
    }

    #[tokio::test]
    async fn test_fewer_images_is_warning_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(tmp.path(), "A red cube");
        let outcome = run(&FixedProvider { returns: 1 }, &request(3), &writer)
            .await
            .unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.count_mismatch(), Some((3, 1)));
    }

    #[tokio::test]
    async fn test_more_images_are_all_written() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(tmp.path(), "A red cube");
        let outcome = run(&FixedProvider { returns: 3 }, &request(1), &writer)
            .await
            .unwrap();
        assert_eq!(outcome.files.len(), 3);
        assert_eq!(outcome.count_mismatch(), Some((1, 3)));
    }

    #[tokio::test]
    async fn test_blocked_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let writer = OutputWriter::new(&dir, "A red cube");
        let err = run(&BlockingProvider, &request(1), &writer)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 6);
        assert!(!dir.exists());
    }
}
