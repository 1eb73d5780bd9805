//! Full runs against a mock Gemini endpoint.

use clap::Parser;
use lumina::cli::Cli;
use lumina::{GeminiProvider, LuminaError, OutputWriter, Settings};
use std::collections::HashMap;
use std::path::Path;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/v1beta/models/gemini-3-pro-image-preview:generateContent";
// 12-byte PNG header
const PNG_B64: &str = "iVBORw0KGgoAAAAA";

fn settings(output_dir: &Path) -> Settings {
    let mut vars = HashMap::new();
    vars.insert("API_KEY".to_string(), "test-key".to_string());
    vars.insert("OUTPUT_DIR".to_string(), output_dir.display().to_string());
    Settings::from_vars(&vars).unwrap()
}

fn image_response(count: usize) -> serde_json::Value {
    let parts: Vec<serde_json::Value> = (0..count)
        .map(|_| serde_json::json!({"inlineData": {"mimeType": "image/png", "data": PNG_B64}}))
        .collect();
    serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": parts}, "finishReason": "STOP"}]
    })
}

/// Parses `args`, resolves the request and runs it against `server`.
async fn run_cli(
    server_uri: &str,
    settings: &Settings,
    args: &[&str],
) -> lumina::Result<lumina::GenerationOutcome> {
    let cli = Cli::try_parse_from(std::iter::once("lumina").chain(args.iter().copied()))
        .map_err(|e| LuminaError::Usage(e.to_string()))?;
    let request = cli.generate.resolve(None, settings)?;
    let provider = GeminiProvider::builder_from_settings(settings)
        .base_url(server_uri)
        .build()?;
    let writer = OutputWriter::new(&settings.output_dir, &request.prompt);
    lumina::pipeline::run(&provider, &request, &writer).await
}

fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn two_images_are_written_for_styled_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(2)))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("images");
    let outcome = run_cli(
        &server.uri(),
        &settings(&out),
        &["--prompt", "A red cube", "--count", "2", "--style", "pencil sketch"],
    )
    .await
    .unwrap();

    assert_eq!(outcome.files.len(), 2);
    assert_eq!(outcome.count_mismatch(), None);
    assert_eq!(files_in(&out).len(), 2);
    for file in &outcome.files {
        assert!(file.path.starts_with(&out));
        assert!(file.path.to_string_lossy().ends_with(".png"));
    }

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("A red cube, in the style of pencil sketch"));
    assert!(text.contains("Generate exactly 2 distinct images"));
    assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "1K");
}

#[tokio::test]
async fn safety_block_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("images");
    let err = run_cli(&server.uri(), &settings(&out), &["-p", "something"])
        .await
        .unwrap_err();

    assert!(matches!(err, LuminaError::ContentBlocked(_)));
    assert_eq!(err.exit_code(), 6);
    assert!(files_in(&out).is_empty());
}

#[tokio::test]
async fn unwritable_output_dir_is_io_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(1)))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("a-file");
    std::fs::write(&blocker, b"").unwrap();

    let err = run_cli(&server.uri(), &settings(&blocker.join("out")), &["-p", "x"])
        .await
        .unwrap_err();

    assert!(matches!(err, LuminaError::Output { .. }));
    assert_eq!(err.exit_code(), 9);

    let unreachable = run_cli("http://127.0.0.1:1", &settings(tmp.path()), &["-p", "x"])
        .await
        .unwrap_err();
    assert!(matches!(unreachable, LuminaError::Transport(_)));
    assert_ne!(err.exit_code(), unreachable.exit_code());
}

#[tokio::test]
async fn fewer_images_than_requested_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(1)))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let outcome = run_cli(&server.uri(), &settings(tmp.path()), &["-p", "x", "-n", "3"])
        .await
        .unwrap();

    assert_eq!(outcome.files.len(), 1);
    assert_eq!(outcome.count_mismatch(), Some((3, 1)));
}

#[tokio::test]
async fn invalid_count_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(1)))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let err = run_cli(&server.uri(), &settings(tmp.path()), &["-p", "x", "--count", "0"])
        .await
        .unwrap_err();

    assert!(matches!(err, LuminaError::Usage(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn http_errors_map_to_distinct_codes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/bad-key-model:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/busy-model:generateContent"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "17")
                .set_body_json(serde_json::json!({
                    "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
                })),
        )
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());

    let auth = run_cli(&server.uri(), &settings, &["-p", "x", "--model-name", "bad-key-model"])
        .await
        .unwrap_err();
    assert!(matches!(auth, LuminaError::Auth(_)));
    assert_eq!(auth.exit_code(), 4);

    let quota = run_cli(&server.uri(), &settings, &["-p", "x", "--model-name", "busy-model"])
        .await
        .unwrap_err();
    assert!(matches!(quota, LuminaError::Quota { .. }));
    assert_eq!(quota.exit_code(), 5);
    assert_eq!(quota.retry_after(), Some(std::time::Duration::from_secs(17)));

    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn vertex_backend_uses_project_path_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/my-proj/locations/us-central1/publishers/google/models/gemini-3-pro-image-preview:generateContent",
        ))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(1)))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut vars = HashMap::new();
    vars.insert("PROJECT_ID".to_string(), "my-proj".to_string());
    vars.insert("OUTPUT_DIR".to_string(), tmp.path().display().to_string());
    let settings = Settings::from_vars(&vars).unwrap();

    let request = lumina::GenerationRequest::new("A lighthouse", &settings.model_name);
    let provider = GeminiProvider::builder_from_settings(&settings)
        .base_url(server.uri())
        .access_token("test-token")
        .build()
        .unwrap();
    let writer = OutputWriter::new(&settings.output_dir, &request.prompt).with_filename("light.png");

    let outcome = lumina::pipeline::run(&provider, &request, &writer)
        .await
        .unwrap();
    assert_eq!(outcome.files[0].path, tmp.path().join("light.png"));
}
