//! API Integration Tests
//!
//! Each test builds the router over a temporary directory, an in-memory
//! registry and a stub completion client.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use lumina_api::{create_router_for_testing, state::AppState};
use lumina_core::{CompletionError, LlmClient};
use lumina_parser::{DocumentParser, ParsedDocument, ParserError};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "lumina-test-boundary";

// =============================================================================
// Stubs
// =============================================================================

/// Treats uploads as UTF-8 text with form feeds between pages
struct TextParser;

impl DocumentParser for TextParser {
    fn parse(&self, path: &Path) -> lumina_parser::Result<ParsedDocument> {
        let text = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(ParsedDocument::from_pages(
            path.display().to_string(),
            text.split('\x0C'),
        ))
    }
}

struct RejectingParser;

impl DocumentParser for RejectingParser {
    fn parse(&self, path: &Path) -> lumina_parser::Result<ParsedDocument> {
        Err(ParserError::PdfError(format!(
            "{} is not a PDF file (missing %PDF header)",
            path.display()
        )))
    }
}

/// Remembers every context it is given
#[derive(Default)]
struct RecordingLlm {
    contexts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for RecordingLlm {
    async fn complete(&self, _question: &str, context: &str) -> Result<String, CompletionError> {
        self.contexts.lock().unwrap().push(context.to_string());
        Ok("stub answer".to_string())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct KeylessLlm;

#[async_trait]
impl LlmClient for KeylessLlm {
    async fn complete(&self, _question: &str, _context: &str) -> Result<String, CompletionError> {
        Err(CompletionError::MissingCredential {
            provider: "Perplexity".to_string(),
        })
    }

    fn name(&self) -> &str {
        "keyless"
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

async fn test_app(parser: Arc<dyn DocumentParser>, llm: Arc<dyn LlmClient>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let (router, state) = create_router_for_testing(dir.path(), parser, llm)
        .await
        .unwrap();
    TestApp {
        router,
        state,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn chat_request(method: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/api/chat/")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/upload/")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

// =============================================================================
// Page and Health Tests
// =============================================================================

#[tokio::test]
async fn test_index_serves_chat_page() {
    let app = test_app(Arc::new(TextParser), Arc::new(RecordingLlm::default())).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("<title>Lumina</title>"));
    assert!(html.contains("/static/js/main.js"));

    let script = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/static/js/main.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(script.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app(Arc::new(TextParser), Arc::new(RecordingLlm::default())).await;

    let (status, json) = send(
        &app.router,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["vector_backend"], "local");
    assert_eq!(json["indexed_chunks"], 0);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_openapi_document() {
    let app = test_app(Arc::new(TextParser), Arc::new(RecordingLlm::default())).await;

    let (status, json) = send(
        &app.router,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/chat/"].is_object());
}

// =============================================================================
// Chat Tests
// =============================================================================

#[tokio::test]
async fn test_chat_rejects_other_methods() {
    let app = test_app(Arc::new(TextParser), Arc::new(RecordingLlm::default())).await;

    for method in ["GET", "PUT", "DELETE"] {
        let (status, json) = send(&app.router, chat_request(method, "")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json, json!({"error": "Invalid method"}));
    }
}

#[tokio::test]
async fn test_chat_without_query() {
    let app = test_app(Arc::new(TextParser), Arc::new(RecordingLlm::default())).await;

    for body in [
        r#"{}"#,
        r#"{"query": ""}"#,
        r#"{"query": "   "}"#,
        r#"{"query": null}"#,
        "not json at all",
    ] {
        let (status, json) = send(&app.router, chat_request("POST", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json, json!({"error": "No query provided"}));
    }
}

#[tokio::test]
async fn test_chat_oversized_body_keeps_error_envelope() {
    let llm = Arc::new(RecordingLlm::default());
    let app = test_app(Arc::new(TextParser), llm.clone()).await;

    let limit = app.state.config.server.max_body_size;
    let question = "q".repeat(limit + 1);
    let body = format!(r#"{{"query": "{question}"}}"#);
    let (status, json) = send(&app.router, chat_request("POST", &body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].as_str().unwrap().contains("length limit"));
    assert!(llm.contexts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_on_empty_store_uses_empty_context() {
    let llm = Arc::new(RecordingLlm::default());
    let app = test_app(Arc::new(TextParser), llm.clone()).await;

    let (status, json) = send(
        &app.router,
        chat_request("POST", r#"{"query": "What is in the handbook?"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"answer": "stub answer"}));
    assert_eq!(llm.contexts.lock().unwrap().as_slice(), &[String::new()]);
}

#[tokio::test]
async fn test_chat_reports_completion_failure_as_answer() {
    let app = test_app(Arc::new(TextParser), Arc::new(KeylessLlm)).await;

    let (status, json) = send(
        &app.router,
        chat_request("POST", r#"{"query": "Anyone there?"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer"], "Error: Perplexity API Key is missing.");
}

// =============================================================================
// Upload Tests
// =============================================================================

#[tokio::test]
async fn test_upload_rejects_get() {
    let app = test_app(Arc::new(TextParser), Arc::new(RecordingLlm::default())).await;

    let (status, json) = send(
        &app.router,
        Request::builder()
            .uri("/api/upload/")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"status": "error", "message": "Invalid request"}));
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let app = test_app(Arc::new(TextParser), Arc::new(RecordingLlm::default())).await;

    let (status, json) = send(
        &app.router,
        multipart_request("attachment", "handbook.pdf", "text"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"status": "error", "message": "Invalid request"}));

    let (status, _) = send(
        &app.router,
        Request::builder()
            .method("POST")
            .uri("/api/upload/")
            .header("Content-Type", "application/json")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.state.registry.list(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_then_chat_uses_document() {
    let llm = Arc::new(RecordingLlm::default());
    let app = test_app(Arc::new(TextParser), llm.clone()).await;

    let content = "Vacation policy: staff receive twenty days of paid leave.\x0C\
                   Expense reports are due within thirty days of travel.";
    let (status, json) = send(
        &app.router,
        multipart_request("file", "handbook.pdf", content),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({"status": "success", "message": "File uploaded and processed successfully."})
    );

    let records = app.state.registry.list(10, 0).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].processed);
    assert!(records[0].display_name().ends_with("_handbook.pdf"));
    assert!(Path::new(&records[0].file_path).exists());
    assert_eq!(app.state.vector_store.count().await.unwrap(), 1);

    let (status, listing) = send(
        &app.router,
        Request::builder()
            .uri("/api/documents/")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["documents"][0]["processed"], true);

    let (status, json) = send(
        &app.router,
        chat_request("POST", r#"{"query": "When are expense reports due?"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer"], "stub answer");

    let contexts = llm.contexts.lock().unwrap();
    assert!(contexts[0].contains("Expense reports are due within thirty days"));
}

#[tokio::test]
async fn test_failed_ingestion_keeps_record_unprocessed() {
    let app = test_app(Arc::new(RejectingParser), Arc::new(RecordingLlm::default())).await;

    let (status, json) = send(
        &app.router,
        multipart_request("file", "notes.txt", "plain text"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status"], "error");
    assert!(json["message"].as_str().unwrap().contains("not a PDF"));

    let records = app.state.registry.list(10, 0).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].processed);
    assert_eq!(app.state.vector_store.count().await.unwrap(), 0);
}
