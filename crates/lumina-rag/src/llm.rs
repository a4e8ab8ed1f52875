//! Completion client implementations
//!
//! `ChatCompletionClient` speaks the OpenAI-compatible `/chat/completions`
//! protocol used by Perplexity and OpenAI; `OllamaChatClient` talks to a
//! local Ollama server. Neither retries or streams.

use async_trait::async_trait;
use lumina_core::{CompletionError, LlmClient, LlmConfig, LlmProvider, LuminaError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Instruction sent as the system message of every completion
pub const SYSTEM_PROMPT: &str = "You are Lumina, a helpful AI assistant. Answer the user's question based on the provided context. If the answer is not in the context, say so politely.";

/// User message carrying the retrieved context and the question verbatim
pub fn user_message(question: &str, context: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}")
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

fn grounded_messages(question: &str, context: &str) -> Vec<Message> {
    vec![
        Message::new("system", SYSTEM_PROMPT),
        Message::new("user", user_message(question, context)),
    ]
}

fn build_http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| LuminaError::Config(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Raw outcome of a connectivity probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// HTTP status returned by the endpoint
    pub status: u16,

    /// Response body as received
    pub body: String,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Text of the first choice, when the body is a completion
    pub fn answer(&self) -> Option<String> {
        serde_json::from_str::<ChatResponse>(&self.body)
            .ok()
            .and_then(|r| r.choices.into_iter().next())
            .map(|c| c.message.content)
    }
}

/// Client for OpenAI-compatible chat-completion APIs (Perplexity, OpenAI)
pub struct ChatCompletionClient {
    client: Client,
    provider: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionClient {
    /// Create a client; a missing key is reported per request, not here
    pub fn new(
        provider: impl Into<String>,
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider: provider.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.1,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());

        let mut client = Self::new(
            config.provider.display_name(),
            config.api_key().map(str::to_string),
            base_url,
            config.model.clone(),
        )
        .with_temperature(config.temperature);
        client.client = build_http_client(config.timeout_secs.map(Duration::from_secs))?;
        Ok(client)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Model used by `complete`
    pub fn model(&self) -> &str {
        &self.model
    }

    fn key(&self) -> std::result::Result<&str, CompletionError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| CompletionError::MissingCredential {
                provider: self.provider.clone(),
            })
    }

    async fn send(
        &self,
        key: &str,
        request: &ChatRequest<'_>,
    ) -> std::result::Result<reqwest::Response, CompletionError> {
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))
    }

    /// Send a single user message to `model` and report what came back.
    ///
    /// Non-2xx answers are returned as outcomes rather than errors so a
    /// caller can walk through candidate models.
    pub async fn probe(
        &self,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<ProbeOutcome, CompletionError> {
        let key = self.key()?;
        let request = ChatRequest {
            model,
            messages: vec![Message::new("user", prompt)],
            temperature: self.temperature,
        };

        let response = self.send(key, &request).await?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        Ok(ProbeOutcome { status, body })
    }
}

#[async_trait]
impl LlmClient for ChatCompletionClient {
    async fn complete(
        &self,
        question: &str,
        context: &str,
    ) -> std::result::Result<String, CompletionError> {
        let key = self.key()?;
        let request = ChatRequest {
            model: &self.model,
            messages: grounded_messages(question, context),
            temperature: self.temperature,
        };

        let response = self.send(key, &request).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream { status, body });
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(format!("invalid JSON body: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                CompletionError::MalformedResponse("response contained no choices".to_string())
            })
    }

    fn name(&self) -> &str {
        &self.provider
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama chat API client
pub struct OllamaChatClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Message,
}

impl OllamaChatClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.1,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.ollama_url.clone());

        let mut client = Self::new(base_url, config.model.clone());
        client.temperature = config.temperature;
        client.client = build_http_client(config.timeout_secs.map(Duration::from_secs))?;
        Ok(client)
    }
}

#[async_trait]
impl LlmClient for OllamaChatClient {
    async fn complete(
        &self,
        question: &str,
        context: &str,
    ) -> std::result::Result<String, CompletionError> {
        let request = OllamaRequest {
            model: &self.model,
            messages: grounded_messages(question, context),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream { status, body });
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(format!("invalid JSON body: {e}")))?;

        Ok(result.message.content)
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create a completion client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Perplexity | LlmProvider::OpenAI => {
            Ok(Arc::new(ChatCompletionClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaChatClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::Mutex;

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn client(base_url: &str, key: Option<&str>) -> ChatCompletionClient {
        ChatCompletionClient::new("Perplexity", key.map(str::to_string), base_url, "sonar")
    }

    #[test]
    fn test_user_message_layout() {
        assert_eq!(
            user_message("What is the leave policy?", "Leave is 20 days."),
            "Context:\nLeave is 20 days.\n\nQuestion: What is the leave policy?"
        );
        assert_eq!(user_message("Q", ""), "Context:\n\n\nQuestion: Q");
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits() {
        // Port 9 is never contacted: the key check comes first
        let client = client("http://127.0.0.1:9", None);
        let err = client.complete("question", "context").await.unwrap_err();
        assert_eq!(err.to_string(), "Error: Perplexity API Key is missing.");

        let blank = ChatCompletionClient::new(
            "Perplexity",
            Some("   ".to_string()),
            "http://127.0.0.1:9",
            "sonar",
        );
        assert!(matches!(
            blank.complete("q", "c").await,
            Err(CompletionError::MissingCredential { .. })
        ));
    }

    #[tokio::test]
    async fn test_request_shape_and_answer() {
        let captured: Arc<Mutex<Option<(Option<String>, Value)>>> = Arc::new(Mutex::new(None));
        let sink = captured.clone();
        let app = Router::new().route(
            "/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *sink.lock().unwrap() = Some((auth, body));
                    Json(json!({
                        "choices": [{"message": {"role": "assistant", "content": "Twenty days."}}]
                    }))
                }
            }),
        );
        let base = spawn_upstream(app).await;

        let answer = client(&base, Some("pplx-test"))
            .complete("How much leave?", "Leave is 20 days.")
            .await
            .unwrap();
        assert_eq!(answer, "Twenty days.");

        let (auth, body) = captured.lock().unwrap().take().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer pplx-test"));
        assert_eq!(body["model"], "sonar");
        assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(
            body["messages"][1]["content"],
            "Context:\nLeave is 20 days.\n\nQuestion: How much leave?"
        );
    }

    #[tokio::test]
    async fn test_upstream_error_carries_body() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "{\"error\":\"invalid key\"}") }),
        );
        let base = spawn_upstream(app).await;

        let err = client(&base, Some("bad")).complete("q", "c").await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Upstream {
                status: 401,
                body: "{\"error\":\"invalid key\"}".to_string()
            }
        );
        assert!(err.to_string().starts_with("Error contacting AI:"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = spawn_upstream(app).await;

        let err = client(&base, Some("key")).complete("q", "c").await.unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"), Some("key"))
            .complete("q", "c")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network_error");
    }

    #[tokio::test]
    async fn test_probe_reports_status_and_body() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                if body["model"] == "sonar" {
                    (
                        StatusCode::OK,
                        Json(json!({"choices": [{"message": {"role": "assistant", "content": "Hello!"}}]})),
                    )
                } else {
                    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid model"})))
                }
            }),
        );
        let base = spawn_upstream(app).await;
        let client = client(&base, Some("key"));

        let ok = client.probe("sonar", "Hello").await.unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.answer().as_deref(), Some("Hello!"));

        let bad = client.probe("sonar-small-online", "Hello").await.unwrap();
        assert_eq!(bad.status, 400);
        assert!(bad.body.contains("invalid model"));
        assert_eq!(bad.answer(), None);
    }

    #[tokio::test]
    async fn test_ollama_chat() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["stream"], false);
                Json(json!({"message": {"role": "assistant", "content": "local answer"}}))
            }),
        );
        let base = spawn_upstream(app).await;

        let client = OllamaChatClient::new(base, "llama3");
        assert_eq!(client.complete("q", "c").await.unwrap(), "local answer");
    }

    #[test]
    fn test_factory_uses_provider_defaults() {
        let config = LlmConfig::default();
        let client = create_llm_client(&config).unwrap();
        assert_eq!(client.name(), "Perplexity");

        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            ..Default::default()
        };
        assert_eq!(create_llm_client(&config).unwrap().name(), "Ollama");
    }

    #[test]
    fn test_from_config_with_timeout() {
        let config = LlmConfig {
            timeout_secs: Some(5),
            perplexity_api_key: Some("key".to_string()),
            ..Default::default()
        };
        let client = ChatCompletionClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://api.perplexity.ai");
        assert_eq!(client.model(), "sonar");
    }
}
