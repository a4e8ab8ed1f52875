//! Lumina API - HTTP server
//!
//! Serves the chat page and the upload and chat endpoints on top of the
//! services held in [`state::AppState`].

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, routing::get, Json, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// OpenAPI document for the HTTP surface
#[derive(OpenApi)]
#[openapi(
    info(title = "Lumina", description = "Chat with your PDF documents"),
    paths(
        handlers::pages::index,
        handlers::documents::upload_document,
        handlers::documents::list_documents,
        handlers::chat::chat,
        handlers::health::health_check,
    ),
    components(schemas(
        error::UploadResponse,
        error::ErrorResponse,
        handlers::chat::ChatRequest,
        handlers::chat::ChatResponse,
        handlers::documents::DocumentInfo,
        handlers::documents::DocumentListResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "chat", description = "Question answering"),
        (name = "documents", description = "Upload and bookkeeping"),
        (name = "health", description = "Liveness"),
        (name = "pages", description = "Browser UI"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;

    let mut router = routes::app_routes()
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&server.cors_origins) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    if origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}

/// Router over throwaway storage for integration tests
#[cfg(feature = "test-utils")]
pub async fn create_router_for_testing(
    work_dir: &std::path::Path,
    parser: Arc<dyn lumina_parser::DocumentParser>,
    llm: Arc<dyn lumina_core::LlmClient>,
) -> lumina_core::Result<(Router, Arc<AppState>)> {
    use lumina_core::{AppConfig, SqliteRegistry};
    use lumina_parser::SlidingWindowSplitter;
    use lumina_rag::{DocumentIngestor, QueryOrchestrator};
    use lumina_vector::{EmbeddingClient, HashingEmbedding, LocalVectorStore, VectorStore};

    let mut config = AppConfig::default();
    config.storage.documents_dir = work_dir.join("documents");
    config.storage.vector_store_dir = work_dir.join("vector_store");
    config.storage.database_url = "sqlite::memory:".to_string();

    let registry = SqliteRegistry::connect(&config.storage.database_url).await?;
    let embedder: Arc<dyn EmbeddingClient> = Arc::new(HashingEmbedding::default());
    let store: Arc<dyn VectorStore> = Arc::new(
        LocalVectorStore::open(
            &config.storage.vector_store_dir,
            embedder.model_id(),
            embedder.dimension(),
        )
        .await?,
    );

    let ingestor = DocumentIngestor::new(
        parser,
        SlidingWindowSplitter::default(),
        embedder.clone(),
        store.clone(),
    );
    let orchestrator = QueryOrchestrator::new(embedder, store.clone(), llm, config.rag.top_k);

    let state = Arc::new(AppState::new(
        config,
        Arc::new(registry),
        store,
        Arc::new(ingestor),
        Arc::new(orchestrator),
    ));
    Ok((create_router(state.clone()), state))
}
