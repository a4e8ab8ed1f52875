//! Lumina Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults that run the whole pipeline locally.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// On-disk state locations
    pub storage: StorageConfig,

    /// Completion provider configuration
    pub llm: LlmConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Ingestion and retrieval parameters
    pub rag: RagConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; blank values count as unset
    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Server
        if let Some(host) = env("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(size) = env("MAX_UPLOAD_BYTES") {
            self.server.max_body_size = parse_value("MAX_UPLOAD_BYTES", size)?;
        }
        if let Some(origins) = env("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Storage
        if let Some(dir) = env("DOCUMENTS_DIR") {
            self.storage.documents_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env("VECTOR_STORE_DIR") {
            self.storage.vector_store_dir = PathBuf::from(dir);
        }
        if let Some(backend) = env("VECTOR_BACKEND") {
            self.storage.vector_backend = backend.parse()?;
        }
        if let Some(url) = env("DATABASE_URL") {
            self.storage.database_url = url;
        }
        if let Some(url) = env("QDRANT_URL") {
            self.storage.qdrant_url = url;
        }
        if let Some(collection) = env("QDRANT_COLLECTION") {
            self.storage.qdrant_collection = collection;
        }

        // LLM
        if let Some(provider) = env("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = env("PPLX_API_KEY") {
            self.llm.perplexity_api_key = Some(key);
        }
        if let Some(key) = env("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = env("LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = env("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(secs) = env("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = Some(parse_value("LLM_TIMEOUT_SECS", secs)?);
        }
        if let Some(url) = env("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }

        // Embeddings
        if let Some(provider) = env("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = env("EMBEDDING_MODEL") {
            self.embedding.model = Some(model);
        }

        // RAG
        if let Some(k) = env("RAG_TOP_K") {
            self.rag.top_k = parse_value("RAG_TOP_K", k)?;
        }

        // Logging
        if let Some(level) = env("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes (bounds uploads)
    pub max_body_size: usize,

    /// Allowed origins for CORS; empty disables the CORS layer
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 25 * 1024 * 1024, // 25MB
            cors_origins: vec![],
        }
    }
}

/// Where uploaded files, vectors and document records live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory receiving uploaded files
    pub documents_dir: PathBuf,

    /// Directory of the local vector store
    pub vector_store_dir: PathBuf,

    /// Which vector store implementation to use
    pub vector_backend: VectorBackend,

    /// SQLx connection URL of the document registry
    pub database_url: String,

    /// Qdrant gRPC URL (qdrant backend only)
    pub qdrant_url: String,

    /// Qdrant collection name (qdrant backend only)
    pub qdrant_collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("documents"),
            vector_store_dir: PathBuf::from("vector_store"),
            vector_backend: VectorBackend::Local,
            database_url: "sqlite://lumina.db?mode=rwc".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_collection: "lumina_chunks".to_string(),
        }
    }
}

/// Supported vector store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Local,
    Qdrant,
}

impl std::str::FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Completion provider to use
    pub provider: LlmProvider,

    /// Perplexity API key
    #[serde(skip_serializing)]
    pub perplexity_api_key: Option<String>,

    /// OpenAI API key
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// Override of the provider's API base URL
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds; unset keeps the HTTP client default
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// API key for the configured provider, if it needs one
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            LlmProvider::Perplexity => self.perplexity_api_key.as_deref(),
            LlmProvider::OpenAI => self.openai_api_key.as_deref(),
            LlmProvider::Ollama => None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Perplexity,
            perplexity_api_key: None,
            openai_api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "sonar".to_string(),
            temperature: 0.1,
            timeout_secs: None,
        }
    }
}

/// Supported completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Perplexity,
    OpenAI,
    Ollama,
}

impl LlmProvider {
    /// Human-readable provider name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Perplexity => "Perplexity",
            Self::OpenAI => "OpenAI",
            Self::Ollama => "Ollama",
        }
    }

    /// Default API base URL
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Perplexity => "https://api.perplexity.ai",
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "perplexity" | "pplx" => Ok(Self::Perplexity),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider turns text into vectors
    pub provider: EmbeddingProvider,

    /// Model name; each provider has its own default
    pub model: Option<String>,

    /// Output dimension of the local hashing embedder
    pub local_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: None,
            local_dimension: 384,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Local,
    OpenAI,
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Ingestion and retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Chunks retrieved per question
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.llm.model, "sonar");
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.llm.timeout_secs, None);
        assert_eq!(config.storage.vector_backend, VectorBackend::Local);
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "perplexity".parse::<LlmProvider>().unwrap(),
            LlmProvider::Perplexity
        );
        assert_eq!("PPLX".parse::<LlmProvider>().unwrap(), LlmProvider::Perplexity);
        assert_eq!(
            "ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_api_key_follows_provider() {
        let mut llm = LlmConfig {
            perplexity_api_key: Some("pplx-key".to_string()),
            ..Default::default()
        };
        assert_eq!(llm.api_key(), Some("pplx-key"));

        llm.provider = LlmProvider::OpenAI;
        assert_eq!(llm.api_key(), None);

        llm.provider = LlmProvider::Ollama;
        assert_eq!(llm.api_key(), None);
    }

    #[test]
    fn test_from_file_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lumina.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9100

[rag]
top_k = 5
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.chunk_size, 1000);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/lumina.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_vars(vars(&[
                ("PPLX_API_KEY", "pplx-secret"),
                ("API_PORT", " 9000 "),
                ("LOG_FORMAT", "JSON"),
                ("CORS_ORIGINS", "http://a.test, ,http://b.test"),
                ("VECTOR_BACKEND", "qdrant"),
                ("RAG_TOP_K", "5"),
            ]))
            .unwrap();

        assert_eq!(config.llm.api_key(), Some("pplx-secret"));
        assert_eq!(config.server.port, 9000);
        assert!(config.logging.json_format);
        assert_eq!(
            config.server.cors_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.storage.vector_backend, VectorBackend::Qdrant);
        assert_eq!(config.rag.top_k, 5);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_vars(vars(&[
                ("PPLX_API_KEY", "   "),
                ("API_PORT", ""),
                ("LLM_MODEL", "\t"),
            ]))
            .unwrap();

        assert_eq!(config.llm.api_key(), None);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "sonar");
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_vars(vars(&[("API_PORT", "eighty")]))
            .unwrap_err();

        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "API_PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lumina.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9100

[llm]
model = "sonar-pro"
"#,
        )
        .unwrap();

        let mut config = AppConfig::from_file(&path).unwrap();
        config
            .apply_vars(vars(&[("API_PORT", "9200"), ("LOG_LEVEL", "debug")]))
            .unwrap();

        assert_eq!(config.server.port, 9200);
        assert_eq!(config.llm.model, "sonar-pro");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_backend() {
        let err = "redis".parse::<VectorBackend>().unwrap_err();
        assert!(err.to_string().contains("VECTOR_BACKEND"));
    }
}
