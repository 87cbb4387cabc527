//! Configuration for the HR assistant
//!
//! Loads configuration from config.yml file

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default constants (fallback if config.yml not found)
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const KNOWLEDGE_COLLECTION: &str = "hr_knowledge";
pub const MEMORY_COLLECTION: &str = "user_memories";
pub const DEFAULT_CHUNK_SIZE: usize = 128;
pub const DEFAULT_CHUNK_OVERLAP: usize = 16;
pub const DEFAULT_TOP_K: usize = 8;
pub const DEFAULT_GRAPH_DEPTH: usize = 4;
pub const DEFAULT_EMBEDDING_DIM: usize = 256;
pub const DEFAULT_MEMORY_TOP_K: usize = 5;
pub const DEFAULT_USER_ID: &str = "user_andrei";
pub const DEFAULT_CANDIDATE_THRESHOLD: f32 = 0.8;
pub const DEFAULT_MERGE_THRESHOLD: f32 = 0.9;

/// YAML config structures
#[derive(Debug, Deserialize)]
struct YamlConfig {
    server: Option<ServerConfig>,
    openai: Option<OpenAIConfig>,
    qdrant: Option<QdrantConfig>,
    neo4j: Option<Neo4jConfig>,
    rag: Option<RagConfig>,
    memory: Option<MemoryConfig>,
    curation: Option<CurationConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerConfig {
    host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    port: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct QdrantConfig {
    url: Option<String>,
    knowledge_collection: Option<String>,
    memory_collection: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Neo4jConfig {
    uri: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RagConfig {
    vector_backend: Option<String>,
    graph_backend: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    top_k: Option<usize>,
    graph_depth: Option<usize>,
    embedding_dim: Option<usize>,
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryConfig {
    top_k: Option<usize>,
    default_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CurationConfig {
    metric: Option<String>,
    threshold: Option<f32>,
    merge_threshold: Option<f32>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub qdrant_url: String,
    pub knowledge_collection: String,
    pub memory_collection: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub vector_backend: String,
    pub graph_backend: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub graph_depth: usize,
    pub embedding_dim: usize,
    pub retrieval_mode: String,
    pub memory_top_k: usize,
    pub default_user: String,
    pub curation_metric: String,
    pub candidate_threshold: f32,
    pub merge_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::defaults())
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        // If value from YAML looks like ${...}, try env var
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                // Extract var name from ${VAR_NAME}
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return env_val;
                }
            }
        }
        // Also check explicit env_key as fallback
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        value.unwrap_or_default()
    }

    /// Resolve a port from string config or env var
    fn resolve_env_u16(value: Option<String>, env_key: &str, default: u16) -> u16 {
        // If value from YAML looks like ${...}, try env var
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    if let Ok(parsed) = env_val.parse::<u16>() {
                        return parsed;
                    }
                }
            }
            // Try parsing directly if it's a number
            if let Ok(parsed) = v.parse::<u16>() {
                return parsed;
            }
        }
        // Fallback: check explicit env_key
        if let Ok(env_val) = std::env::var(env_key) {
            if let Ok(parsed) = env_val.parse::<u16>() {
                return parsed;
            }
        }
        default
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        // Try to load from current directory first, then parent
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        // Load .env file first
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        let server = yaml.server.unwrap_or_default();
        let openai = yaml.openai.unwrap_or_default();
        let qdrant = yaml.qdrant.unwrap_or_default();
        let neo4j = yaml.neo4j.unwrap_or_default();
        let rag = yaml.rag.unwrap_or_default();
        let memory = yaml.memory.unwrap_or_default();
        let curation = yaml.curation.unwrap_or_default();

        // Resolve values with env var precedence
        let openai_api_key = Self::resolve_env_string(openai.api_key, "OPENAI_API_KEY");
        let base_url = Self::resolve_env_string(openai.base_url, "OPENAI_BASE_URL");
        let qdrant_url = Self::resolve_env_string(qdrant.url, "QDRANT_URL");
        let neo4j_uri = Self::resolve_env_string(neo4j.uri, "NEO4J_URI");
        let neo4j_user = Self::resolve_env_string(neo4j.username, "NEO4J_USERNAME");
        let neo4j_password = Self::resolve_env_string(neo4j.password, "NEO4J_PASSWORD");
        let port = Self::resolve_env_u16(server.port, "PORT", DEFAULT_PORT);

        Ok(Self {
            host: server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            openai_api_key,
            openai_base_url: if base_url.is_empty() {
                None
            } else {
                Some(base_url)
            },
            chat_model: openai.model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: openai
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            max_tokens: openai.max_tokens.unwrap_or(512),
            temperature: openai.temperature.unwrap_or(0.7),
            qdrant_url: if qdrant_url.is_empty() {
                DEFAULT_QDRANT_URL.to_string()
            } else {
                qdrant_url
            },
            knowledge_collection: qdrant
                .knowledge_collection
                .unwrap_or_else(|| KNOWLEDGE_COLLECTION.to_string()),
            memory_collection: qdrant
                .memory_collection
                .unwrap_or_else(|| MEMORY_COLLECTION.to_string()),
            neo4j_uri: if neo4j_uri.is_empty() {
                DEFAULT_NEO4J_URI.to_string()
            } else {
                neo4j_uri
            },
            neo4j_user: if neo4j_user.is_empty() {
                DEFAULT_NEO4J_USER.to_string()
            } else {
                neo4j_user
            },
            neo4j_password,
            vector_backend: rag.vector_backend.unwrap_or_else(|| "qdrant".to_string()),
            graph_backend: rag.graph_backend.unwrap_or_else(|| "neo4j".to_string()),
            chunk_size: rag.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            chunk_overlap: rag.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            top_k: rag.top_k.unwrap_or(DEFAULT_TOP_K),
            graph_depth: rag.graph_depth.unwrap_or(DEFAULT_GRAPH_DEPTH),
            embedding_dim: rag.embedding_dim.unwrap_or(DEFAULT_EMBEDDING_DIM),
            retrieval_mode: rag.mode.unwrap_or_else(|| "mix".to_string()),
            memory_top_k: memory.top_k.unwrap_or(DEFAULT_MEMORY_TOP_K),
            default_user: memory
                .default_user
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            curation_metric: curation.metric.unwrap_or_else(|| "cosine".to_string()),
            candidate_threshold: curation.threshold.unwrap_or(DEFAULT_CANDIDATE_THRESHOLD),
            merge_threshold: curation
                .merge_threshold
                .unwrap_or(DEFAULT_MERGE_THRESHOLD),
        })
    }

    /// Create config with built-in defaults (fallback)
    pub fn defaults() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            max_tokens: 512,
            temperature: 0.7,
            qdrant_url: std::env::var("QDRANT_URL")
                .unwrap_or_else(|_| DEFAULT_QDRANT_URL.to_string()),
            knowledge_collection: KNOWLEDGE_COLLECTION.to_string(),
            memory_collection: MEMORY_COLLECTION.to_string(),
            neo4j_uri: std::env::var("NEO4J_URI")
                .unwrap_or_else(|_| DEFAULT_NEO4J_URI.to_string()),
            neo4j_user: std::env::var("NEO4J_USERNAME")
                .unwrap_or_else(|_| DEFAULT_NEO4J_USER.to_string()),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or_default(),
            vector_backend: "qdrant".to_string(),
            graph_backend: "neo4j".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            graph_depth: DEFAULT_GRAPH_DEPTH,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            retrieval_mode: "mix".to_string(),
            memory_top_k: DEFAULT_MEMORY_TOP_K,
            default_user: DEFAULT_USER_ID.to_string(),
            curation_metric: "cosine".to_string(),
            candidate_threshold: DEFAULT_CANDIDATE_THRESHOLD,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
        }
    }

    /// Whether an OpenAI API key is configured
    pub fn has_openai_key(&self) -> bool {
        !self.openai_api_key.is_empty()
    }

    /// Socket address string for the API server
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
