//! Error types for the HR assistant

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("LLM API error: {0}")]
    LlmError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Vector store error: {0}")]
    VectorDbError(String),

    #[error("Graph store error: {0}")]
    GraphDbError(String),

    #[error("Memory store error: {0}")]
    MemoryError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<async_openai::error::OpenAIError> for Error {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Error::LlmError(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::VectorDbError(err.to_string())
    }
}

impl From<neo4rs::Error> for Error {
    fn from(err: neo4rs::Error) -> Self {
        Error::GraphDbError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::ConfigError("missing api key".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("missing api key"));
    }

    #[test]
    fn test_error_display_llm() {
        let err = Error::LlmError("rate limit exceeded".to_string());
        assert!(err.to_string().contains("LLM API error"));
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::EmbeddingError("empty batch".to_string());
        assert!(err.to_string().contains("Embedding error"));
        assert!(err.to_string().contains("empty batch"));
    }

    #[test]
    fn test_error_display_vector_db() {
        let err = Error::VectorDbError("collection missing".to_string());
        assert!(err.to_string().contains("Vector store error"));
        assert!(err.to_string().contains("collection missing"));
    }

    #[test]
    fn test_error_display_graph_db() {
        let err = Error::GraphDbError("cypher syntax".to_string());
        assert!(err.to_string().contains("Graph store error"));
        assert!(err.to_string().contains("cypher syntax"));
    }

    #[test]
    fn test_error_display_memory() {
        let err = Error::MemoryError("fact not found".to_string());
        assert!(err.to_string().contains("Memory store error"));
        assert!(err.to_string().contains("fact not found"));
    }

    #[test]
    fn test_error_display_invalid_argument() {
        let err = Error::InvalidArgument("missing required field".to_string());
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_error_display_connection() {
        let err = Error::ConnectionError("timeout".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Connection error"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_error_display_unknown() {
        let err = Error::Unknown("something went wrong".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Unknown error"));
        assert!(msg.contains("something went wrong"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_io_various_kinds() {
        let kinds = [
            std::io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::ConnectionRefused,
            std::io::ErrorKind::TimedOut,
        ];

        for kind in kinds {
            let io_err = std::io::Error::new(kind, "test");
            let err: Error = io_err.into();
            assert!(matches!(err, Error::IoError(_)));
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_from_serde_yaml() {
        let yaml_err = serde_yaml::from_str::<i32>("[broken").unwrap_err();
        let err: Error = yaml_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn test_error_serialization_from_json_type() {
        let json_err = serde_json::from_str::<String>("123").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn test_error_debug_impl() {
        let err = Error::LlmError("boom".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("LlmError"));
    }

    #[test]
    fn test_error_all_variants_debug() {
        let variants: Vec<Error> = vec![
            Error::ConfigError("config".to_string()),
            Error::LlmError("llm".to_string()),
            Error::EmbeddingError("embed".to_string()),
            Error::VectorDbError("vector".to_string()),
            Error::GraphDbError("graph".to_string()),
            Error::MemoryError("memory".to_string()),
            Error::SerializationError("serial".to_string()),
            Error::InvalidArgument("arg".to_string()),
            Error::ConnectionError("conn".to_string()),
            Error::Unknown("unknown".to_string()),
        ];

        for err in variants {
            let debug_str = format!("{:?}", err);
            assert!(!debug_str.is_empty());
        }
    }

    #[test]
    fn test_result_type_ok() {
        let result: Result<i32> = Ok(42);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err(Error::Unknown("test".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_map() {
        let result: Result<i32> = Ok(10);
        let mapped = result.map(|x| x * 2);
        assert_eq!(mapped.unwrap(), 20);
    }

    #[test]
    fn test_result_unwrap_or_else() {
        let result: Result<i32> = Err(Error::Unknown("error".to_string()));
        let value = result.unwrap_or_else(|_| 42);
        assert_eq!(value, 42);
    }
}
