use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding model could not be loaded. Fatal at startup.
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// A build was required but the source corpus is missing.
    #[error("Corpus not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    /// A persisted artifact (index or document list) is absent.
    #[error("Index not found: {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("Index not ready: ensure_index() has not completed")]
    IndexNotReady,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidQuery(_))
    }

    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
