use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("dataset directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("no documents were loaded from {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("no chunks were created from {documents} document(s)")]
    EmptyChunkSet { documents: usize },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("embedding request failed: {0}")]
    EmbeddingTransport(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {details}")]
    EmbeddingService { status: u16, details: String },

    #[error("invalid embedding response: {0}")]
    EmbeddingResponse(String),

    #[error("vector store write failed: {0}")]
    StoreWrite(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
