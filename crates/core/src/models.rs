use serde::{Deserialize, Serialize};

/// Provenance attached to every document and chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkMetadata {
    /// File name of the originating PDF, without its directory.
    pub source: String,
    /// Zero-based page index within the source file.
    pub page: u32,
}

/// Text of one non-empty PDF page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// What a completed build read and wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    /// File names of the PDFs read, in processing order.
    pub sources: Vec<String>,
    pub files: usize,
    pub documents: usize,
    pub chunks: usize,
    pub dimensions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The store directory already existed; nothing was read or written.
    Skipped,
    Built(IndexSummary),
}
