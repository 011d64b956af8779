//! On-disk layout shared by the store writer and anything that inspects a built store.

use crate::{ChunkMetadata, IngestError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const STORE_FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHUNKS_FILE: &str = "chunks.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreManifest {
    pub format_version: u32,
    pub collection: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl StoreManifest {
    pub fn read(directory: &Path) -> Result<Self, IngestError> {
        let bytes = std::fs::read(directory.join(MANIFEST_FILE))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// One line of `chunks.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// Borrowed form used while writing, so chunks are not cloned.
#[derive(Serialize)]
pub(crate) struct StoredChunkRef<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub metadata: &'a ChunkMetadata,
    pub embedding: &'a [f32],
}

pub fn read_chunks(directory: &Path) -> Result<Vec<StoredChunk>, IngestError> {
    let contents = std::fs::read_to_string(directory.join(CHUNKS_FILE))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(IngestError::from))
        .collect()
}
