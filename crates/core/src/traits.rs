use crate::{ChunkRecord, IngestError};
use async_trait::async_trait;
use std::path::Path;

/// Write-once persistence for chunks and their embeddings.
#[async_trait]
pub trait VectorStore {
    /// Directory the store occupies once built.
    fn location(&self) -> &Path;

    async fn persist(
        &self,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
        embedding_model: &str,
    ) -> Result<(), IngestError>;
}
