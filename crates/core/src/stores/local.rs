use crate::store::{StoreManifest, StoredChunkRef, CHUNKS_FILE, MANIFEST_FILE, STORE_FORMAT_VERSION};
use crate::traits::VectorStore;
use crate::{ChunkRecord, IngestError, StoreConfig};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Directory-backed store. A build is written into a hidden sibling staging
/// directory and renamed onto the target only once complete, so the target
/// path never holds a partial store.
pub struct LocalVectorStore {
    directory: PathBuf,
    collection: String,
}

impl LocalVectorStore {
    pub fn new(directory: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            collection: collection.into(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.directory, &config.collection)
    }

    fn parent(&self) -> PathBuf {
        match self.directory.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn staging_prefix(&self) -> Result<String, IngestError> {
        let name = self
            .directory
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(self.directory.display().to_string()))?;
        Ok(format!(".{name}.staging-"))
    }

    /// Deletes staging directories left behind by interrupted builds.
    async fn remove_stale_staging(&self, parent: &Path, prefix: &str) -> Result<(), IngestError> {
        let mut entries = fs::read_dir(parent).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_stale = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix));
            if is_stale && entry.file_type().await?.is_dir() {
                warn!(path = %entry.path().display(), "removing stale staging directory");
                fs::remove_dir_all(entry.path()).await?;
            }
        }
        Ok(())
    }

    async fn write_staging(
        &self,
        staging: &Path,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
        manifest: &StoreManifest,
    ) -> Result<(), IngestError> {
        fs::create_dir(staging).await?;

        let file = fs::File::create(staging.join(CHUNKS_FILE)).await?;
        let mut writer = tokio::io::BufWriter::new(file);
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let line = serde_json::to_vec(&StoredChunkRef {
                id: &chunk.chunk_id,
                text: &chunk.text,
                metadata: &chunk.metadata,
                embedding,
            })?;
            writer.write_all(&line).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        let mut manifest_file = fs::File::create(staging.join(MANIFEST_FILE)).await?;
        manifest_file
            .write_all(&serde_json::to_vec_pretty(manifest)?)
            .await?;
        manifest_file.sync_all().await?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn location(&self) -> &Path {
        &self.directory
    }

    async fn persist(
        &self,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
        embedding_model: &str,
    ) -> Result<(), IngestError> {
        if chunks.len() != embeddings.len() {
            return Err(IngestError::StoreWrite(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        if dimensions == 0 {
            return Err(IngestError::StoreWrite(
                "refusing to persist a store without embeddings".to_string(),
            ));
        }
        if let Some((position, embedding)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, embedding)| embedding.len() != dimensions)
        {
            return Err(IngestError::StoreWrite(format!(
                "embedding {position} has dimension {} != {dimensions}",
                embedding.len()
            )));
        }

        if self.directory.exists() {
            return Err(IngestError::StoreWrite(format!(
                "store already exists at {}",
                self.directory.display()
            )));
        }

        let parent = self.parent();
        let prefix = self.staging_prefix()?;
        fs::create_dir_all(&parent).await?;
        self.remove_stale_staging(&parent, &prefix).await?;

        let manifest = StoreManifest {
            format_version: STORE_FORMAT_VERSION,
            collection: self.collection.clone(),
            embedding_model: embedding_model.to_string(),
            dimensions,
            chunk_count: chunks.len(),
            created_at: Utc::now(),
        };

        let staging = parent.join(format!("{prefix}{}", Uuid::new_v4().simple()));
        if let Err(error) = self
            .write_staging(&staging, chunks, embeddings, &manifest)
            .await
        {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(error);
        }

        fs::rename(&staging, &self.directory).await?;
        info!(
            path = %self.directory.display(),
            chunks = chunks.len(),
            dimensions,
            "persisted vector store"
        );

        Ok(())
    }
}
