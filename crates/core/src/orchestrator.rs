use crate::embeddings::Embedder;
use crate::gate::{check_store, StoreStatus};
use crate::traits::VectorStore;
use crate::{
    load_documents, split_documents, IndexOutcome, IndexSummary, IndexerConfig, IngestError,
    PdfExtractor,
};
use tracing::info;

/// Runs gate, load, chunk, embed and persist in order, each stage consuming
/// the full output of the previous one.
pub struct IndexPipeline<X, E, S>
where
    X: PdfExtractor,
    E: Embedder,
    S: VectorStore,
{
    config: IndexerConfig,
    extractor: X,
    embedder: E,
    store: S,
}

impl<X, E, S> IndexPipeline<X, E, S>
where
    X: PdfExtractor,
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
{
    pub fn new(config: IndexerConfig, extractor: X, embedder: E, store: S) -> Self {
        Self {
            config,
            extractor,
            embedder,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn run(&self) -> Result<IndexOutcome, IngestError> {
        let location = self.store.location();
        if check_store(location) == StoreStatus::Built {
            info!(path = %location.display(), "vector store already exists");
            return Ok(IndexOutcome::Skipped);
        }
        info!(path = %location.display(), "vector store missing, building");

        let loaded = load_documents(&self.config.dataset_dir, &self.extractor)?;
        info!(
            files = loaded.files.len(),
            documents = loaded.documents.len(),
            empty_pages = loaded.empty_pages,
            "loaded documents"
        );

        let chunks = split_documents(&loaded.documents, self.config.chunking)?;
        info!(chunks = chunks.len(), "split documents into chunks");

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IngestError::EmbeddingResponse(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        info!(model = %self.embedder.model(), dimensions, "created embeddings");

        self.store
            .persist(&chunks, &embeddings, self.embedder.model())
            .await?;

        Ok(IndexOutcome::Built(IndexSummary {
            files: loaded.files.len(),
            sources: loaded.sources,
            documents: loaded.documents.len(),
            chunks: chunks.len(),
            dimensions,
        }))
    }
}
