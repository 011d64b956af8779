pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{split_documents, split_text};
pub use config::{ChunkingConfig, EmbeddingConfig, IndexerConfig, StoreConfig};
pub use embeddings::{Embedder, OpenAiEmbedder};
pub use error::{IngestError, Result};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use gate::{check_store, StoreStatus};
pub use ingest::{discover_pdf_files, load_documents, LoadedDocuments};
pub use models::{ChunkMetadata, ChunkRecord, DocumentRecord, IndexOutcome, IndexSummary};
pub use orchestrator::IndexPipeline;
pub use store::{read_chunks, StoreManifest, StoredChunk};
pub use stores::LocalVectorStore;
pub use traits::VectorStore;
