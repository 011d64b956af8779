use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_index_core::config::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_BASE_URL,
    DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL,
};
use pdf_index_core::{
    check_store, read_chunks, ChunkingConfig, EmbeddingConfig, IndexOutcome, IndexPipeline,
    IndexSummary, IndexerConfig, LocalVectorStore, LopdfExtractor, OpenAiEmbedder, StoreConfig,
    StoreManifest, StoreStatus, VectorStore,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-index", version, about = "Build a local vector store from a folder of PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Folder that holds the PDFs to index
    #[arg(long, env = "PDF_INDEX_DATASET_DIR", default_value = "dataset")]
    dataset_dir: PathBuf,

    /// Directory the vector store is written to
    #[arg(long, env = "PDF_INDEX_STORE_DIR", default_value = "db/vector_store_with_metadata")]
    store_dir: PathBuf,

    /// Collection name recorded in the store manifest
    #[arg(long, env = "PDF_INDEX_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Hosted embedding model
    #[arg(long, env = "PDF_INDEX_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_EMBEDDING_BASE_URL)]
    embedding_base_url: String,

    /// API key for the embedding service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Requested embedding size, if the model supports shortening
    #[arg(long)]
    embedding_dimensions: Option<usize>,

    /// Texts per embedding request
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_BATCH_SIZE)]
    batch_size: usize,

    /// Per-request timeout for the embedding service
    #[arg(long, default_value = "600")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Build the vector store unless it already exists (default).
    Build,
    /// Report whether the store exists and what it holds.
    Status,
}

impl Cli {
    fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            dataset_dir: self.dataset_dir.clone(),
            chunking: ChunkingConfig {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            },
            embedding: EmbeddingConfig {
                model: self.embedding_model.clone(),
                base_url: self.embedding_base_url.clone(),
                api_key: self.openai_api_key.clone(),
                dimensions: self.embedding_dimensions,
                batch_size: self.batch_size,
                timeout: Duration::from_secs(self.timeout_secs),
            },
        }
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            directory: self.store_dir.clone(),
            collection: self.collection.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.indexer_config();
    let store_config = cli.store_config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-index boot"
    );

    match cli.command.unwrap_or(Command::Build) {
        Command::Build => build(config, &store_config).await,
        Command::Status => status(&store_config.directory),
    }
}

async fn build(config: IndexerConfig, store_config: &StoreConfig) -> anyhow::Result<()> {
    println!("Dataset directory: {}", config.dataset_dir.display());
    println!("Persistent directory: {}", store_config.directory.display());

    let embedder =
        OpenAiEmbedder::new(&config.embedding).context("failed to configure embedding client")?;
    let store = LocalVectorStore::from_config(store_config);
    let pipeline = IndexPipeline::new(config, LopdfExtractor, embedder, store);

    match pipeline.run().await.context("indexing failed")? {
        IndexOutcome::Skipped => {
            println!("Vector store already exists. No need to initialize.");
        }
        IndexOutcome::Built(summary) => {
            for line in summary_lines(&summary) {
                println!("{line}");
            }
            println!(
                "Vector store written to {} at {}",
                pipeline.store().location().display(),
                Utc::now().to_rfc3339()
            );
        }
    }

    Ok(())
}

fn summary_lines(summary: &IndexSummary) -> Vec<String> {
    vec![
        format!("Dataset files: {:?}", summary.sources),
        format!("Number of document chunks: {}", summary.chunks),
        format!(
            "Indexed {} page(s) from {} file(s) into {} chunk(s) of dimension {}",
            summary.documents, summary.files, summary.chunks, summary.dimensions
        ),
    ]
}

fn status(store_dir: &Path) -> anyhow::Result<()> {
    if check_store(store_dir) == StoreStatus::NeedsBuild {
        println!("No vector store at {}", store_dir.display());
        return Ok(());
    }

    let manifest = match StoreManifest::read(store_dir) {
        Ok(manifest) => manifest,
        Err(error) => {
            warn!(path = %store_dir.display(), %error, "store directory has no readable manifest");
            println!(
                "{} exists but is not a readable vector store: {error}",
                store_dir.display()
            );
            return Ok(());
        }
    };

    println!("Vector store: {}", store_dir.display());
    println!("  collection={}", manifest.collection);
    println!("  model={} dimensions={}", manifest.embedding_model, manifest.dimensions);
    println!("  chunks={} created_at={}", manifest.chunk_count, manifest.created_at.to_rfc3339());

    let chunks = read_chunks(store_dir).context("failed to read stored chunks")?;
    let mut per_source = BTreeMap::<&str, usize>::new();
    for chunk in &chunks {
        *per_source.entry(chunk.metadata.source.as_str()).or_default() += 1;
    }
    for (source, count) in per_source {
        println!("  source={source} chunks={count}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{summary_lines, Cli, Command};
    use clap::{CommandFactory, Parser};
    use pdf_index_core::IndexSummary;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_build_with_default_chunking() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["pdf-index", "--chunk-overlap", "0"])?;
        assert!(cli.command.is_none());

        let config = cli.indexer_config();
        assert_eq!(config.chunking.chunk_size, 1_000);
        assert_eq!(config.chunking.chunk_overlap, 0);
        assert_eq!(config.embedding.timeout.as_secs(), 600);
        Ok(())
    }

    #[test]
    fn status_subcommand_parses() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["pdf-index", "--store-dir", "/tmp/store", "status"])?;
        assert!(matches!(cli.command, Some(Command::Status)));
        assert_eq!(cli.store_config().directory, std::path::PathBuf::from("/tmp/store"));
        assert_eq!(cli.store_config().collection, "pdf_chunks");
        Ok(())
    }

    #[test]
    fn build_summary_lists_files_and_chunk_count() {
        let summary = IndexSummary {
            sources: vec!["a.pdf".to_string(), "b.pdf".to_string()],
            files: 2,
            documents: 3,
            chunks: 5,
            dimensions: 1536,
        };

        let lines = summary_lines(&summary);
        assert_eq!(lines[0], r#"Dataset files: ["a.pdf", "b.pdf"]"#);
        assert_eq!(lines[1], "Number of document chunks: 5");
    }
}
