use crate::{ChunkMetadata, DocumentRecord, IngestError, PdfExtractor};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const PREVIEW_CHARS: usize = 200;

/// Lists the `.pdf` files directly inside `folder`, sorted by path.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::MissingDirectory(folder.to_path_buf()));
    }

    let mut files = Vec::new();

    for item in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
    {
        let entry = item.map_err(|error| IngestError::Io(error.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

pub struct LoadedDocuments {
    pub files: Vec<PathBuf>,
    /// File names of `files`, as recorded in chunk metadata.
    pub sources: Vec<String>,
    pub documents: Vec<DocumentRecord>,
    pub empty_pages: usize,
}

/// Reads every PDF in `folder` and returns one record per page that has text.
///
/// Empty pages are logged and skipped. Any unreadable file aborts the load.
pub fn load_documents<X>(folder: &Path, extractor: &X) -> Result<LoadedDocuments, IngestError>
where
    X: PdfExtractor + ?Sized,
{
    let files = discover_pdf_files(folder)?;
    let names = files
        .iter()
        .map(|path| file_name(path))
        .collect::<Result<Vec<_>, _>>()?;
    info!(folder = %folder.display(), files = ?names, "discovered pdf files");

    let mut documents = Vec::new();
    let mut empty_pages = 0usize;

    for (path, source) in files.iter().zip(&names) {
        for page in extractor.extract_pages(path)? {
            if page.text.trim().is_empty() {
                info!(file = %source, page = page.index, "empty text on page");
                empty_pages += 1;
                continue;
            }

            debug!(
                file = %source,
                page = page.index,
                preview = %page.text.chars().take(PREVIEW_CHARS).collect::<String>(),
                "extracted page text"
            );

            documents.push(DocumentRecord {
                text: page.text,
                metadata: ChunkMetadata {
                    source: source.clone(),
                    page: page.index,
                },
            });
        }
    }

    if documents.is_empty() {
        return Err(IngestError::EmptyCorpus(folder.to_path_buf()));
    }

    Ok(LoadedDocuments {
        files,
        sources: names,
        documents,
        empty_pages,
    })
}

fn file_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}
