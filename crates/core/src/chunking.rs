use crate::config::ChunkingConfig;
use crate::error::IngestError;
use crate::models::{ChunkMetadata, ChunkRecord, DocumentRecord};
use sha2::{Digest, Sha256};

/// Greedy split into pieces of at most `chunk_size` characters.
///
/// When text remains past the current window, the piece ends at the last
/// whitespace inside the window; a window without whitespace is cut hard.
/// Whitespace at piece boundaries is dropped and blank pieces are skipped.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = config.chunk_size.max(1);
    let mut pieces = Vec::new();
    let mut start = skip_whitespace(&chars, 0);

    while start < chars.len() {
        let window_end = (start + size).min(chars.len());

        let (end, resume) = if window_end == chars.len() || chars[window_end].is_whitespace() {
            (window_end, window_end)
        } else {
            match chars[start..window_end]
                .iter()
                .rposition(|ch| ch.is_whitespace())
            {
                Some(offset) if offset > 0 => (start + offset, start + offset + 1),
                _ => (window_end, window_end),
            }
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim_end();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }

        let next = if config.chunk_overlap > 0 {
            end.saturating_sub(config.chunk_overlap).max(start + 1)
        } else {
            resume
        };
        start = skip_whitespace(&chars, next);
    }

    pieces
}

/// Splits every document and tags each piece with its parent's metadata.
pub fn split_documents(
    documents: &[DocumentRecord],
    config: ChunkingConfig,
) -> Result<Vec<ChunkRecord>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        for (position, text) in split_text(&document.text, config).into_iter().enumerate() {
            chunks.push(ChunkRecord {
                chunk_id: make_chunk_id(&document.metadata, position, &text),
                text,
                metadata: document.metadata.clone(),
            });
        }
    }

    if !documents.is_empty() && chunks.is_empty() {
        return Err(IngestError::EmptyChunkSet {
            documents: documents.len(),
        });
    }

    Ok(chunks)
}

fn skip_whitespace(chars: &[char], mut index: usize) -> usize {
    while index < chars.len() && chars[index].is_whitespace() {
        index += 1;
    }
    index
}

fn make_chunk_id(metadata: &ChunkMetadata, position: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(metadata.source.as_bytes());
    hasher.update(metadata.page.to_le_bytes());
    hasher.update((position as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
