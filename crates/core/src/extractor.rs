use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// Zero-based position of the page in the document.
    pub index: u32,
    pub text: String,
}

/// Pulls plain text out of a PDF, one entry per page in page order.
///
/// Implementations return every page, including pages with no text; filtering
/// empty pages is left to the loader so it can report them.
pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load(path)
            .map_err(|error| IngestError::PdfParse(format!("{}: {error}", path.display())))?;

        let mut pages = Vec::new();
        // get_pages is keyed by 1-based page number and iterates in order.
        for (index, (page_no, _page_id)) in document.get_pages().into_iter().enumerate() {
            let text = document.extract_text(&[page_no]).map_err(|error| {
                IngestError::PdfParse(format!("{} page {page_no}: {error}", path.display()))
            })?;

            pages.push(PageText {
                index: index as u32,
                text,
            });
        }

        Ok(pages)
    }
}
