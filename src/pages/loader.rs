// src/pages/loader.rs
use std::path::{Path, PathBuf};

use lopdf::Document;

use crate::pages::models::PageText;
use crate::utils::error::SourceError;

/// Supplies the plain text of one report page by page identifier.
pub trait PageSource: Send + Sync {
    fn load_page(&self, page_number: u32) -> Result<PageText, SourceError>;
}

/// File name of a split-out report page, e.g. `page_083.pdf`.
pub fn page_file_name(page_number: u32, extension: &str) -> String {
    format!("page_{:03}.{}", page_number, extension)
}

/// Reads `page_NNN.pdf` files from a directory, one report page per document.
pub struct PdfPageSource {
    pages_dir: PathBuf,
}

impl PdfPageSource {
    pub fn new<P: AsRef<Path>>(pages_dir: P) -> Self {
        Self {
            pages_dir: pages_dir.as_ref().to_path_buf(),
        }
    }

    fn page_path(&self, page_number: u32) -> PathBuf {
        self.pages_dir.join(page_file_name(page_number, "pdf"))
    }
}

impl PageSource for PdfPageSource {
    fn load_page(&self, page_number: u32) -> Result<PageText, SourceError> {
        let path = self.page_path(page_number);
        if !path.is_file() {
            return Err(SourceError::DocumentNotFound(path.display().to_string()));
        }

        // The document is dropped at the end of this call.
        let document = Document::load(&path).map_err(|e| SourceError::PageRender {
            page: page_number,
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;

        // Each file holds a single rendered page; only the first one is read.
        let first_page = document
            .get_pages()
            .keys()
            .next()
            .copied()
            .ok_or_else(|| SourceError::PageRender {
                page: page_number,
                reason: format!("{} contains no pages", path.display()),
            })?;

        let text = document
            .extract_text(&[first_page])
            .map_err(|e| SourceError::PageRender {
                page: page_number,
                reason: e.to_string(),
            })?;

        tracing::debug!("Extracted {} bytes of text from {}", text.len(), path.display());
        Ok(PageText::from_text(page_number, &text))
    }
}

/// Reads pre-extracted `page_NNN.txt` files from a directory.
pub struct TextPageSource {
    pages_dir: PathBuf,
}

impl TextPageSource {
    pub fn new<P: AsRef<Path>>(pages_dir: P) -> Self {
        Self {
            pages_dir: pages_dir.as_ref().to_path_buf(),
        }
    }
}

impl PageSource for TextPageSource {
    fn load_page(&self, page_number: u32) -> Result<PageText, SourceError> {
        let path = self.pages_dir.join(page_file_name(page_number, "txt"));
        if !path.is_file() {
            return Err(SourceError::DocumentNotFound(path.display().to_string()));
        }

        let text = std::fs::read_to_string(&path)?;
        tracing::debug!("Read {} bytes of text from {}", text.len(), path.display());
        Ok(PageText::from_text(page_number, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_file_name_is_zero_padded() {
        assert_eq!(page_file_name(83, "pdf"), "page_083.pdf");
        assert_eq!(page_file_name(117, "txt"), "page_117.txt");
        assert_eq!(page_file_name(1234, "pdf"), "page_1234.pdf");
    }

    #[test]
    fn test_text_source_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page_085.txt"), "Header\nLiteracy rate 87th 0.977\n").unwrap();

        let source = TextPageSource::new(dir.path());
        let page = source.load_page(85).unwrap();

        assert_eq!(page.page_number, 85);
        assert_eq!(page.line(1), Some("Literacy rate 87th 0.977"));
    }

    #[test]
    fn test_missing_documents_are_reported() {
        let dir = tempfile::tempdir().unwrap();

        let text_err = TextPageSource::new(dir.path()).load_page(90).unwrap_err();
        assert!(matches!(text_err, SourceError::DocumentNotFound(ref p) if p.ends_with("page_090.txt")));

        let pdf_err = PdfPageSource::new(dir.path()).load_page(90).unwrap_err();
        assert!(matches!(pdf_err, SourceError::DocumentNotFound(ref p) if p.ends_with("page_090.pdf")));
    }

    #[test]
    fn test_unreadable_pdf_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page_091.pdf"), b"not a pdf at all").unwrap();

        let err = PdfPageSource::new(dir.path()).load_page(91).unwrap_err();
        assert!(matches!(err, SourceError::PageRender { page: 91, .. }));
    }
}
