use std::path::Path;

use mupdf::{Document, TextPageFlags};

use papercast_core::{BackendError, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the only one linking mupdf (AGPL-3.0), so the rest of the
/// workspace can be built against other backends.
///
/// Text blocks are separated by a blank line so the summarizer's paragraph
/// split sees the layout's paragraphs. Pages with no text are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Text blocks of one page, each block's lines joined by newlines.
fn page_blocks(page: &mupdf::Page) -> Result<Vec<String>, BackendError> {
    let text_page = page
        .to_text_page(TextPageFlags::empty())
        .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

    Ok(text_page
        .blocks()
        .map(|block| {
            block
                .lines()
                .map(|line| {
                    line.chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect())
}

/// Blank blocks are dropped and blocks are separated by a blank line; pages
/// left without text are skipped and the rest joined by a single newline.
pub fn join_pages(pages: Vec<Vec<String>>) -> String {
    pages
        .into_iter()
        .map(|blocks| {
            blocks
                .into_iter()
                .filter(|b| !b.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl PdfBackend for MupdfBackend {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;
        if !path.is_file() {
            return Err(BackendError::OpenError(format!(
                "no such file: {}",
                path.display()
            )));
        }

        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages = Vec::new();
        for page_result in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        {
            let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            pages.push(page_blocks(&page)?);
        }

        Ok(join_pages(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_open_error() {
        let err = MupdfBackend::new()
            .extract_text(Path::new("/nonexistent/definitely/missing.pdf"))
            .unwrap_err();
        assert!(matches!(err, BackendError::OpenError(_)));
    }

    fn page(blocks: &[&str]) -> Vec<String> {
        blocks.iter().map(|b| b.to_string()).collect()
    }

    #[test]
    fn blocks_are_separated_by_blank_line() {
        let text = join_pages(vec![page(&["First block\nsecond line", "Next block"])]);
        assert_eq!(text, "First block\nsecond line\n\nNext block");
    }

    #[test]
    fn whitespace_blocks_are_dropped() {
        let text = join_pages(vec![page(&["A", "   \n\t", "B"])]);
        assert_eq!(text, "A\n\nB");
    }

    #[test]
    fn empty_pages_are_skipped() {
        let text = join_pages(vec![
            page(&["one"]),
            page(&[]),
            page(&["  "]),
            page(&["two"]),
        ]);
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn pages_are_joined_by_single_newline() {
        let text = join_pages(vec![page(&["p1a", "p1b"]), page(&["p2"])]);
        assert_eq!(text, "p1a\n\np1b\np2");
    }

    #[test]
    fn no_pages_is_empty_text() {
        assert_eq!(join_pages(Vec::new()), "");
    }
}
