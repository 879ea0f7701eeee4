//! PDF text extraction module
//!
//! Extracts per-page text from PDF files using lopdf.

use crate::errors::IngestionError;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// Text of a single PDF page
#[derive(Debug, Clone, PartialEq)]
pub struct PageDocument {
    /// Path of the PDF the page belongs to
    pub source: String,
    /// Zero-based page number
    pub page: u32,
    pub text: String,
}

/// List the PDF files in `dir`, sorted by file name
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, IngestionError> {
    if !dir.is_dir() {
        return Err(IngestionError::DirectoryNotFound(dir.display().to_string()));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Load every page of every PDF in `dir`.
///
/// Files that fail to parse are logged and skipped.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_all_pdfs(dir: &Path) -> Result<Vec<PageDocument>, IngestionError> {
    let paths = list_pdfs(dir)?;
    info!(files = paths.len(), "Loading PDFs");

    let mut pages = Vec::new();
    for path in &paths {
        match extract_pages(path) {
            Ok(mut doc_pages) => {
                debug!(path = %path.display(), pages = doc_pages.len(), "PDF loaded");
                pages.append(&mut doc_pages);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load PDF, skipping");
            }
        }
    }

    info!(pages = pages.len(), "PDF loading complete");
    Ok(pages)
}

/// Extract the text of each page of a PDF file
pub fn extract_pages(path: &Path) -> Result<Vec<PageDocument>, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let source = path.display().to_string();
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

    debug!(page_count = page_numbers.len(), "Extracting text from PDF");

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_num in page_numbers {
        let text = match doc.extract_text(&[page_num]) {
            Ok(text) => clean_text(&text),
            Err(e) => {
                // Keep the page so numbering stays aligned with the file
                warn!(page = page_num, error = %e, "Failed to extract text from page");
                String::new()
            }
        };

        pages.push(PageDocument {
            source: source.clone(),
            page: page_num.saturating_sub(1),
            text,
        });
    }

    Ok(pages)
}

/// Clean extracted text, keeping line structure
fn clean_text(text: &str) -> String {
    let normalized = text
        .replace(['\u{FEFF}', '\0'], "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let mut out = String::with_capacity(normalized.len());
    let mut blank_run = 0;

    for line in normalized.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&line);
        out.push('\n');
    }

    out.trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Write a PDF with one page per entry in `pages`
    pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_clean_text() {
        let input = "Hello   World\n\n\n\nTest \u{201C}quoted\u{201D}";
        assert_eq!(clean_text(input), "Hello World\n\nTest \"quoted\"");
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = load_all_pdfs(&missing).unwrap_err();
        assert!(matches!(err, IngestionError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_list_pdfs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.PDF"), b"x").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
    }

    #[test]
    fn test_load_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(&dir.path().join("guide.pdf"), &["Opening hours", "Parking rules"]);
        std::fs::write(dir.path().join("broken.pdf"), b"definitely not a pdf").unwrap();

        let pages = load_all_pdfs(dir.path()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 0);
        assert_eq!(pages[1].page, 1);
        assert!(pages[0].text.contains("Opening hours"));
        assert!(pages[1].text.contains("Parking rules"));
        assert!(pages[0].source.ends_with("guide.pdf"));
    }
}
