pub mod cmap;
pub mod docx;
pub mod layout;
pub mod pdf;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use layout::{extract, ExtractionMode, PageSource, TextSpan};
pub use pdf::PdfDocument;

use crate::config::ExtractionSettings;
use crate::error::{IngestError, Result};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "doc"];

/// Text of one page, `page_index` starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub page_index: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            // legacy .doc goes through the same reader and fails there
            "docx" | "doc" => Ok(DocumentKind::Docx),
            _ => Err(IngestError::Unsupported {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub path: PathBuf,
    pub pages: Vec<RawPage>,
}

impl ExtractedDocument {
    /// Non-empty pages joined by newlines.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn is_supported(path: &Path) -> bool {
    DocumentKind::from_path(path).is_ok()
}

/// Extract every page of `path`. Fails on unreadable or text-less documents.
pub fn load_document(path: &Path, params: &ExtractionSettings) -> Result<ExtractedDocument> {
    let kind = DocumentKind::from_path(path)?;
    if !path.is_file() {
        return Err(IngestError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }

    let pages = match kind {
        DocumentKind::Pdf => {
            let pdf = PdfDocument::open(path)?;
            (1..=pdf.page_count())
                .map(|page_index| RawPage {
                    page_index,
                    text: extract(&pdf, page_index, params.mode, params),
                })
                .collect::<Vec<_>>()
        }
        DocumentKind::Docx => vec![RawPage {
            page_index: 1,
            text: docx::read_docx(path)?,
        }],
    };

    let doc = ExtractedDocument {
        path: path.to_path_buf(),
        pages,
    };
    if doc.pages.iter().all(|p| p.text.trim().is_empty()) {
        warn!(path = %path.display(), "no extractable text");
        return Err(IngestError::Empty {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), pages = doc.pages.len(), mode = %params.mode, "document extracted");
    Ok(doc)
}

/// Prefix one document's text with its `=== 파일: <path> ===` wrapper line.
pub fn wrap_source(path: &Path, text: &str) -> String {
    format!("=== 파일: {} ===\n{}", path.display(), text)
}

pub fn concat_sources<'a, I>(sources: I) -> String
where
    I: IntoIterator<Item = (&'a Path, &'a str)>,
{
    sources
        .into_iter()
        .map(|(path, text)| wrap_source(path, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Supported documents under `dir` whose file name contains `date_token` (YYMMDD).
pub fn find_files_by_date(dir: &Path, date_token: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().contains(date_token))
        .map(|e| e.into_path())
        .filter(|p| is_supported(p))
        .collect();
    found.sort();
    info!(dir = %dir.display(), date = date_token, files = found.len(), "documents selected");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/B.PDF")).unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("x.doc")).unwrap(), DocumentKind::Docx);
        assert!(matches!(
            DocumentKind::from_path(Path::new("notes.txt")),
            Err(IngestError::Unsupported { .. })
        ));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn wrapper_lines() {
        let joined = concat_sources([
            (Path::new("FW팀_김상일_일일업무일지.pdf"), "본문 1"),
            (Path::new("b.docx"), "본문 2"),
        ]);
        assert_eq!(
            joined,
            "=== 파일: FW팀_김상일_일일업무일지.pdf ===\n본문 1\n\n=== 파일: b.docx ===\n본문 2"
        );
    }

    #[test]
    fn text_skips_blank_pages() {
        let doc = ExtractedDocument {
            path: PathBuf::from("a.pdf"),
            pages: vec![
                RawPage { page_index: 1, text: "하나".into() },
                RawPage { page_index: 2, text: "  ".into() },
                RawPage { page_index: 3, text: "셋".into() },
            ],
        };
        assert_eq!(doc.text(), "하나\n셋");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_document(Path::new("/nonexistent/a.pdf"), &ExtractionSettings::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn finds_files_by_date_token() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("FW팀");
        fs::create_dir_all(&nested).unwrap();
        for name in ["김상일_251125.pdf", "전상민_251125.docx", "메모_251125.txt", "김상일_251124.pdf"] {
            fs::write(nested.join(name), b"x").unwrap();
        }
        fs::write(dir.path().join("요약_251125.doc"), b"x").unwrap();

        let found = find_files_by_date(dir.path(), "251125").unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["FW팀/김상일_251125.pdf", "FW팀/전상민_251125.docx", "요약_251125.doc"]
        );
    }

    #[test]
    fn missing_dir_is_error() {
        assert!(find_files_by_date(Path::new("/nonexistent/dir"), "251125").is_err());
    }
}
