use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop one document (or one stage setup) but never a whole run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported document type {extension:?} for {path:?}")]
    Unsupported { path: PathBuf, extension: String },

    #[error("PDF decode failed for {path:?}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("DOCX decode failed for {path:?}: {message}")]
    Docx { path: PathBuf, message: String },

    #[error("no extractable text in {path:?} (scanned or image-only?)")]
    Empty { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IngestError {
    pub fn pdf(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        IngestError::Pdf {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn docx(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        IngestError::Docx {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<regex::Error> for IngestError {
    fn from(e: regex::Error) -> Self {
        IngestError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
