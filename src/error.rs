//! Import error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort an import run
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive is empty: {0}")]
    EmptyArchive(PathBuf),

    #[error("Export folder not found in archive (candidates: {0:?})")]
    ExportRootNotFound(Vec<String>),

    #[error("No .html export page found in {0}")]
    ExportPageNotFound(PathBuf),

    #[error("Multiple .html export pages found: {0:?}")]
    AmbiguousExportPage(Vec<String>),

    #[error("Export contains no memo entries")]
    NoMemos,

    #[error("Memo #{index} is missing its `{marker}` node")]
    MissingMarker { index: usize, marker: &'static str },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Another import is already using workspace {0}")]
    WorkspaceBusy(PathBuf),

    #[error("Archive fetch failed: {0}")]
    Fetch(String),

    #[error("Vault error: {0}")]
    Vault(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<ImportError> for String {
    fn from(err: ImportError) -> Self {
        err.to_string()
    }
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::Task(err.to_string())
    }
}

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;
