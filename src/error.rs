//! Error types for the mht2pdf library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mht2pdf library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid glob pattern built from the source root
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] glob::PatternError),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No usable browser executable
    #[error("No supported browser found ({0})")]
    BrowserNotFound(String),

    /// Path that cannot be expressed the way a consumer needs it
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// General error
    #[error("{0}")]
    General(String),
}
