//! Error types for package operations

use thiserror::Error;

/// Errors that can occur while reading or writing a document package
#[derive(Error, Debug)]
pub enum PackageError {
    /// Error reading or writing the ZIP archive
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Error reading or writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error processing a template part
    #[error("Template error: {0}")]
    Core(#[from] doctwig_core::Error),

    /// Required file not found in archive
    #[error("Required file not found: {0}")]
    MissingFile(String),

    /// Archive is neither an OpenDocument nor a WordprocessingML package
    #[error("Unsupported package: {0}")]
    Unsupported(String),
}

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PackageError>;
