//! Error types for pdfbind.
//!
//! This module defines all error types that can occur while reading source
//! documents or composing an output document. Errors are designed to be
//! informative and actionable, providing clear context about what went wrong
//! and how to fix it.
//!
//! # Error Categories
//!
//! - **I/O Errors**: File not found, permission denied, etc.
//! - **Source Errors**: Invalid PDF structure, rejected passwords, bad images
//! - **Compose Errors**: Problems during the merge or stamp pass

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for pdfbind operations.
pub type Result<T> = std::result::Result<T, PdfBindError>;

/// Main error type for pdfbind operations.
///
/// All fallible operations in pdfbind use this type, which provides detailed
/// context about what went wrong and where.
#[derive(Debug)]
pub enum PdfBindError {
    /// Source file was not found.
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Source file is not accessible (permission denied, etc.).
    FileNotAccessible {
        /// Path to the inaccessible file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A source document rejected the supplied password.
    PasswordRejected {
        /// Path to the document that rejected the password.
        path: PathBuf,
    },

    /// A source document uses an encryption scheme this crate cannot handle.
    UnsupportedEncryption {
        /// Path to the document.
        path: PathBuf,
        /// Details about the scheme.
        details: String,
    },

    /// Failed to load a source PDF.
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to decode a source image.
    FailedToLoadImage {
        /// Path to the image file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Source PDF is corrupted or has invalid structure.
    CorruptedPdf {
        /// Path to the corrupted PDF.
        path: PathBuf,
        /// Details about the corruption.
        details: String,
    },

    /// A page entry references a page the source document does not have.
    PageOutOfRange {
        /// Path to the source document.
        path: PathBuf,
        /// Requested 1-based page number.
        page: u32,
        /// Total pages in the document.
        total_pages: usize,
    },

    /// The composer was asked to save with an empty page list.
    NoPagesToCompose,

    /// Failed to create the output file.
    FailedToCreateOutput {
        /// Path where output should be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to write to the output file.
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The merge or stamp pass failed.
    SaveFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Metadata could not be written to the output document.
    MetadataFailed {
        /// Details about the failure.
        reason: String,
    },

    /// Generic I/O error.
    Io {
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Generic error with a custom message.
    Other {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for PdfBindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound { path } => {
                write!(f, "File not found: {}", path.display())
            }
            Self::FileNotAccessible { path, source } => {
                write!(
                    f,
                    "Cannot access file: {}\n  Reason: {}",
                    path.display(),
                    source
                )
            }
            Self::PasswordRejected { path } => {
                write!(
                    f,
                    "Password rejected by encrypted document: {}\n  \
                     Hint: Supply the document's owner or user password",
                    path.display()
                )
            }
            Self::UnsupportedEncryption { path, details } => {
                write!(
                    f,
                    "Unsupported encryption in: {}\n  Details: {}",
                    path.display(),
                    details
                )
            }
            Self::FailedToLoadPdf { path, reason } => {
                write!(
                    f,
                    "Failed to load PDF: {}\n  Reason: {}",
                    path.display(),
                    reason
                )
            }
            Self::FailedToLoadImage { path, reason } => {
                write!(
                    f,
                    "Failed to decode image: {}\n  Reason: {}",
                    path.display(),
                    reason
                )
            }
            Self::CorruptedPdf { path, details } => {
                write!(
                    f,
                    "Corrupted or invalid PDF: {}\n  Details: {}",
                    path.display(),
                    details
                )
            }
            Self::PageOutOfRange {
                path,
                page,
                total_pages,
            } => {
                write!(
                    f,
                    "Page {} does not exist in: {}\n  \
                     Document has {} page(s)",
                    page,
                    path.display(),
                    total_pages
                )
            }
            Self::NoPagesToCompose => {
                write!(f, "No pages have been added to the composer")
            }
            Self::FailedToCreateOutput { path, source } => {
                write!(
                    f,
                    "Failed to create output file: {}\n  Reason: {}",
                    path.display(),
                    source
                )
            }
            Self::FailedToWrite { path, source } => {
                write!(
                    f,
                    "Failed to write to output file: {}\n  Reason: {}",
                    path.display(),
                    source
                )
            }
            Self::SaveFailed { reason } => {
                write!(f, "Save operation failed: {reason}")
            }
            Self::MetadataFailed { reason } => {
                write!(f, "Failed to set metadata: {reason}")
            }
            Self::Io { source } => {
                write!(f, "I/O error: {source}")
            }
            Self::Other { message } => {
                write!(f, "{message}")
            }
        }
    }
}

impl std::error::Error for PdfBindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FileNotAccessible { source, .. } => Some(source),
            Self::FailedToCreateOutput { source, .. } => Some(source),
            Self::FailedToWrite { source, .. } => Some(source),
            Self::Io { source } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for PdfBindError {
    fn from(err: io::Error) -> Self {
        Self::Io { source: err }
    }
}

impl From<lopdf::Error> for PdfBindError {
    fn from(err: lopdf::Error) -> Self {
        Self::other(err.to_string())
    }
}

impl From<anyhow::Error> for PdfBindError {
    fn from(err: anyhow::Error) -> Self {
        Self::other(err.to_string())
    }
}

impl PdfBindError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    /// Create a PasswordRejected error.
    pub fn password_rejected(path: PathBuf) -> Self {
        Self::PasswordRejected { path }
    }

    /// Create an UnsupportedEncryption error.
    pub fn unsupported_encryption(path: PathBuf, details: impl Into<String>) -> Self {
        Self::UnsupportedEncryption {
            path,
            details: details.into(),
        }
    }

    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path,
            reason: reason.into(),
        }
    }

    /// Create a FailedToLoadImage error.
    pub fn failed_to_load_image(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FailedToLoadImage {
            path,
            reason: reason.into(),
        }
    }

    /// Create a CorruptedPdf error.
    pub fn corrupted_pdf(path: PathBuf, details: impl Into<String>) -> Self {
        Self::CorruptedPdf {
            path,
            details: details.into(),
        }
    }

    /// Create a SaveFailed error.
    pub fn save_failed(reason: impl Into<String>) -> Self {
        Self::SaveFailed {
            reason: reason.into(),
        }
    }

    /// Create a MetadataFailed error.
    pub fn metadata_failed(reason: impl Into<String>) -> Self {
        Self::MetadataFailed {
            reason: reason.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (a caller iterating over many
    /// sources may reasonably skip the offending file and continue).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FailedToLoadPdf { .. }
                | Self::FailedToLoadImage { .. }
                | Self::CorruptedPdf { .. }
                | Self::PasswordRejected { .. }
                | Self::UnsupportedEncryption { .. }
                | Self::PageOutOfRange { .. }
        )
    }
}
