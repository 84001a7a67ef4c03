//! Output-document writing.
//!
//! [`PdfWriter`] saves a composed document to disk with:
//! - Atomic writes (write to temp file, then rename)
//! - Optional full-stream compression
//! - Object renumbering and unreferenced-object pruning
//!
//! The writer is synchronous; the composer's save path runs on the caller's
//! thread from start to finish.

use lopdf::Document;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PdfBindError, Result};

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Use atomic writes (write to temp file, then rename).
    pub atomic: bool,

    /// Compress content streams before writing.
    pub compress: bool,

    /// Renumber objects and prune unreferenced ones.
    pub optimize: bool,

    /// Buffer size for writing (in bytes).
    pub buffer_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            atomic: true,
            compress: false,
            optimize: true,
            buffer_size: 8192,
        }
    }
}

/// PDF writer with configurable behavior.
#[derive(Debug, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a new PDF writer with default options.
    pub fn new() -> Self {
        Self {
            options: WriteOptions::default(),
        }
    }

    /// Create a writer with custom options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Create a writer that compresses content streams.
    pub fn compressing() -> Self {
        Self {
            options: WriteOptions {
                compress: true,
                ..Default::default()
            },
        }
    }

    /// Save a document to `path`, returning the written file size.
    ///
    /// The document is mutated by compression and renumbering; callers that
    /// need the original intact should clone first.
    ///
    /// # Errors
    ///
    /// Returns [`PdfBindError::FailedToCreateOutput`] when the output file
    /// cannot be created and [`PdfBindError::FailedToWrite`] for failures
    /// during the write or the final rename.
    pub fn save(&self, doc: &mut Document, path: &Path) -> Result<u64> {
        if self.options.compress {
            doc.compress();
        }
        if self.options.optimize {
            doc.prune_objects();
            doc.renumber_objects();
        }

        let write_path = if self.options.atomic {
            temp_sibling(path)
        } else {
            path.to_path_buf()
        };

        let file = std::fs::File::create(&write_path).map_err(|e| {
            PdfBindError::FailedToCreateOutput {
                path: write_path.clone(),
                source: e,
            }
        })?;

        let mut writer = std::io::BufWriter::with_capacity(self.options.buffer_size, file);

        let written = doc.save_to(&mut writer).map_err(|e| {
            // A failed atomic write must not leave the temp file behind.
            let _ = std::fs::remove_file(&write_path);
            PdfBindError::FailedToWrite {
                path: write_path.clone(),
                source: std::io::Error::other(e),
            }
        });

        written.and_then(|_| {
            writer.flush().map_err(|e| PdfBindError::FailedToWrite {
                path: write_path.clone(),
                source: e,
            })
        })?;

        if self.options.atomic {
            std::fs::rename(&write_path, path).map_err(|e| {
                let _ = std::fs::remove_file(&write_path);
                PdfBindError::FailedToWrite {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        }

        Ok(std::fs::metadata(path).map(|m| m.len()).unwrap_or(0))
    }
}

/// Temp-file path next to the target, so the final rename never crosses a
/// filesystem boundary.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output.pdf".into());
    name.push(".tmp");
    path.with_file_name(name)
}
