//! pdfbind - Compose PDF documents from pages, images, and metadata.
//!
//! This library builds a new PDF document out of an ordered list of page
//! entries, where each entry is either a page of an existing PDF or a
//! standalone raster image. It supports:
//!
//! - Page-level composition with per-entry rotation
//! - Bookmark (outline) relocation across the merge
//! - Attachment (embedded file) consolidation
//! - Metadata and viewer-layout stamping
//! - Password classification and re-encryption of the output
//! - Asynchronous page rendering behind a pluggable rasterizer
//!
//! # Examples
//!
//! ## Composing a document
//!
//! ```no_run
//! use pdfbind::{Binder, DocumentReader, ImagePage, PdfPage};
//!
//! # fn example() -> pdfbind::Result<()> {
//! let mut binder = Binder::new();
//!
//! // Every page of a.pdf, then a scanned image, then page 2 of c.pdf.
//! for page in DocumentReader::open("a.pdf", "")?.pages() {
//!     binder.add(page);
//! }
//! binder.add(ImagePage::new("b.jpg"));
//! binder.add(PdfPage::new("c.pdf", 2).with_rotation(90));
//!
//! binder.metadata.title = Some("Bound Volume".to_string());
//! binder.save("out.pdf")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Classifying encrypted sources
//!
//! ```no_run
//! use pdfbind::{classify_all, EncryptionStatus};
//! use std::path::PathBuf;
//!
//! # async fn example() {
//! let requests = vec![
//!     (PathBuf::from("plain.pdf"), String::new()),
//!     (PathBuf::from("locked.pdf"), "password".to_string()),
//! ];
//! for (path, status) in classify_all(requests, 4).await {
//!     match status {
//!         Ok(EncryptionStatus::NotEncrypted) => println!("{}: open", path.display()),
//!         Ok(status) => println!("{}: {status:?}", path.display()),
//!         Err(error) => eprintln!("{}: {error}", path.display()),
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bind;
pub mod encryption;
pub mod error;
pub mod io;
pub mod metadata;
pub mod page;
pub mod render;

#[cfg(test)]
mod test_fixtures;

// Re-export commonly used types
pub use bind::{Binder, OutlineEntry};
pub use encryption::{Encryption, EncryptionMethod, EncryptionStatus, Permissions};
pub use error::{PdfBindError, Result};
pub use io::{classify_all, load_document, DocumentReader, PdfWriter, WriteOptions};
pub use metadata::{Metadata, PageLayout, PdfVersion};
pub use page::{ImagePage, Page, PdfPage, Size};
pub use render::{PageRasterizer, RenderError, RenderQueue};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
