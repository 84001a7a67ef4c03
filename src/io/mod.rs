//! Reading source documents and writing composed output.

pub mod reader;
pub mod writer;

pub use reader::{classify_all, load_document, DocumentReader};
pub use writer::{PdfWriter, WriteOptions};
