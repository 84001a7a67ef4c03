//! Source-document reading.
//!
//! [`DocumentReader`] wraps one opened PDF file: it probes the raw bytes for
//! the encryption dictionary, classifies the supplied password, loads the
//! decrypted document, and exposes pages, metadata and the derived
//! encryption descriptor. Ownership is scoped: a reader holds no locks and
//! needs no explicit close, dropping it releases everything.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::encryption::{self, Encryption, EncryptionStatus};
use crate::error::{PdfBindError, Result};
use crate::metadata::{Metadata, PageLayout, PdfVersion};
use crate::page::{PdfPage, Size};

/// An opened source document.
#[derive(Debug)]
pub struct DocumentReader {
    path: PathBuf,
    password: String,
    document: Document,
    status: EncryptionStatus,
    encryption: Encryption,
}

impl DocumentReader {
    /// Open the PDF at `path`, applying `password` when non-empty.
    ///
    /// # Errors
    ///
    /// - [`PdfBindError::FileNotFound`] / [`PdfBindError::FileNotAccessible`]
    ///   for filesystem problems
    /// - [`PdfBindError::PasswordRejected`] when the document is encrypted
    ///   and the password matches neither the owner nor the user password
    /// - [`PdfBindError::UnsupportedEncryption`] for non-standard handlers
    /// - [`PdfBindError::FailedToLoadPdf`] for structural problems
    pub fn open(path: impl AsRef<Path>, password: &str) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PdfBindError::file_not_found(path.to_path_buf())
            } else {
                PdfBindError::FileNotAccessible {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let check = encryption::check_access(&bytes, path, password)?;
        let status = encryption::resolve_status(&check, password);
        let descriptor = encryption::resolve_encryption(&check, password, status);

        let document = match (&check.dict, check.role) {
            (Some(dict), Some(role)) => {
                let plaintext =
                    encryption::decrypt::decrypt_document(&bytes, dict, password, role)
                        .ok_or_else(|| {
                            PdfBindError::failed_to_load_pdf(
                                path.to_path_buf(),
                                "encrypted content could not be decrypted".to_string(),
                            )
                        })?;
                Document::load_mem(&plaintext)
            }
            _ => Document::load_mem(&bytes),
        }
        .map_err(|e| PdfBindError::failed_to_load_pdf(path.to_path_buf(), e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            password: password.to_string(),
            document,
            status,
            encryption: descriptor,
        })
    }

    /// Path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Access level the supplied password earned.
    pub fn status(&self) -> EncryptionStatus {
        self.status
    }

    /// Write-side encryption descriptor derived from this document.
    pub fn encryption(&self) -> &Encryption {
        &self.encryption
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Materialize page entries for every page of the document.
    ///
    /// Each entry carries this reader's path and password, the page's
    /// 1-based number, its intrinsic rotation and its original size, so it
    /// can be appended to a composer directly.
    pub fn pages(&self) -> Vec<PdfPage> {
        self.document
            .get_pages()
            .into_iter()
            .map(|(number, id)| {
                PdfPage::new(&self.path, number)
                    .with_password(&self.password)
                    .with_rotation(self.page_rotation(id))
                    .with_original_size(self.page_size(id))
            })
            .collect()
    }

    /// Document metadata: version, Info-dictionary fields, page layout.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata {
            version: PdfVersion::parse(&self.document.version),
            ..Metadata::default()
        };

        if let Some(info) = self.info_dict() {
            metadata.title = info_text(info, b"Title");
            metadata.author = info_text(info, b"Author");
            metadata.subject = info_text(info, b"Subject");
            metadata.keywords = info_text(info, b"Keywords");
            metadata.creator = info_text(info, b"Creator");
            metadata.producer = info_text(info, b"Producer");
        }

        if let Ok(catalog) = self.document.catalog() {
            if let Ok(name) = catalog.get(b"PageLayout").and_then(Object::as_name) {
                metadata.page_layout = PageLayout::from_name(&String::from_utf8_lossy(name));
            }
        }

        metadata
    }

    /// Borrow the decrypted document.
    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    /// Consume the reader, keeping only the decrypted document.
    pub(crate) fn into_document(self) -> Document {
        self.document
    }

    fn info_dict(&self) -> Option<&Dictionary> {
        let info = self.document.trailer.get(b"Info").ok()?;
        let info = match info {
            Object::Reference(id) => self.document.get_object(*id).ok()?,
            other => other,
        };
        info.as_dict().ok()
    }

    /// Intrinsic `/Rotate` of a page, following `Parent` links for
    /// inherited values.
    pub(crate) fn page_rotation(&self, page_id: ObjectId) -> i32 {
        self.inherited_attribute(page_id, b"Rotate")
            .and_then(|object| object.as_i64().ok())
            .map(|degrees| degrees as i32)
            .unwrap_or(0)
    }

    /// `/MediaBox` extent of a page, following `Parent` links.
    fn page_size(&self, page_id: ObjectId) -> Size {
        let media_box = match self.inherited_attribute(page_id, b"MediaBox") {
            Some(object) => object,
            None => return Size::default(),
        };
        let coords: Vec<f64> = match media_box.as_array() {
            Ok(array) => array.iter().filter_map(object_as_f64).collect(),
            Err(_) => return Size::default(),
        };
        if coords.len() != 4 {
            return Size::default();
        }
        Size::new((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs())
    }

    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = page_id;
        // Bounded walk; malformed files can have Parent cycles.
        for _ in 0..64 {
            let dict = self.document.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                let value = match value {
                    Object::Reference(id) => self.document.get_object(*id).ok()?,
                    other => other,
                };
                return Some(value.clone());
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => current = *parent,
                _ => return None,
            }
        }
        None
    }
}

pub(crate) fn object_as_f64(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn info_text(info: &Dictionary, key: &[u8]) -> Option<String> {
    let object = info.get(key).ok()?;
    let bytes = object.as_str().ok()?;
    let text = decode_pdf_text(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Decode a PDF text string: UTF-16BE when the BOM is present, otherwise
/// byte-per-character.
pub(crate) fn decode_pdf_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Open a document on a blocking worker thread.
pub async fn load_document(path: PathBuf, password: String) -> Result<DocumentReader> {
    tokio::task::spawn_blocking(move || DocumentReader::open(&path, &password))
        .await
        .map_err(|e| PdfBindError::other(format!("loader task failed: {e}")))?
}

/// Classify the access status of many documents concurrently.
///
/// Opens up to `workers` documents at a time; results pair each input path
/// with its outcome and arrive in completion order.
pub async fn classify_all(
    requests: Vec<(PathBuf, String)>,
    workers: usize,
) -> Vec<(PathBuf, Result<EncryptionStatus>)> {
    let workers = workers.max(1);
    let tasks = requests.into_iter().map(|(path, password)| async move {
        let status = load_document(path.clone(), password)
            .await
            .map(|reader| reader.status());
        (path, status)
    });

    stream::iter(tasks)
        .buffer_unordered(workers)
        .collect::<Vec<_>>()
        .await
}
