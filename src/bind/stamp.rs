//! Stamp pass: metadata, viewer preferences, outlines, encryption.
//!
//! Runs against the reopened merge output, after which the document goes
//! straight to disk. Field writes target the Info dictionary; the page
//! layout and the consolidated outline land in the catalog; encryption is
//! translated into the engine's encryption state and must be the last
//! mutation before the final write (object keys bind to object numbers).

use std::time::SystemTime;

use lopdf::{Dictionary, Document, Object};
use md5::{Digest, Md5};

use crate::bind::bookmarks::{self, OutlineEntry};
use crate::encryption::{Encryption, EncryptionMethod};
use crate::error::{PdfBindError, Result};
use crate::metadata::Metadata;

/// Write metadata, the page layout and the consolidated outline into the
/// reopened merge output.
pub(crate) fn apply(
    doc: &mut Document,
    metadata: &Metadata,
    outline: &[OutlineEntry],
) -> Result<()> {
    doc.version = metadata.version.to_string();
    write_info(doc, metadata)?;

    let layout = metadata.page_layout.as_name();
    doc.catalog_mut()
        .map_err(|e| PdfBindError::metadata_failed(format!("no document catalog: {e}")))?
        .set("PageLayout", Object::Name(layout.as_bytes().to_vec()));

    bookmarks::attach_outline(doc, outline);
    Ok(())
}

fn write_info(doc: &mut Document, metadata: &Metadata) -> Result<()> {
    // Get or create the Info dictionary.
    let info_id = if let Ok(info_ref) = doc.trailer.get(b"Info").and_then(|i| i.as_reference()) {
        info_ref
    } else {
        let new_info_id = doc.new_object_id();
        doc.trailer.set("Info", Object::Reference(new_info_id));
        new_info_id
    };

    if !matches!(doc.get_object(info_id), Ok(Object::Dictionary(_))) {
        doc.objects.insert(info_id, Object::Dictionary(Dictionary::new()));
    }
    let info = match doc.get_object_mut(info_id) {
        Ok(Object::Dictionary(dict)) => dict,
        _ => {
            return Err(PdfBindError::metadata_failed(
                "failed to create Info dictionary",
            ))
        }
    };

    let fields = [
        ("Title", &metadata.title),
        ("Author", &metadata.author),
        ("Subject", &metadata.subject),
        ("Keywords", &metadata.keywords),
        ("Creator", &metadata.creator),
        ("Producer", &metadata.producer),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            info.set(
                key,
                Object::String(value.as_bytes().to_vec(), lopdf::StringFormat::Literal),
            );
        }
    }

    let date = format_pdf_date(SystemTime::now());
    info.set(
        "ModDate",
        Object::String(date.into_bytes(), lopdf::StringFormat::Literal),
    );

    Ok(())
}

/// Encrypt the document according to the descriptor.
///
/// No-op when encryption is disabled or the owner password is empty. The
/// engine writes the RC4-based V2 handler only, so AES methods are written
/// as RC4-128 with a warning; read-side classification still reports the
/// original method.
pub(crate) fn encrypt_document(doc: &mut Document, encryption: &Encryption) -> Result<()> {
    if !encryption.is_enabled || encryption.owner_password.is_empty() {
        return Ok(());
    }

    ensure_file_id(doc, encryption);

    let key_length = match encryption.method {
        EncryptionMethod::Rc4_40 => 40,
        EncryptionMethod::Rc4_128 => 128,
        EncryptionMethod::Aes128 | EncryptionMethod::Aes256 => {
            log::warn!(
                "writing {:?}-protected document with RC4-128; AES output is not supported",
                encryption.method
            );
            128
        }
    };

    let state = lopdf::EncryptionState::try_from(lopdf::EncryptionVersion::V2 {
        document: doc,
        owner_password: &encryption.owner_password,
        user_password: encryption.effective_user_password(),
        key_length,
        permissions: encryption.permissions.to_lopdf(),
    })
    .map_err(|e| PdfBindError::save_failed(format!("building encryption state: {e}")))?;

    doc.encrypt(&state)
        .map_err(|e| PdfBindError::save_failed(format!("encrypting document: {e}")))
}

/// The trailer must carry an `ID` array before encryption; derive one from
/// the document shape and the wall clock when it is missing.
fn ensure_file_id(doc: &mut Document, encryption: &Encryption) {
    if doc.trailer.get(b"ID").is_ok() {
        return;
    }

    let nanos = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let mut hasher = Md5::new();
    hasher.update(encryption.owner_password.as_bytes());
    hasher.update((doc.objects.len() as u64).to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    let id = hasher.finalize().to_vec();

    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), lopdf::StringFormat::Hexadecimal),
            Object::String(id, lopdf::StringFormat::Hexadecimal),
        ]),
    );
}

/// Format a SystemTime as a PDF date string (`D:YYYYMMDDHHmmSSZ`, UTC,
/// approximate calendar math).
fn format_pdf_date(time: SystemTime) -> String {
    let duration = time
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();

    let year = 1970 + (secs / 31_556_926);
    let remainder = secs % 31_556_926;
    let month = 1 + (remainder / 2_629_743).min(11);
    let day_remainder = remainder % 2_629_743;
    let day = 1 + (day_remainder / 86_400).min(30);
    let time_remainder = day_remainder % 86_400;
    let hour = time_remainder / 3_600;
    let min = (time_remainder % 3_600) / 60;
    let sec = time_remainder % 60;

    format!("D:{year:04}{month:02}{day:02}{hour:02}{min:02}{sec:02}Z")
}
