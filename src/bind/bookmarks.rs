//! Outline (bookmark) relocation.
//!
//! The merge pass imports each source's full object graph, so its outline
//! tree is present in the output document but still points at the imported
//! (untreed) page objects. Collection flattens the tree in document order,
//! translates each destination into an output page number, and drops
//! entries whose destination is missing, malformed, or of a fit type the
//! composer does not relocate. Attachment rebuilds a flat outline over the
//! final page tree.

use std::collections::{BTreeMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::io::reader::decode_pdf_text;

/// Fit types whose destinations survive relocation.
const RELOCATABLE_FITS: [&[u8]; 4] = [b"XYZ", b"Fit", b"FitH", b"FitBH"];

/// One relocated outline entry: a title and a 1-based output page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// Bookmark title.
    pub title: String,
    /// 1-based page number in the composed document.
    pub page: u32,
}

/// Context for translating one source's outline destinations.
pub(crate) struct OutlineShift<'a> {
    /// Imported page object id → 1-based page number in the source.
    pub source_pages: &'a BTreeMap<ObjectId, u32>,
    /// Shift applied to source page numbers (destination minus source of
    /// the first page this source contributed).
    pub delta: i64,
    /// Total page count of the composed document.
    pub total_pages: u32,
}

/// Flatten and relocate the outline of one imported source.
pub(crate) fn collect_outline(
    doc: &Document,
    catalog_id: ObjectId,
    shift: &OutlineShift<'_>,
) -> Vec<OutlineEntry> {
    let first = (|| {
        let catalog = doc.get_object(catalog_id).ok()?.as_dict().ok()?;
        let root_id = catalog.get(b"Outlines").ok()?.as_reference().ok()?;
        let root = doc.get_object(root_id).ok()?.as_dict().ok()?;
        root.get(b"First").ok()?.as_reference().ok()
    })();

    let mut entries = Vec::new();
    if let Some(first) = first {
        let mut visited = HashSet::new();
        walk_items(doc, first, shift, &mut entries, &mut visited, 0);
    }
    entries
}

fn walk_items(
    doc: &Document,
    first: ObjectId,
    shift: &OutlineShift<'_>,
    entries: &mut Vec<OutlineEntry>,
    visited: &mut HashSet<ObjectId>,
    depth: usize,
) {
    // Malformed files can nest or cycle arbitrarily.
    if depth > 32 {
        return;
    }

    let mut current = Some(first);
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let dict = match doc.get_object(id).and_then(Object::as_dict) {
            Ok(dict) => dict,
            Err(_) => break,
        };

        match relocate_entry(doc, dict, shift) {
            Some(entry) => entries.push(entry),
            None => log::debug!("dropping outline entry without a relocatable destination"),
        }

        if let Ok(child) = dict.get(b"First").and_then(Object::as_reference) {
            walk_items(doc, child, shift, entries, visited, depth + 1);
        }

        current = dict.get(b"Next").and_then(Object::as_reference).ok();
    }
}

fn relocate_entry(
    doc: &Document,
    item: &Dictionary,
    shift: &OutlineShift<'_>,
) -> Option<OutlineEntry> {
    let title = item.get(b"Title").and_then(Object::as_str).ok()?;
    let title = decode_pdf_text(title);

    let dest = destination_array(doc, item)?;
    let page_ref = dest.first()?.as_reference().ok()?;
    let fit = dest.get(1)?.as_name().ok()?;
    if !RELOCATABLE_FITS.contains(&fit) {
        return None;
    }

    let source_number = *shift.source_pages.get(&page_ref)?;
    let target = i64::from(source_number) + shift.delta;
    if target < 1 || target > i64::from(shift.total_pages) {
        return None;
    }

    Some(OutlineEntry {
        title,
        page: target as u32,
    })
}

/// The destination array of an item: a direct or referenced `Dest`, or the
/// `D` of a GoTo action.
fn destination_array<'a>(doc: &'a Document, item: &'a Dictionary) -> Option<&'a Vec<Object>> {
    if let Ok(dest) = item.get(b"Dest") {
        let dest = match dest {
            Object::Reference(id) => doc.get_object(*id).ok()?,
            other => other,
        };
        return dest.as_array().ok();
    }

    let action = match item.get(b"A").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let action = action.as_dict().ok()?;
    if action.get(b"S").and_then(Object::as_name).ok()? != b"GoTo" {
        return None;
    }
    let dest = match action.get(b"D").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    dest.as_array().ok()
}

/// Attach a flat outline built from `entries` to the document's catalog.
///
/// Entries referencing page numbers the document does not have are skipped.
pub(crate) fn attach_outline(doc: &mut Document, entries: &[OutlineEntry]) {
    let pages = doc.get_pages();
    let items: Vec<(String, ObjectId)> = entries
        .iter()
        .filter_map(|entry| Some((entry.title.clone(), *pages.get(&entry.page)?)))
        .collect();
    if items.is_empty() {
        return;
    }

    let root_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = (0..items.len()).map(|_| doc.new_object_id()).collect();

    for (index, (title, page_id)) in items.iter().enumerate() {
        let mut item = Dictionary::new();
        item.set(
            "Title",
            Object::String(title.as_bytes().to_vec(), lopdf::StringFormat::Literal),
        );
        item.set("Parent", Object::Reference(root_id));
        item.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(*page_id),
                Object::Name(b"XYZ".to_vec()),
                Object::Null,
                Object::Null,
                Object::Null,
            ]),
        );
        if index > 0 {
            item.set("Prev", Object::Reference(item_ids[index - 1]));
        }
        if index + 1 < items.len() {
            item.set("Next", Object::Reference(item_ids[index + 1]));
        }
        doc.objects.insert(item_ids[index], Object::Dictionary(item));
    }

    let mut root = Dictionary::new();
    root.set("Type", Object::Name(b"Outlines".to_vec()));
    root.set("Count", Object::Integer(items.len() as i64));
    root.set("First", Object::Reference(item_ids[0]));
    root.set("Last", Object::Reference(*item_ids.last().unwrap()));
    doc.objects.insert(root_id, Object::Dictionary(root));

    if let Ok(catalog) = doc.catalog_mut() {
        catalog.set("Outlines", Object::Reference(root_id));
    }
}
