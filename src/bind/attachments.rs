//! Embedded-file (attachment) consolidation.
//!
//! Each imported source brings its `EmbeddedFiles` name tree along with its
//! object graph. Consolidation gathers every (name, file specification)
//! pair in source encounter order, keeps the first occurrence of each
//! display name, and rebuilds a single flat name tree on the output
//! catalog. The whole phase is best effort: one malformed tree abandons it
//! entirely, and the save continues without attachments.

use std::collections::HashSet;

use lopdf::{dictionary, Document, Object, ObjectId};

use crate::io::reader::decode_pdf_text;

/// Consolidate the embedded files of all imported sources into the output
/// catalog. `source_catalogs` lists imported catalog ids in encounter order.
pub(crate) fn consolidate(doc: &mut Document, source_catalogs: &[ObjectId]) {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for &catalog_id in source_catalogs {
        match collect_embedded_files(doc, catalog_id) {
            Some(found) => {
                for (name, spec_id) in found {
                    if seen.insert(name.clone()) {
                        files.push((name, spec_id));
                    }
                }
            }
            None => {
                log::warn!("abandoning attachment consolidation: malformed embedded-file tree");
                return;
            }
        }
    }

    attach_embedded_files(doc, &files);
}

/// Gather the `(display name, file specification id)` pairs of one source's
/// embedded-file name tree. `None` signals a malformed tree; a source
/// without attachments yields an empty list.
pub(crate) fn collect_embedded_files(
    doc: &Document,
    catalog_id: ObjectId,
) -> Option<Vec<(String, ObjectId)>> {
    let catalog = doc.get_object(catalog_id).ok()?.as_dict().ok()?;

    let names = match catalog.get(b"Names") {
        Ok(object) => resolve_dict(doc, object)?,
        Err(_) => return Some(Vec::new()),
    };
    let tree = match names.get(b"EmbeddedFiles") {
        Ok(object) => resolve_dict(doc, object)?,
        Err(_) => return Some(Vec::new()),
    };

    let mut files = Vec::new();
    walk_name_tree(doc, tree, &mut files, 0)?;
    Some(files)
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a lopdf::Dictionary> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        other => other.as_dict().ok(),
    }
}

fn walk_name_tree(
    doc: &Document,
    node: &lopdf::Dictionary,
    files: &mut Vec<(String, ObjectId)>,
    depth: usize,
) -> Option<()> {
    if depth > 32 {
        return None;
    }

    if let Ok(names) = node.get(b"Names") {
        let pairs = names.as_array().ok()?;
        if pairs.len() % 2 != 0 {
            return None;
        }
        for pair in pairs.chunks_exact(2) {
            let name = decode_pdf_text(pair[0].as_str().ok()?);
            let spec_id = pair[1].as_reference().ok()?;
            files.push((name, spec_id));
        }
        return Some(());
    }

    if let Ok(kids) = node.get(b"Kids") {
        for kid in kids.as_array().ok()? {
            let child = doc.get_object(kid.as_reference().ok()?).ok()?.as_dict().ok()?;
            walk_name_tree(doc, child, files, depth + 1)?;
        }
        return Some(());
    }

    // A node with neither Names nor Kids is malformed.
    None
}

/// Rebuild the output catalog's `EmbeddedFiles` name tree from `files`.
///
/// Name-tree keys must be lexically ordered, so the pairs are sorted by
/// their byte representation before writing.
pub(crate) fn attach_embedded_files(doc: &mut Document, files: &[(String, ObjectId)]) {
    if files.is_empty() {
        return;
    }

    let mut sorted: Vec<&(String, ObjectId)> = files.iter().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut pairs = Vec::with_capacity(sorted.len() * 2);
    for (name, spec_id) in sorted {
        pairs.push(Object::string_literal(name.as_str()));
        pairs.push(Object::Reference(*spec_id));
    }

    let tree_id = doc.add_object(dictionary! { "Names" => Object::Array(pairs) });
    let names_id = doc.add_object(dictionary! {
        "EmbeddedFiles" => Object::Reference(tree_id),
    });
    if let Ok(catalog) = doc.catalog_mut() {
        catalog.set("Names", Object::Reference(names_id));
    }
}
