//! Outline relocation across a multi-source composition.

use lopdf::{Document, Object, ObjectId};
use pdfbind::{Binder, DocumentReader, PdfPage};

use crate::common::{add_outline, simple_pdf, FixtureDir};

/// Flatten a saved document's outline into `(title, target page number)`.
fn read_outline(path: &std::path::Path) -> Vec<(String, u32)> {
    let doc = Document::load(path).expect("load saved document");
    let by_id: std::collections::BTreeMap<ObjectId, u32> = doc
        .get_pages()
        .into_iter()
        .map(|(number, id)| (id, number))
        .collect();

    let root_id = match doc.catalog().unwrap().get(b"Outlines") {
        Ok(object) => object.as_reference().unwrap(),
        Err(_) => return Vec::new(),
    };
    let root = doc.get_object(root_id).unwrap().as_dict().unwrap();

    let mut entries = Vec::new();
    let mut current = root.get(b"First").and_then(Object::as_reference).ok();
    while let Some(id) = current {
        let item = doc.get_object(id).unwrap().as_dict().unwrap();
        let title = String::from_utf8_lossy(item.get(b"Title").unwrap().as_str().unwrap())
            .into_owned();
        let dest = item.get(b"Dest").unwrap().as_array().unwrap();
        let target = by_id[&dest[0].as_reference().unwrap()];
        entries.push((title, target));
        current = item.get(b"Next").and_then(Object::as_reference).ok();
    }
    entries
}

#[test]
fn test_outlines_from_two_sources_are_concatenated() {
    let dir = FixtureDir::new();
    let mut first = simple_pdf(2, 612.0, 792.0);
    add_outline(&mut first, &[("A1", 1), ("A2", 2)]);
    let mut second = simple_pdf(3, 612.0, 792.0);
    add_outline(&mut second, &[("B1", 1), ("B3", 3)]);

    let a = dir.write("a.pdf", first);
    let b = dir.write("b.pdf", second);
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    for page in DocumentReader::open(&a, "").unwrap().pages() {
        binder.add(page);
    }
    for page in DocumentReader::open(&b, "").unwrap().pages() {
        binder.add(page);
    }
    binder.save(&output).unwrap();

    assert_eq!(
        read_outline(&output),
        vec![
            ("A1".to_string(), 1),
            ("A2".to_string(), 2),
            ("B1".to_string(), 3),
            ("B3".to_string(), 5),
        ]
    );
}

#[test]
fn test_partial_range_drops_out_of_range_targets() {
    let dir = FixtureDir::new();
    let mut doc = simple_pdf(4, 612.0, 792.0);
    add_outline(&mut doc, &[("Early", 1), ("Late", 4)]);
    let source = dir.write("marked.pdf", doc);
    let output = dir.path().join("out.pdf");

    // Only the first two pages are taken, so "Late" has nowhere to land.
    let mut binder = Binder::new();
    binder.add(PdfPage::new(&source, 1));
    binder.add(PdfPage::new(&source, 2));
    binder.save(&output).unwrap();

    assert_eq!(read_outline(&output), vec![("Early".to_string(), 1)]);
}

#[test]
fn test_source_without_outline_contributes_nothing() {
    let dir = FixtureDir::new();
    let source = dir.write("plain.pdf", simple_pdf(2, 612.0, 792.0));
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&source, 1));
    binder.save(&output).unwrap();

    assert!(read_outline(&output).is_empty());
    let doc = Document::load(&output).unwrap();
    assert!(doc.catalog().unwrap().get(b"Outlines").is_err());
}
