//! Attachment consolidation across a composition.

use pdfbind::{Binder, DocumentReader, PdfPage};

use crate::common::{add_embedded_file, read_embedded_files, simple_pdf, FixtureDir};

#[test]
fn test_attachments_survive_composition() {
    let dir = FixtureDir::new();
    let mut doc = simple_pdf(2, 612.0, 792.0);
    add_embedded_file(&mut doc, "notes.txt", b"hello");
    let source = dir.write("a.pdf", doc);
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&source, 1));
    binder.save(&output).unwrap();

    assert_eq!(
        read_embedded_files(&output),
        vec![("notes.txt".to_string(), b"hello".to_vec())]
    );
}

#[test]
fn test_attachments_merge_and_sort_across_sources() {
    let dir = FixtureDir::new();
    let mut first = simple_pdf(1, 612.0, 792.0);
    add_embedded_file(&mut first, "zebra.csv", b"z");
    let mut second = simple_pdf(1, 612.0, 792.0);
    add_embedded_file(&mut second, "apple.txt", b"a");

    let a = dir.write("a.pdf", first);
    let b = dir.write("b.pdf", second);
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&a, 1));
    binder.add(PdfPage::new(&b, 1));
    binder.save(&output).unwrap();

    // Name-tree keys come out lexically ordered regardless of source order.
    assert_eq!(
        read_embedded_files(&output),
        vec![
            ("apple.txt".to_string(), b"a".to_vec()),
            ("zebra.csv".to_string(), b"z".to_vec()),
        ]
    );
}

#[test]
fn test_duplicate_names_keep_first_source() {
    let dir = FixtureDir::new();
    let mut first = simple_pdf(1, 612.0, 792.0);
    add_embedded_file(&mut first, "dup.txt", b"from first");
    let mut second = simple_pdf(1, 612.0, 792.0);
    add_embedded_file(&mut second, "dup.txt", b"from second");

    let a = dir.write("a.pdf", first);
    let b = dir.write("b.pdf", second);
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&a, 1));
    binder.add(PdfPage::new(&b, 1));
    binder.save(&output).unwrap();

    assert_eq!(
        read_embedded_files(&output),
        vec![("dup.txt".to_string(), b"from first".to_vec())]
    );
}

#[test]
fn test_attachment_only_page_subset() {
    // Attachments are document-level: they ride along even when the page
    // carrying no relation to them is the only one taken.
    let dir = FixtureDir::new();
    let mut doc = simple_pdf(3, 612.0, 792.0);
    add_embedded_file(&mut doc, "appendix.pdf", b"%PDF-");
    let source = dir.write("a.pdf", doc);
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&source, 3));
    binder.save(&output).unwrap();

    let reader = DocumentReader::open(&output, "").unwrap();
    assert_eq!(reader.page_count(), 1);
    assert_eq!(read_embedded_files(&output).len(), 1);
}
