//! End-to-end composition tests.

use pdfbind::{Binder, DocumentReader, ImagePage, PdfBindError, PdfPage, Size};

use crate::common::{rotate_page, simple_pdf, FixtureDir};

#[test]
fn test_three_source_scenario() {
    let dir = FixtureDir::new();
    let a = dir.write("a.pdf", simple_pdf(3, 612.0, 792.0));
    let b = dir.write_jpeg("b.jpg", 320, 240);
    let mut c_doc = simple_pdf(2, 500.0, 700.0);
    rotate_page(&mut c_doc, 2, 270);
    let c = dir.write("c.pdf", c_doc);
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    for page in DocumentReader::open(&a, "").unwrap().pages() {
        binder.add(page);
    }
    binder.add(ImagePage::new(&b));
    binder.add(PdfPage::new(&c, 2).with_rotation(90));
    binder.save(&output).unwrap();

    let reader = DocumentReader::open(&output, "").unwrap();
    assert_eq!(reader.page_count(), 5);

    let pages = reader.pages();
    // The image page takes its size from the pixel dimensions.
    assert_eq!(pages[3].original_size(), Size::new(320.0, 240.0));
    // The override wins over c.pdf's intrinsic 270.
    assert_eq!(pages[4].rotation(), 90);
    assert_eq!(pages[4].original_size(), Size::new(500.0, 700.0));
}

#[test]
fn test_full_range_round_trip() {
    let dir = FixtureDir::new();
    let mut doc = simple_pdf(4, 595.0, 842.0);
    rotate_page(&mut doc, 2, 180);
    let source = dir.write("source.pdf", doc);
    let output = dir.path().join("copy.pdf");

    let source_pages = DocumentReader::open(&source, "").unwrap().pages();

    let mut binder = Binder::new();
    for page in &source_pages {
        binder.add(page.clone());
    }
    binder.save(&output).unwrap();

    let copied = DocumentReader::open(&output, "").unwrap().pages();
    assert_eq!(copied.len(), source_pages.len());
    for (original, copy) in source_pages.iter().zip(&copied) {
        assert_eq!(copy.rotation(), original.rotation());
        assert_eq!(copy.original_size(), original.original_size());
    }
}

#[test]
fn test_interleaved_sources() {
    let dir = FixtureDir::new();
    let a = dir.write("a.pdf", simple_pdf(2, 612.0, 792.0));
    let b = dir.write("b.pdf", simple_pdf(2, 300.0, 400.0));
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&a, 1));
    binder.add(PdfPage::new(&b, 1));
    binder.add(PdfPage::new(&a, 2));
    binder.add(PdfPage::new(&b, 2));
    binder.save(&output).unwrap();

    let pages = DocumentReader::open(&output, "").unwrap().pages();
    let sizes: Vec<_> = pages.iter().map(|page| page.original_size()).collect();
    assert_eq!(
        sizes,
        vec![
            Size::new(612.0, 792.0),
            Size::new(300.0, 400.0),
            Size::new(612.0, 792.0),
            Size::new(300.0, 400.0),
        ]
    );
}

#[test]
fn test_metadata_stamp() {
    let dir = FixtureDir::new();
    let source = dir.write("a.pdf", simple_pdf(1, 612.0, 792.0));
    let output = dir.path().join("out.pdf");

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&source, 1));
    binder.metadata = pdfbind::Metadata::new(
        Some("Collected Works  ".to_string()),
        Some("An Author".to_string()),
        None,
        Some("pdf, compose".to_string()),
        None,
        None,
    );
    binder.metadata.version = pdfbind::PdfVersion::new(1, 6);
    binder.save(&output).unwrap();

    let metadata = DocumentReader::open(&output, "").unwrap().metadata();
    assert_eq!(metadata.version, pdfbind::PdfVersion::new(1, 6));
    assert_eq!(metadata.title.as_deref(), Some("Collected Works"));
    assert_eq!(metadata.author.as_deref(), Some("An Author"));
    assert_eq!(metadata.keywords.as_deref(), Some("pdf, compose"));
    assert_eq!(metadata.subject, None);
}

#[test]
fn test_binder_reuse_after_reset() {
    let dir = FixtureDir::new();
    let a = dir.write("a.pdf", simple_pdf(3, 612.0, 792.0));
    let b = dir.write("b.pdf", simple_pdf(1, 612.0, 792.0));

    let mut binder = Binder::new();
    binder.add(PdfPage::new(&a, 1));
    binder.add(PdfPage::new(&a, 2));
    binder.save(dir.path().join("first.pdf")).unwrap();

    binder.reset();
    binder.add(PdfPage::new(&b, 1));
    binder.save(dir.path().join("second.pdf")).unwrap();

    let first = DocumentReader::open(dir.path().join("first.pdf"), "").unwrap();
    let second = DocumentReader::open(dir.path().join("second.pdf"), "").unwrap();
    assert_eq!(first.page_count(), 2);
    assert_eq!(second.page_count(), 1);
}

#[test]
fn test_missing_source_fails() {
    let dir = FixtureDir::new();
    let mut binder = Binder::new();
    binder.add(PdfPage::new(dir.path().join("missing.pdf"), 1));
    let result = binder.save(dir.path().join("out.pdf"));
    assert!(matches!(result, Err(PdfBindError::FileNotFound { .. })));
}
