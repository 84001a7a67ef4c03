//! Shared fixture builders for integration tests.
//!
//! Everything is generated into a temp directory at runtime: structurally
//! valid PDF documents (optionally encrypted, with outlines or embedded
//! files) and raster images. Tests never depend on binary assets.

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

/// Temp directory that cleans up on drop.
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Save a document under `name` and return its path.
    pub fn write(&self, name: &str, mut doc: Document) -> PathBuf {
        let path = self.dir.path().join(name);
        doc.save(&path).expect("save fixture document");
        path
    }

    /// Write a solid-color JPEG under `name` and return its path.
    pub fn write_jpeg(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.dir.path().join(name);
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([64, 128, 192]));
        img.save_with_format(&path, image::ImageFormat::Jpeg)
            .expect("save fixture image");
        path
    }
}

/// Build a document with `pages` same-sized pages.
pub fn simple_pdf(pages: usize, width: f64, height: f64) -> Document {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    });

    let mut kids = Vec::with_capacity(pages);
    for number in 1..=pages {
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {number}) Tj ET");
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.into_bytes(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Resources" => Object::Reference(resources_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc
}

/// Set an intrinsic `/Rotate` on one page of a document.
pub fn rotate_page(doc: &mut Document, page_number: u32, degrees: i64) {
    let page_id = doc.get_pages()[&page_number];
    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set("Rotate", Object::Integer(degrees));
    }
}

/// Build a document encrypted with RC4-128 (V2/R3) under the given
/// password pair.
pub fn encrypted_pdf(pages: usize, owner_password: &str, user_password: &str) -> Document {
    let mut doc = simple_pdf(pages, 612.0, 792.0);

    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::string_literal(&b"0123456789abcdef"[..]),
            Object::string_literal(&b"fedcba9876543210"[..]),
        ]),
    );

    let state = lopdf::EncryptionState::try_from(lopdf::EncryptionVersion::V2 {
        document: &doc,
        owner_password,
        user_password,
        key_length: 128,
        permissions: lopdf::Permissions::all(),
    })
    .expect("build encryption state");
    doc.encrypt(&state).expect("encrypt fixture document");

    doc
}

/// Attach a flat outline: one item per `(title, page_number)` pair, each
/// with an explicit `/XYZ` destination.
pub fn add_outline(doc: &mut Document, entries: &[(&str, u32)]) {
    let pages = doc.get_pages();
    let root_id = doc.new_object_id();

    let item_ids: Vec<_> = (0..entries.len()).map(|_| doc.new_object_id()).collect();
    for (index, (title, page_number)) in entries.iter().enumerate() {
        let page_id = pages[page_number];
        let mut item = dictionary! {
            "Title" => Object::string_literal(*title),
            "Parent" => Object::Reference(root_id),
            "Dest" => vec![
                Object::Reference(page_id),
                Object::Name(b"XYZ".to_vec()),
                Object::Null,
                Object::Null,
                Object::Null,
            ],
        };
        if index > 0 {
            item.set("Prev", Object::Reference(item_ids[index - 1]));
        }
        if index + 1 < entries.len() {
            item.set("Next", Object::Reference(item_ids[index + 1]));
        }
        doc.objects.insert(item_ids[index], Object::Dictionary(item));
    }

    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => Object::Reference(item_ids[0]),
            "Last" => Object::Reference(*item_ids.last().unwrap()),
            "Count" => entries.len() as i64,
        }),
    );
    doc.catalog_mut()
        .expect("fixture catalog")
        .set("Outlines", Object::Reference(root_id));
}

/// Attach an embedded file to a document's `EmbeddedFiles` name tree,
/// creating the tree on first use.
pub fn add_embedded_file(doc: &mut Document, name: &str, bytes: &[u8]) {
    let stream_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        bytes.to_vec(),
    )));
    let spec_id = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(name),
        "UF" => Object::string_literal(name),
        "EF" => dictionary! { "F" => Object::Reference(stream_id) },
    });

    let names_id = doc
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Names").ok())
        .and_then(|object| object.as_reference().ok());
    let names_id = match names_id {
        Some(id) => id,
        None => {
            let id = doc.add_object(dictionary! {});
            doc.catalog_mut()
                .expect("fixture catalog")
                .set("Names", Object::Reference(id));
            id
        }
    };

    let tree_id = doc
        .get_object(names_id)
        .ok()
        .and_then(|object| object.as_dict().ok())
        .and_then(|dict| dict.get(b"EmbeddedFiles").ok())
        .and_then(|object| object.as_reference().ok());
    let tree_id = match tree_id {
        Some(id) => id,
        None => {
            let id = doc.add_object(dictionary! { "Names" => Object::Array(Vec::new()) });
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(names_id) {
                dict.set("EmbeddedFiles", Object::Reference(id));
            }
            id
        }
    };

    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(tree_id) {
        let mut names = dict
            .get(b"Names")
            .ok()
            .and_then(|object| object.as_array().ok())
            .cloned()
            .unwrap_or_default();
        names.push(Object::string_literal(name));
        names.push(Object::Reference(spec_id));
        dict.set("Names", Object::Array(names));
    }
}

/// Collect the `(name, payload)` pairs of a saved document's embedded
/// files, in name-tree order.
pub fn read_embedded_files(path: &Path) -> Vec<(String, Vec<u8>)> {
    let doc = Document::load(path).expect("load saved document");
    let catalog = doc.catalog().expect("catalog");

    let names = match catalog.get(b"Names") {
        Ok(object) => resolve_dict(&doc, object),
        Err(_) => return Vec::new(),
    };
    let tree = match names.get(b"EmbeddedFiles") {
        Ok(object) => resolve_dict(&doc, object),
        Err(_) => return Vec::new(),
    };
    let pairs = tree
        .get(b"Names")
        .and_then(Object::as_array)
        .expect("flat name tree");

    pairs
        .chunks_exact(2)
        .map(|pair| {
            let name = String::from_utf8_lossy(pair[0].as_str().unwrap()).into_owned();
            let spec = doc
                .get_object(pair[1].as_reference().unwrap())
                .unwrap()
                .as_dict()
                .unwrap();
            let ef = resolve_dict(&doc, spec.get(b"EF").unwrap());
            let stream_id = ef.get(b"F").unwrap().as_reference().unwrap();
            let payload = match doc.get_object(stream_id).unwrap() {
                Object::Stream(stream) => stream.content.clone(),
                _ => panic!("embedded file is not a stream"),
            };
            (name, payload)
        })
        .collect()
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> &'a lopdf::Dictionary {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap().as_dict().unwrap(),
        other => other.as_dict().unwrap(),
    }
}
