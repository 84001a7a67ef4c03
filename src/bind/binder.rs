//! Document composer.
//!
//! [`Binder`] assembles a new document from an ordered page list. Saving is
//! a two-pass operation: the merge pass imports source pages (and
//! synthesizes pages from images) into a fresh document and writes it to a
//! temporary file; the stamp pass reopens that file to apply metadata, the
//! consolidated outline and encryption before the final atomic write.
//!
//! One reader is opened per distinct source path and held in a scope that
//! is dropped before the stamp pass begins, on every exit path.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, ObjectId};

use crate::bind::bookmarks::{self, OutlineEntry, OutlineShift};
use crate::bind::{attachments, images, stamp};
use crate::encryption::Encryption;
use crate::error::{PdfBindError, Result};
use crate::io::reader::DocumentReader;
use crate::io::writer::{PdfWriter, WriteOptions};
use crate::metadata::Metadata;
use crate::page::{normalize_rotation, Page, PdfPage};

/// Composes a new PDF document from PDF pages and raster images.
///
/// Callers populate the three fields, then call [`Binder::save`]. The
/// binder does not retain any state between saves beyond the fields
/// themselves; [`Binder::reset`] returns all of them to defaults.
#[derive(Debug, Default)]
pub struct Binder {
    /// Pages of the output document, in order.
    pub pages: Vec<Page>,
    /// Metadata stamped into the output document.
    pub metadata: Metadata,
    /// Encryption applied to the output document.
    pub encryption: Encryption,
}

/// Readers opened during one merge pass, keyed by source path.
///
/// Dropping the scope closes every reader; the merge holds it in a local
/// so the readers are released before the stamp pass on every exit path.
#[derive(Default)]
struct ReaderScope {
    readers: HashMap<PathBuf, DocumentReader>,
}

impl ReaderScope {
    fn open(&mut self, path: &Path, password: &str) -> Result<&DocumentReader> {
        if !self.readers.contains_key(path) {
            let reader = DocumentReader::open(path, password)?;
            self.readers.insert(path.to_path_buf(), reader);
        }
        Ok(&self.readers[path])
    }
}

/// One source document imported into the merge output.
struct SourceImport {
    /// Source page number → imported page object id.
    page_ids: BTreeMap<u32, ObjectId>,
    /// Source page number → intrinsic rotation, normalized.
    rotations: BTreeMap<u32, i32>,
    /// Imported catalog id, for outline and attachment harvesting.
    catalog_id: ObjectId,
    /// Destination minus source number of the first page this source
    /// contributed; outline targets shift by this amount.
    first_delta: Option<i64>,
}

struct MergeOutput {
    document: Document,
    outline: Vec<OutlineEntry>,
}

impl Binder {
    /// Create an empty binder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear pages, metadata and encryption back to defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Append one page entry.
    pub fn add(&mut self, page: impl Into<Page>) {
        self.pages.push(page.into());
    }

    /// Compose and write the output document to `output`.
    ///
    /// # Errors
    ///
    /// - [`PdfBindError::NoPagesToCompose`] when the page list is empty
    /// - [`PdfBindError::PasswordRejected`] when a source rejects its
    ///   password
    /// - [`PdfBindError::PageOutOfRange`] when an entry references a page
    ///   its source does not have
    /// - I/O and engine failures propagate; attachment problems never do
    pub fn save(&self, output: impl AsRef<Path>) -> Result<()> {
        let output = output.as_ref();
        if self.pages.is_empty() {
            return Err(PdfBindError::NoPagesToCompose);
        }
        self.encryption
            .validate()
            .map_err(|e| PdfBindError::save_failed(e.to_string()))?;

        // Merge pass. Readers live inside and are dropped with it.
        let merged = self.merge()?;

        // Removed on drop, whether or not the stamp pass succeeds.
        let temp = tempfile::NamedTempFile::new()?;
        let mut document = merged.document;
        PdfWriter::with_options(WriteOptions {
            atomic: false,
            ..Default::default()
        })
        .save(&mut document, temp.path())?;
        drop(document);

        // Stamp pass on the reopened merge output.
        let mut stamped = DocumentReader::open(temp.path(), "")?.into_document();
        stamp::apply(&mut stamped, &self.metadata, &merged.outline)?;

        if self.metadata.version.minor >= 5 {
            stamped.compress();
        }
        stamped.prune_objects();
        stamped.renumber_objects();

        // Object keys bind to object numbers; nothing may reorder the
        // document after this point.
        stamp::encrypt_document(&mut stamped, &self.encryption)?;

        PdfWriter::with_options(WriteOptions {
            atomic: true,
            optimize: false,
            ..Default::default()
        })
        .save(&mut stamped, output)?;

        Ok(())
    }

    fn merge(&self) -> Result<MergeOutput> {
        let (mut document, pages_id) = new_output_document();
        let mut scope = ReaderScope::default();
        let mut imports: HashMap<PathBuf, SourceImport> = HashMap::new();
        let mut order: Vec<PathBuf> = Vec::new();
        let mut kids: Vec<ObjectId> = Vec::new();

        for entry in &self.pages {
            match entry {
                Page::Pdf(page) => self.append_pdf_page(
                    &mut document,
                    pages_id,
                    &mut scope,
                    &mut imports,
                    &mut order,
                    &mut kids,
                    page,
                )?,
                Page::Image(page) => {
                    let ids = images::append_image_pages(&mut document, pages_id, page)?;
                    kids.extend(ids);
                }
            }
        }

        let total_pages = kids.len() as u32;
        finish_page_tree(&mut document, pages_id, &kids)?;

        // Outline relocation, in source encounter order.
        let mut outline = Vec::new();
        for path in &order {
            let import = &imports[path];
            let delta = match import.first_delta {
                Some(delta) => delta,
                None => continue,
            };
            let by_object: BTreeMap<ObjectId, u32> = import
                .page_ids
                .iter()
                .map(|(number, id)| (*id, *number))
                .collect();
            let shift = OutlineShift {
                source_pages: &by_object,
                delta,
                total_pages,
            };
            outline.extend(bookmarks::collect_outline(&document, import.catalog_id, &shift));
        }

        // Attachment consolidation is best effort and must precede the
        // temporary write so the file specifications stay referenced.
        let catalogs: Vec<ObjectId> = order.iter().map(|path| imports[path].catalog_id).collect();
        attachments::consolidate(&mut document, &catalogs);

        Ok(MergeOutput { document, outline })
    }

    #[allow(clippy::too_many_arguments)]
    fn append_pdf_page(
        &self,
        document: &mut Document,
        pages_id: ObjectId,
        scope: &mut ReaderScope,
        imports: &mut HashMap<PathBuf, SourceImport>,
        order: &mut Vec<PathBuf>,
        kids: &mut Vec<ObjectId>,
        page: &PdfPage,
    ) -> Result<()> {
        let path = page.path();
        if !imports.contains_key(path) {
            let reader = scope.open(path, page.password())?;
            let import = import_source(document, reader)?;
            imports.insert(path.to_path_buf(), import);
            order.push(path.to_path_buf());
        }
        let import = imports.get_mut(path).expect("source imported above");

        let source_id = *import.page_ids.get(&page.number()).ok_or_else(|| {
            PdfBindError::PageOutOfRange {
                path: path.to_path_buf(),
                page: page.number(),
                total_pages: import.page_ids.len(),
            }
        })?;

        // Shallow copy: content and resources stay shared with the import,
        // attributes become independent so the same source page can appear
        // several times with different rotations.
        let mut dict = document
            .get_object(source_id)
            .and_then(Object::as_dict)
            .map_err(|e| {
                PdfBindError::corrupted_pdf(path.to_path_buf(), format!("page object: {e}"))
            })?
            .clone();
        dict.set("Parent", Object::Reference(pages_id));

        let intrinsic = import.rotations.get(&page.number()).copied().unwrap_or(0);
        if page.rotation() != intrinsic {
            // Override, not additive.
            dict.set("Rotate", Object::Integer(i64::from(page.rotation())));
        }

        let new_id = document.add_object(Object::Dictionary(dict));
        kids.push(new_id);

        let destination = kids.len() as i64;
        let delta = destination - i64::from(page.number());
        import.first_delta.get_or_insert(delta);
        Ok(())
    }
}

/// Fresh output document: empty page tree plus catalog.
pub(crate) fn new_output_document() -> (Document, ObjectId) {
    let mut document = Document::with_version("1.7");
    let pages_id = document.new_object_id();
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(Vec::new()),
            "Count" => 0,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    document.trailer.set("Root", Object::Reference(catalog_id));
    (document, pages_id)
}

/// Import a source's whole object graph into the output document and
/// record where its pages and catalog ended up.
fn import_source(document: &mut Document, reader: &DocumentReader) -> Result<SourceImport> {
    let rotations: BTreeMap<u32, i32> = reader
        .document()
        .get_pages()
        .into_iter()
        .map(|(number, id)| (number, normalize_rotation(reader.page_rotation(id))))
        .collect();

    let mut source = reader.document().clone();
    materialize_page_attributes(&mut source);
    source.renumber_objects_with(document.max_id + 1);
    document.max_id = source.max_id;

    let page_ids: BTreeMap<u32, ObjectId> = source.get_pages().into_iter().collect();
    let catalog_id = source
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| {
            PdfBindError::corrupted_pdf(
                reader.path().to_path_buf(),
                format!("missing document catalog: {e}"),
            )
        })?;

    document.objects.extend(source.objects);

    Ok(SourceImport {
        page_ids,
        rotations,
        catalog_id,
        first_delta: None,
    })
}

/// Attributes a page may inherit from ancestor `Pages` nodes.
const INHERITED_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copy inherited attributes down onto each page dictionary.
///
/// Imported pages are reparented under the output page tree, which severs
/// their ancestor chain; anything inherited must live on the page itself
/// before that happens. Runs before renumbering so copied references stay
/// consistent with the rest of the source graph.
fn materialize_page_attributes(source: &mut Document) {
    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    for page_id in page_ids {
        for key in INHERITED_PAGE_KEYS {
            let has_own = source
                .get_object(page_id)
                .ok()
                .and_then(|object| object.as_dict().ok())
                .is_some_and(|dict| dict.has(key));
            if has_own {
                continue;
            }
            let Some(value) = inherited_page_attribute(source, page_id, key) else {
                continue;
            };
            if let Ok(Object::Dictionary(dict)) = source.get_object_mut(page_id) {
                dict.set(key, value);
            }
        }
    }
}

/// Raw value from the page's ancestor chain, references left unresolved.
fn inherited_page_attribute(document: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    // Bounded walk; malformed files can have Parent cycles.
    for _ in 0..64 {
        let dict = document.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn finish_page_tree(document: &mut Document, pages_id: ObjectId, kids: &[ObjectId]) -> Result<()> {
    let node = document
        .get_object_mut(pages_id)
        .map_err(|e| PdfBindError::save_failed(format!("page tree node: {e}")))?;
    match node {
        Object::Dictionary(dict) => {
            dict.set(
                "Kids",
                Object::Array(kids.iter().map(|id| Object::Reference(*id)).collect()),
            );
            dict.set("Count", Object::Integer(kids.len() as i64));
            Ok(())
        }
        _ => Err(PdfBindError::save_failed("page tree node is not a dictionary")),
    }
}
