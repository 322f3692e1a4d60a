//! Flattening of placed annotations into PDF page content.
//!
//! Each annotation's screen rectangle is mapped through the rendered canvas into
//! page space and drawn as ordinary page content: images become XObjects, text
//! is set in Helvetica. The result is serialized and hashed so the caller gets
//! the bytes and the metadata record bound to them in one step.

mod image;
pub mod metadata;
pub mod text;
pub mod types;
pub mod utils;

pub use types::{DocumentInfo, FlattenError, Flattened, PageBatch, PageSize, Result};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use signease_core::annotation::TEXT_FONT_SIZE;
use signease_core::{to_absolute, to_fractional, Annotation, AnnotationContent, DocumentMetadata, Rect};

use crate::image::embed_png;

/// Read the page sizes of `original`, in page order.
pub fn page_sizes(original: &[u8]) -> Result<Vec<PageSize>> {
    let doc = load(original)?;
    let sizes: Vec<PageSize> = doc
        .get_pages()
        .values()
        .map(|id| utils::page_size(&doc, *id))
        .collect();
    if sizes.is_empty() {
        return Err(FlattenError::NoPages);
    }
    Ok(sizes)
}

/// Flatten `annotations` onto one page.
///
/// `target_page` is 1-based. `canvas` is the rendered page box the annotations
/// were placed against.
pub fn flatten(
    original: &[u8],
    annotations: &[Annotation],
    target_page: u32,
    canvas: Option<&Rect>,
    info: &DocumentInfo,
) -> Result<Flattened> {
    let batch = PageBatch {
        page: target_page,
        canvas: canvas.copied(),
        annotations: annotations.iter().collect(),
    };
    flatten_pages(original, &[batch], info)
}

/// Flatten several per-page batches in one pass.
///
/// Any image that fails to embed aborts the whole export; nothing partial is
/// returned.
pub fn flatten_pages(original: &[u8], batches: &[PageBatch<'_>], info: &DocumentInfo) -> Result<Flattened> {
    let mut doc = load(original)?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(FlattenError::NoPages);
    }

    metadata::set_document_info(&mut doc, info);

    let mut font_id = None;
    let mut skipped = 0;
    for batch in batches {
        let page_id = *pages.get(&batch.page).ok_or(FlattenError::PageOutOfRange {
            page: batch.page,
            count: pages.len(),
        })?;
        skipped += overlay_page(&mut doc, page_id, batch, &mut font_id)?;
    }

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| FlattenError::Serialize(e.to_string()))?;

    let metadata = DocumentMetadata {
        hash: signease_verify::digest(&bytes),
        author: info.author.clone(),
        timestamp: info.timestamp(),
        original_filename: info.original_filename.clone(),
    };
    log::info!(
        "[Flatten] wrote {} bytes across {} page batch(es), {} skipped, hash {}",
        bytes.len(),
        batches.len(),
        skipped,
        metadata.hash
    );

    Ok(Flattened {
        bytes,
        metadata,
        skipped,
    })
}

fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| FlattenError::Parse(e.to_string()))
}

/// Draw one batch onto its page. Returns the number of skipped annotations.
fn overlay_page(
    doc: &mut Document,
    page_id: ObjectId,
    batch: &PageBatch<'_>,
    font_id: &mut Option<ObjectId>,
) -> Result<usize> {
    let size = utils::page_size(doc, page_id);
    let mut resources = utils::effective_resources(doc, page_id);
    let mut page_font: Option<String> = None;
    let mut ops: Vec<Operation> = Vec::new();
    let mut skipped = 0;

    log::info!(
        "[Flatten] page {}: {} annotation(s), {}x{} pt",
        batch.page,
        batch.annotations.len(),
        size.width,
        size.height
    );

    for annotation in &batch.annotations {
        let Some(geometry) = to_fractional(&annotation.screen_rect, batch.canvas.as_ref()) else {
            log::warn!("[Flatten] skipping {:?}: no usable canvas", annotation.id);
            skipped += 1;
            continue;
        };
        let mut rect = to_absolute(&geometry, size.width, size.height);
        rect.x += size.origin_x;
        rect.y += size.origin_y;

        match &annotation.content {
            AnnotationContent::Signature { png } | AnnotationContent::Stamp { png } => {
                let image_id = embed_png(doc, png)?;
                let xobjects = utils::category_mut(&mut resources, b"XObject")?;
                let name = utils::unique_name(xobjects, "SeIm");
                xobjects.set(name.clone(), image_id);
                ops.extend(text::image_operations(&name, &rect));
            }
            AnnotationContent::Text { text: value }
            | AnnotationContent::DateTime { display: value, .. } => {
                let name = match &page_font {
                    Some(name) => name.clone(),
                    None => {
                        let id = *font_id.get_or_insert_with(|| doc.add_object(helvetica()));
                        let fonts = utils::category_mut(&mut resources, b"Font")?;
                        let name = utils::unique_name(fonts, "SeF");
                        fonts.set(name.clone(), id);
                        page_font = Some(name.clone());
                        name
                    }
                };
                ops.extend(text::text_operations(&name, value, &rect, TEXT_FONT_SIZE));
            }
        }
        log::debug!(
            "[Flatten] {:?} {:?} at ({:.2}, {:.2}) {:.2}x{:.2}",
            annotation.kind(),
            annotation.id,
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
    }

    if ops.is_empty() {
        return Ok(skipped);
    }
    write_overlay(doc, page_id, resources, ops)?;
    Ok(skipped)
}

/// Append `ops` after the page's existing content, which is wrapped in `q`/`Q`
/// so any graphics state it leaves behind cannot displace the overlay.
fn write_overlay(doc: &mut Document, page_id: ObjectId, resources: Dictionary, ops: Vec<Operation>) -> Result<()> {
    let mut contents = utils::content_refs(doc, page_id)?;
    let wrap = !contents.is_empty();

    let mut operations = Vec::with_capacity(ops.len() + 1);
    if wrap {
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.insert(0, Object::Reference(open_id));
        operations.push(Operation::new("Q", vec![]));
    }
    operations.extend(ops);

    let encoded = Content { operations }
        .encode()
        .map_err(|e| FlattenError::Serialize(e.to_string()))?;
    let mut data = Vec::with_capacity(encoded.len() + 1);
    data.push(b'\n');
    data.extend(encoded);

    let mut overlay = Stream::new(Dictionary::new(), data);
    overlay.compress().ok();
    let overlay_id = doc.add_object(overlay);
    contents.push(Object::Reference(overlay_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| FlattenError::Structure(format!("page {:?}: {}", page_id, e)))?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}
