//! The editing session: one loaded document, its overlays and the export and
//! validation round trips.

use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use signease_core::{
    Annotation, AnnotationId, AnnotationModel, PageBinding, Point, PointerEvent, PointerPhase, Precondition, Rect,
    SignaturePad,
};
use signease_pdf::{DocumentInfo, Flattened, PageBatch, PageSize};
use signease_verify::{DisplayFormat, ValidationView};

use crate::busy::{BusyGuard, LoadingIndicator};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::transport::{resolve_handoff, DocumentStore};

pub const SAVED_MESSAGE: &str = "Document signed and saved successfully!";

/// How far into the file a PDF header may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub pages: Vec<PageSize>,
}

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub flattened: Flattened,
    /// Where the host should navigate next.
    pub redirect: String,
    pub message: String,
}

pub struct EditingSession {
    config: AppConfig,
    document: Option<LoadedDocument>,
    /// 1-based.
    current_page: u32,
    /// Host-measured canvas boxes, kept per 1-based page.
    canvas_overrides: BTreeMap<u32, Rect>,
    viewport_override: Option<Rect>,
    model: AnnotationModel,
    pad: SignaturePad,
    loading: Rc<dyn LoadingIndicator>,
}

impl EditingSession {
    pub fn new(config: AppConfig, loading: Rc<dyn LoadingIndicator>) -> Self {
        let model = AnnotationModel::new(&config.date_time_format);
        let pad = SignaturePad::new(config.signature_pad);
        Self {
            config,
            document: None,
            current_page: 1,
            canvas_overrides: BTreeMap::new(),
            viewport_override: None,
            model,
            pad,
            loading,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn model(&self) -> &AnnotationModel {
        &self.model
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.pages.len())
    }

    // ============ Document ============

    /// Parse `bytes` and make it the working document.
    ///
    /// Replaces any previous document and drops every placed annotation.
    pub fn load_document(&mut self, bytes: Vec<u8>, filename: &str) -> AppResult<()> {
        let _busy = BusyGuard::new(self.loading.clone());

        let pages = signease_pdf::page_sizes(&bytes)
            .inspect_err(|e| log::error!("[Layout] failed to load {}: {}", filename, e))?;
        log::info!("[Layout] loaded {} ({} pages, {} bytes)", filename, pages.len(), bytes.len());

        self.model.clear();
        self.document = Some(LoadedDocument {
            bytes,
            filename: filename.to_string(),
            pages,
        });
        self.current_page = 1;
        self.canvas_overrides.clear();
        self.viewport_override = None;
        self.refresh_viewport();
        Ok(())
    }

    /// Load the document named by a handoff slot, clearing the slot whatever
    /// the outcome. Returns `false` when the slot was empty.
    pub fn auto_load(&mut self, slot: &mut Option<String>, store: &dyn DocumentStore) -> AppResult<bool> {
        let Some(path) = slot.take().filter(|p| !p.trim().is_empty()) else {
            return Ok(false);
        };

        let fetched = {
            let _busy = BusyGuard::new(self.loading.clone());
            resolve_handoff(&self.config.document_base_url, &path).and_then(|(url, filename)| {
                let bytes = store.fetch(&url)?;
                Ok((bytes, filename))
            })
        };
        let (bytes, filename) = fetched.inspect_err(|e| log::error!("[Handoff] {}: {}", path, e))?;

        self.load_document(bytes, &filename)?;
        Ok(true)
    }

    /// Move `delta` pages. Moves that would leave the document are ignored.
    pub fn change_page(&mut self, delta: i32) -> bool {
        let count = self.page_count() as i64;
        let target = self.current_page as i64 + delta as i64;
        if count == 0 || target < 1 || target > count {
            return false;
        }
        self.current_page = target as u32;
        self.refresh_viewport();
        log::info!("[Layout] page {}/{}", self.current_page, count);
        true
    }

    // ============ Layout ============

    /// Override the rendered canvas box of the current page, in viewport
    /// coordinates. `None` goes back to page size x render scale. The box stays
    /// with its page across page changes.
    pub fn set_canvas_rect(&mut self, rect: Option<Rect>) {
        match rect {
            Some(rect) => self.canvas_overrides.insert(self.current_page, rect),
            None => self.canvas_overrides.remove(&self.current_page),
        };
        self.refresh_viewport();
    }

    /// Override the draggable viewport, in client coordinates.
    pub fn set_viewport_rect(&mut self, rect: Option<Rect>) {
        self.viewport_override = rect;
        self.refresh_viewport();
    }

    /// Canvas box of the current page.
    pub fn canvas(&self) -> Option<Rect> {
        self.canvas_for(self.current_page)
    }

    fn canvas_for(&self, page: u32) -> Option<Rect> {
        if let Some(rect) = self.canvas_overrides.get(&page) {
            return Some(*rect);
        }
        let size = self.document.as_ref()?.pages.get(page.checked_sub(1)? as usize)?;
        let scale = self.config.render_scale;
        Some(Rect::new(0.0, 0.0, size.width * scale, size.height * scale))
    }

    fn refresh_viewport(&mut self) {
        let viewport = self.viewport_override.or_else(|| self.canvas());
        self.model.set_viewport(viewport);
    }

    // ============ Annotations ============

    pub fn signature_pad(&self) -> &SignaturePad {
        &self.pad
    }

    pub fn signature_pad_mut(&mut self) -> &mut SignaturePad {
        &mut self.pad
    }

    /// Place the pad's drawing as the signature.
    pub fn save_signature(&mut self) -> AppResult<AnnotationId> {
        let png = self.pad.signature_png()?;
        Ok(self.model.add_signature(png, self.current_page)?)
    }

    /// Place a signature from existing PNG bytes.
    pub fn add_signature_image(&mut self, png: Vec<u8>) -> AppResult<AnnotationId> {
        Ok(self.model.add_signature(png, self.current_page)?)
    }

    pub fn add_stamp(&mut self, png: Option<Vec<u8>>) -> AppResult<AnnotationId> {
        Ok(self.model.add_stamp(png, self.current_page)?)
    }

    pub fn add_text(&mut self, text: &str) -> AppResult<AnnotationId> {
        Ok(self.model.add_text(text, self.current_page)?)
    }

    pub fn add_date_time(&mut self, value: &str) -> AppResult<AnnotationId> {
        Ok(self.model.add_date_time(value, self.current_page)?)
    }

    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Option<AnnotationId> {
        self.model.handle_pointer(event)
    }

    /// Drag `id` so its top-left lands at (`left`, `top`) in viewport
    /// coordinates, subject to the usual clamping.
    pub fn move_annotation_to(&mut self, id: AnnotationId, left: f64, top: f64) -> Option<AnnotationId> {
        let viewport = self.model.viewport()?;
        let rect = self.model.get(id)?.screen_rect;

        let grab = Point::new(viewport.left + rect.left, viewport.top + rect.top);
        let drop_at = Point::new(viewport.left + left, viewport.top + top);
        self.handle_pointer(&PointerEvent::mouse(PointerPhase::Down, grab, Some(id)));
        let moved = self.handle_pointer(&PointerEvent::mouse(PointerPhase::Move, drop_at, None));
        self.handle_pointer(&PointerEvent::mouse(PointerPhase::Up, drop_at, None));
        moved
    }

    // ============ Export ============

    pub fn document_info(&self, now: DateTime<Utc>) -> DocumentInfo {
        let filename = self.document.as_ref().map_or("document.pdf", |d| d.filename.as_str());
        let mut info = DocumentInfo::new(self.config.current_user.as_deref(), filename, now);
        info.title = self.config.document_title.clone();
        info.creator = self.config.creator.clone();
        info.producer = self.config.producer.clone();
        info
    }

    /// Group annotations by the page they will be burned into.
    fn batches(&self) -> Vec<PageBatch<'_>> {
        match self.config.page_binding {
            PageBinding::Current => vec![PageBatch {
                page: self.current_page,
                canvas: self.canvas(),
                annotations: self.model.entries().iter().collect(),
            }],
            PageBinding::Owning => {
                let mut by_page: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
                for entry in self.model.entries() {
                    by_page.entry(entry.page).or_default().push(entry);
                }
                by_page
                    .into_iter()
                    .map(|(page, annotations)| PageBatch {
                        page,
                        canvas: self.canvas_for(page),
                        annotations,
                    })
                    .collect()
            }
        }
    }

    /// Flatten and hash without uploading.
    pub fn prepare_export(&self, now: DateTime<Utc>) -> AppResult<Flattened> {
        let document = self.document.as_ref().ok_or(Precondition::NoDocument)?;
        if self.model.is_empty() {
            return Err(Precondition::NoAnnotations.into());
        }

        let batches = self.batches();
        log::info!(
            "[Export] {} annotation(s) in {} batch(es), binding {:?}",
            self.model.len(),
            batches.len(),
            self.config.page_binding
        );
        let flattened = signease_pdf::flatten_pages(&document.bytes, &batches, &self.document_info(now))
            .inspect_err(|e| log::error!("[Export] flatten failed: {}", e))?;
        Ok(flattened)
    }

    /// Flatten, hash and hand the result to the storage collaborator.
    pub fn export(&self, store: &dyn DocumentStore, now: DateTime<Utc>) -> AppResult<ExportOutcome> {
        if self.document.is_none() {
            return Err(Precondition::NoDocument.into());
        }
        if self.model.is_empty() {
            return Err(Precondition::NoAnnotations.into());
        }

        let _busy = BusyGuard::new(self.loading.clone());
        let flattened = self.prepare_export(now)?;
        let response = store
            .store(&flattened.bytes, &flattened.metadata.original_filename, &flattened.metadata)
            .inspect_err(|e| log::error!("[Export] upload failed: {}", e))?;

        if !response.success {
            log::warn!("[Export] server rejected document: {:?}", response.message);
            return Err(AppError::Rejected(response.message));
        }

        log::info!("[Export] stored {} ({})", flattened.metadata.original_filename, flattened.metadata.hash);
        Ok(ExportOutcome {
            flattened,
            redirect: self.config.redirect_url.clone(),
            message: SAVED_MESSAGE.to_string(),
        })
    }
}

/// Whether `bytes` carry a PDF header near the start of the file.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Hash an uploaded document, ask the verifier about it and render the answer.
pub fn validate_document(
    store: &dyn DocumentStore,
    loading: Rc<dyn LoadingIndicator>,
    bytes: &[u8],
    filename: &str,
    format: &DisplayFormat,
) -> AppResult<ValidationView> {
    if !looks_like_pdf(bytes) {
        return Err(Precondition::NotAPdf.into());
    }

    let _busy = BusyGuard::new(loading);
    let hash = signease_verify::digest(bytes);
    log::info!("[Validate] {} hashes to {}", filename, hash);

    let response = store
        .verify(bytes, filename, &hash)
        .inspect_err(|e| log::error!("[Validate] verification request failed: {}", e))?;
    Ok(signease_verify::render(&response, format))
}
