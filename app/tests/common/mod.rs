#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use reqwest::Url;

use signease_app::{DocumentStore, LoadingIndicator, StoreResponse, TransportError};
use signease_core::DocumentMetadata;
use signease_verify::VerificationResponse;

/// Letter-sized pages, each saying "Page N".
pub fn letter_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids = Vec::new();
    for i in 0..page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([20, 20, 120, 255])))
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// Decoded content operations of a 1-based page.
pub fn page_operations(bytes: &[u8], page: u32) -> Vec<Operation> {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page];
    doc.get_and_decode_page_content(page_id).unwrap().operations
}

pub fn number(obj: &Object) -> f64 {
    match obj {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => f64::from(*r),
        other => panic!("not a number: {:?}", other),
    }
}

/// Texts shown with `Tj` on a page, in drawing order.
pub fn shown_text(bytes: &[u8], page: u32) -> Vec<String> {
    page_operations(bytes, page)
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(s, _)) => Some(String::from_utf8_lossy(s).into_owned()),
            _ => None,
        })
        .collect()
}

#[derive(Default)]
pub struct Overlay {
    pub visible: Cell<bool>,
    pub shown: Cell<u32>,
}

impl LoadingIndicator for Overlay {
    fn show(&self) {
        self.visible.set(true);
        self.shown.set(self.shown.get() + 1);
    }

    fn hide(&self) {
        self.visible.set(false);
    }
}

pub struct StoredUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub metadata: DocumentMetadata,
}

/// In-memory stand-in for the storage and verification endpoints.
#[derive(Default)]
pub struct FakeStore {
    pub documents: HashMap<String, Vec<u8>>,
    pub store_reply: StoreResponse,
    pub verify_reply: VerificationResponse,
    /// When set, every call fails with this HTTP status.
    pub fail_status: Option<u16>,
    pub fetched: RefCell<Vec<String>>,
    pub stored: RefCell<Vec<StoredUpload>>,
    pub verified: RefCell<Vec<String>>,
}

impl FakeStore {
    pub fn accepting() -> Self {
        Self {
            store_reply: StoreResponse {
                success: true,
                message: None,
            },
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), TransportError> {
        match self.fail_status {
            Some(status) => Err(TransportError::Status(status)),
            None => Ok(()),
        }
    }
}

impl DocumentStore for FakeStore {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        self.fetched.borrow_mut().push(url.to_string());
        self.check()?;
        self.documents
            .get(url.as_str())
            .cloned()
            .ok_or(TransportError::Status(404))
    }

    fn store(&self, pdf: &[u8], filename: &str, metadata: &DocumentMetadata) -> Result<StoreResponse, TransportError> {
        self.check()?;
        self.stored.borrow_mut().push(StoredUpload {
            bytes: pdf.to_vec(),
            filename: filename.to_string(),
            metadata: metadata.clone(),
        });
        Ok(self.store_reply.clone())
    }

    fn verify(&self, _pdf: &[u8], _filename: &str, hash: &str) -> Result<VerificationResponse, TransportError> {
        self.verified.borrow_mut().push(hash.to_string());
        self.check()?;
        Ok(self.verify_reply.clone())
    }
}
