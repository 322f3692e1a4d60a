//! Storage and verification collaborators.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use signease_core::DocumentMetadata;
use signease_verify::VerificationResponse;

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body returned by the storage endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// The server side of the workflow: document fetch, storage and verification.
pub trait DocumentStore {
    /// Fetch a document by absolute URL.
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError>;

    /// Persist a signed document with its metadata record.
    fn store(&self, pdf: &[u8], filename: &str, metadata: &DocumentMetadata) -> Result<StoreResponse, TransportError>;

    /// Ask whether `pdf` (hashing to `hash`) is a document this system produced.
    fn verify(&self, pdf: &[u8], filename: &str, hash: &str) -> Result<VerificationResponse, TransportError>;
}

/// Resolve a handoff path against the document base.
///
/// Returns the URL to fetch and the file name the document is known by.
pub fn resolve_handoff(base: &str, path: &str) -> Result<(Url, String), TransportError> {
    let invalid = |url: &str, reason: String| TransportError::Url {
        url: url.to_string(),
        reason,
    };
    let base_url = Url::parse(base).map_err(|e| invalid(base, e.to_string()))?;
    let relative = path.strip_prefix('/').unwrap_or(path);
    let url = base_url.join(relative).map_err(|e| invalid(path, e.to_string()))?;

    let filename = path
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("document.pdf")
        .to_string();
    Ok((url, filename))
}

/// reqwest-backed store talking to the configured endpoints.
pub struct HttpStore {
    client: Client,
    storage_url: String,
    verify_url: String,
}

impl HttpStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            storage_url: config.storage_url.clone(),
            verify_url: config.verify_url.clone(),
        }
    }

    fn pdf_part(pdf: &[u8], filename: &str) -> Result<Part, TransportError> {
        Ok(Part::bytes(pdf.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/pdf")?)
    }
}

impl DocumentStore for HttpStore {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        log::info!("[Handoff] GET {}", url);
        let response = self.client.get(url.clone()).send()?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }

    fn store(&self, pdf: &[u8], filename: &str, metadata: &DocumentMetadata) -> Result<StoreResponse, TransportError> {
        let form = Form::new()
            .part("pdf", Self::pdf_part(pdf, filename)?)
            .text("metadata", metadata.to_json()?);

        log::info!("[Export] POST {} ({} bytes)", self.storage_url, pdf.len());
        let response = self.client.post(&self.storage_url).multipart(form).send()?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(response.json()?)
    }

    fn verify(&self, pdf: &[u8], filename: &str, hash: &str) -> Result<VerificationResponse, TransportError> {
        let form = Form::new()
            .part("pdf", Self::pdf_part(pdf, filename)?)
            .text("hash", hash.to_string());

        log::info!("[Validate] POST {} hash={}", self.verify_url, hash);
        let response = self.client.post(&self.verify_url).multipart(form).send()?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(response.json()?)
    }
}
