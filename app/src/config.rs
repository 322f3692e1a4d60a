use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use signease_core::{PageBinding, SignaturePadOptions};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ Collaborator endpoints ============
    /// Receives signed documents as multipart `pdf` + `metadata`.
    pub storage_url: String,
    /// Receives uploaded documents as multipart `pdf` + `hash`.
    pub verify_url: String,
    /// Base that handoff paths are resolved against.
    pub document_base_url: String,
    /// Where the host navigates after a successful export.
    pub redirect_url: String,

    // ============ Signing ============
    /// Display name recorded as the document author.
    pub current_user: Option<String>,
    pub render_scale: f64,
    pub page_binding: PageBinding,
    /// chrono format used for date-time annotations and validation timestamps.
    pub date_time_format: String,

    // ============ Document info ============
    pub document_title: String,
    pub creator: String,
    pub producer: String,

    pub signature_pad: SignaturePadOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_url: "http://localhost/save_signed_document.php".to_string(),
            verify_url: "http://localhost/verify_document.php".to_string(),
            document_base_url: "http://localhost/".to_string(),
            redirect_url: "http://localhost/documents_to_sign.php".to_string(),
            current_user: None,
            render_scale: 1.5,
            page_binding: PageBinding::Owning,
            date_time_format: signease_core::annotation::DEFAULT_DATE_TIME_FORMAT.to_string(),
            document_title: "Signed Document".to_string(),
            creator: "SignEase Document System".to_string(),
            producer: "SignEase v1.0".to_string(),
            signature_pad: SignaturePadOptions::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("signease").join("config.json"))
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_path()?)
}

pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&config_path()?, config)
}

/// Defaults when `path` does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::debug!("[Config] {:?} not found, using defaults", path);
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}
