use signease_core::Precondition;
use signease_pdf::FlattenError;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// User-initiated operations, used to pick the message shown on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    AutoLoad,
    Export,
    Validate,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error(transparent)]
    Flatten(#[from] FlattenError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The server answered but reported failure.
    #[error("{}", .0.as_deref().unwrap_or("request rejected by server"))]
    Rejected(Option<String>),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Message for the user after `operation` failed with this error.
    ///
    /// Preconditions carry their own text. Server rejections show the server's
    /// message when it sent one. Everything else gets a generic message.
    pub fn user_message(&self, operation: Operation) -> String {
        match self {
            AppError::Precondition(p) => p.to_string(),
            AppError::Rejected(Some(message)) if !message.trim().is_empty() => message.clone(),
            _ => match operation {
                Operation::Load => "Error loading PDF. Please try again.".to_string(),
                Operation::AutoLoad => format!("Error loading document. Please try again. Details: {}", self),
                Operation::Export => "Error saving signed PDF. Please try again.".to_string(),
                Operation::Validate => "Error validating document. Please try again.".to_string(),
            },
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::Precondition(_))
    }
}
