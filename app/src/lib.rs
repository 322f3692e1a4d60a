//! SignEase application layer: configuration, the editing session, the
//! storage and verification clients, and the `signease` command line.

pub mod busy;
pub mod cli;
pub mod config;
pub mod error;
pub mod session;
pub mod transport;

pub use busy::{BusyGuard, LoadingIndicator, LogIndicator};
pub use cli::run;
pub use config::{AppConfig, ConfigError};
pub use error::{AppError, AppResult, Operation};
pub use session::{validate_document, EditingSession, ExportOutcome, LoadedDocument};
pub use transport::{DocumentStore, HttpStore, StoreResponse, TransportError};
