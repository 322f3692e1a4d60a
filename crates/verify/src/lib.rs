//! Integrity hashing and rendering of verification results.

pub mod hash;
pub mod report;

pub use hash::{digest, digest_reader};
pub use report::{render, DisplayFormat, DEFAULT_TIMESTAMP_FORMAT, Status, Tone, ValidationView, VerificationResponse, VerifiedMetadata};
