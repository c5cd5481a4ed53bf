//! Error taxonomy shared by the moderation flow and download accounting.
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::token::DecodeError;

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Control id was not produced by the dispatcher (or was truncated).
    #[error("malformed token: {0}")]
    MalformedToken(#[from] DecodeError),

    /// Origin message or remote catalog could not be reached.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The origin message lost attachments between submission and review.
    #[error("invalid attachment index: {index} (message has {count} attachments)")]
    AttachmentIndexInvalid { index: usize, count: usize },

    #[error("clickpack not found in index: {0}")]
    UnknownCatalogEntry(String),

    #[error("{step} failed: {message}")]
    ExternalStepFailed { step: String, message: String },

    #[error("download store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl ModerationError {
    pub fn step(step: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ModerationError::ExternalStepFailed {
            step: step.into(),
            message: err.to_string(),
        }
    }
}

impl From<CatalogError> for ModerationError {
    fn from(err: CatalogError) -> Self {
        ModerationError::FetchFailed(err.to_string())
    }
}

pub type Result<T, E = ModerationError> = std::result::Result<T, E>;
