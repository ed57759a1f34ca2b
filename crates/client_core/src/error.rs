use std::path::PathBuf;

use shared::error::ApiRejection;
use thiserror::Error;

/// Failures surfaced at the orchestrator boundary. Local rejections
/// (`SessionMissing`, `NothingSelected`) never issue a request; the rest
/// wrap transport or server failures after one was sent.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no active session")]
    SessionMissing,
    #[error("no files selected")]
    NothingSelected,
    #[error("login failed")]
    AuthFailure,
    #[error("session storage unavailable")]
    SessionStorage,
    #[error("could not read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Rejected(#[from] ApiRejection),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}
