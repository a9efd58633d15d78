//! Errors surfaced by the host runtime.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while talking to the backend, the surface, or local storage.
///
/// None of these halt the event loop on their own: connection and decode
/// failures are logged and the loop keeps running. Only failures while
/// starting up (device identity, spawning the stdio bridge) reach `main`.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// A surface frame violated the length-prefixed framing rules.
    #[error("frame too large: {len} > {max}")]
    Frame { len: usize, max: usize },

    /// The persisted device identifier could not be read or written.
    #[error("device identity at {path}: {source}")]
    Device {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown widget template '{0}'")]
    UnknownTemplate(String),
}

pub type HostResult<T> = Result<T, HostError>;
