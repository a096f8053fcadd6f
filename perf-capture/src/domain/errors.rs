//! Structured error types for perf-capture
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("A capture session is already active")]
    AlreadyStarted,

    #[error("No capture session is active")]
    NotStarted,

    #[error("Failed to start tracer: {0:#}")]
    TracerStart(#[source] anyhow::Error),

    #[error("Failed to spawn sender thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Sender thread panicked before the final drain")]
    SenderThreadPanicked,

    #[error("Failed to decode GPU queue submission: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write export file: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
