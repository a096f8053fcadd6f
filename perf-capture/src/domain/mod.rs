//! Domain model for perf-capture
//!
//! Core domain types and errors shared by the capture pipeline:
//! - Newtypes for interning keys and addresses
//! - Session lifecycle state
//! - Structured error handling

pub mod errors;
pub mod types;

pub use types::{Address, Key, SessionState};

pub use errors::{CaptureError, ExportError};
