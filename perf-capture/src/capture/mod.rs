//! # Capture Core
//!
//! Collects events from the tracer, interns their large payloads and hands
//! them downstream in batches.
//!
//! ```text
//! producer threads ──► CaptureIngestion ──► EventBuffer ──► sender thread ──► consumer
//!                      (caches, filter)     (mutex+condvar)  (+ GPU splice on stop)
//! ```
//!
//! - [`CaptureHandler`]: session lifecycle (start/stop)
//! - [`CaptureIngestion`]: per-kind handlers, implements `TracerListener`
//! - [`EventBuffer`]: pending events plus session state under one lock
//! - [`splice`]: GPU exchange file read into the final batch

pub mod buffer;
pub mod handler;
pub mod ingestion;
mod sender;
pub mod splice;

pub use buffer::{Drain, EventBuffer};
pub use handler::CaptureHandler;
pub use ingestion::CaptureIngestion;
pub use splice::{ExchangeFile, GpuSubmissionSource};
