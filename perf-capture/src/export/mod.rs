//! Capture event export
//!
//! Writes dispatched batches to a file for offline analysis. Currently
//! supports newline-delimited JSON, one [`CaptureEvent`](perf_capture_common::CaptureEvent)
//! per line.

pub mod json_lines;

pub use json_lines::JsonLinesConsumer;
