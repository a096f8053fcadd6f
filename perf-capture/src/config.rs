//! Capture session configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::capture::splice::DEFAULT_EXCHANGE_FILE;

/// Maximum time an event waits in the buffer before being dispatched
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(20);

/// Pending-event count that wakes the sender thread early
///
/// Kept below the transport's per-message event limit: a few more events
/// usually arrive between the wake-up and the drain.
pub const DEFAULT_SEND_EVENT_COUNT_THRESHOLD: usize = 5000;

pub const DEFAULT_SAMPLING_FREQUENCY_HZ: u32 = 1000;

/// Options for one capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Also capture the profiler's own introspection scopes
    pub enable_introspection: bool,
    pub send_interval: Duration,
    pub send_event_count_threshold: usize,
    /// Exchange file written by the out-of-process GPU layer
    pub gpu_exchange_file: PathBuf,
    /// Passed through to the tracer
    pub sampling_frequency_hz: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            enable_introspection: false,
            send_interval: DEFAULT_SEND_INTERVAL,
            send_event_count_threshold: DEFAULT_SEND_EVENT_COUNT_THRESHOLD,
            gpu_exchange_file: PathBuf::from(DEFAULT_EXCHANGE_FILE),
            sampling_frequency_hz: DEFAULT_SAMPLING_FREQUENCY_HZ,
        }
    }
}

impl CaptureOptions {
    /// Load options from a JSON file; missing fields keep their defaults
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse options file {}", path.display()))
    }
}
