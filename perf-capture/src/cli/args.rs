//! CLI argument definitions

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::CaptureOptions;

#[derive(Parser, Debug)]
#[command(
    name = "perf-capture",
    about = "Run a capture session against the synthetic tracer",
    after_help = "\
EXAMPLES:
    perf-capture --duration 5                        Capture for 5 seconds
    perf-capture --producers 8 --rate 200000         Heavier synthetic load
    perf-capture --export events.jsonl --quiet       Export every event as JSON lines"
)]
pub struct Args {
    /// Stop after N seconds (0 = until Ctrl-C)
    #[arg(long, default_value = "10")]
    pub duration: u64,

    /// Also capture the profiler's own introspection scopes
    #[arg(long)]
    pub introspection: bool,

    /// Pending-event count that triggers an early dispatch
    #[arg(long)]
    pub threshold: Option<usize>,

    /// Maximum time between dispatches, in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// GPU exchange file read when the session stops
    #[arg(long, value_name = "FILE")]
    pub exchange_file: Option<PathBuf>,

    /// Load capture options from a JSON file (flags override it)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of synthetic producer threads
    #[arg(long, default_value = "4")]
    pub producers: usize,

    /// Total synthetic events per second (0 = unpaced)
    #[arg(long, default_value = "50000")]
    pub rate: u64,

    /// Export every dispatched event to FILE as JSON lines
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Capture options from `--config` (or defaults), overridden by flags
    ///
    /// # Errors
    /// Returns an error if the `--config` file cannot be loaded
    pub fn capture_options(&self) -> Result<CaptureOptions> {
        let mut options = match &self.config {
            Some(path) => CaptureOptions::from_file(path)?,
            None => CaptureOptions::default(),
        };
        if self.introspection {
            options.enable_introspection = true;
        }
        if let Some(threshold) = self.threshold {
            options.send_event_count_threshold = threshold;
        }
        if let Some(interval_ms) = self.interval_ms {
            options.send_interval = Duration::from_millis(interval_ms);
        }
        if let Some(path) = &self.exchange_file {
            options.gpu_exchange_file.clone_from(path);
        }
        Ok(options)
    }

    pub fn duration_limit(&self) -> Option<Duration> {
        (self.duration > 0).then(|| Duration::from_secs(self.duration))
    }
}
