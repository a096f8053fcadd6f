//! GPU exchange file spliced into the final drain
//!
//! An out-of-process Vulkan layer appends one record per `vkQueueSubmit` to
//! a file. Each record is a 4-byte little-endian length followed by an
//! encoded [`GpuQueueSubmission`]. On stop the whole file is read, its
//! records are appended to the last batch and the file is removed.

use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use perf_capture_common::GpuQueueSubmission;
use prost::Message;

use crate::domain::CaptureError;

/// Where the GPU layer writes its submissions unless configured otherwise
pub const DEFAULT_EXCHANGE_FILE: &str = "/mnt/developer/orbit_test_file";

/// Source of GPU submissions collected outside the tracer
pub trait GpuSubmissionSource: Send + Sync {
    /// Take everything recorded so far; called once, after the session stopped
    fn take_submissions(&self) -> Vec<GpuQueueSubmission>;
}

/// The length-prefixed exchange file of the GPU layer
#[derive(Debug, Clone)]
pub struct ExchangeFile {
    path: PathBuf,
}

impl ExchangeFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GpuSubmissionSource for ExchangeFile {
    fn take_submissions(&self) -> Vec<GpuQueueSubmission> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No GPU exchange file at {}", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to open GPU exchange file {}: {e}", self.path.display());
                return Vec::new();
            }
        };

        let submissions = read_submissions(BufReader::new(file));
        info!(
            "Read {} GPU queue submissions from {}",
            submissions.len(),
            self.path.display()
        );

        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove GPU exchange file {}: {e}", self.path.display());
        }
        submissions
    }
}

/// Decode length-prefixed submissions until end of input
///
/// A truncated trailing record ends the scan silently, as the writer may
/// still have been appending. A record that fails to decode ends it with a
/// warning: record boundaries past it cannot be trusted.
pub fn read_submissions<R: Read>(mut reader: R) -> Vec<GpuQueueSubmission> {
    let mut submissions = Vec::new();
    loop {
        match read_record(&mut reader) {
            Ok(Some(submission)) => submissions.push(submission),
            Ok(None) => break,
            Err(e) => {
                warn!("Stopping GPU exchange file scan after {} records: {e}", submissions.len());
                break;
            }
        }
    }
    submissions
}

fn read_record<R: Read>(reader: &mut R) -> Result<Option<GpuQueueSubmission>, CaptureError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_bytes);
    let mut payload = Vec::with_capacity(len as usize);
    reader.by_ref().take(u64::from(len)).read_to_end(&mut payload)?;
    if payload.len() < len as usize {
        debug!("Truncated GPU exchange record: {} of {len} bytes", payload.len());
        return Ok(None);
    }

    Ok(Some(GpuQueueSubmission::decode(payload.as_slice())?))
}

/// Write submissions in the exchange file format
///
/// # Errors
/// Returns an error if writing fails or a record exceeds `u32::MAX` bytes
pub fn write_submissions<W: Write>(
    mut writer: W,
    submissions: &[GpuQueueSubmission],
) -> io::Result<()> {
    for submission in submissions {
        let payload = submission.encode_to_vec();
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(ErrorKind::InvalidData, "GPU submission too large"))?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&payload)?;
    }
    writer.flush()
}
