//! JSON-lines exporter
//!
//! ```json
//! {"event":{"ThreadName":{"pid":1,"tid":2,"name":"main","timestamp_ns":10}}}
//! {"event":{"InternedString":{"key":1234,"intern":"gfx"}}}
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use log::warn;
use perf_capture_common::CaptureEvent;

use crate::consumer::CaptureEventConsumer;
use crate::domain::ExportError;

/// Writes every dispatched event as one JSON object per line
pub struct JsonLinesConsumer<W: Write + Send> {
    writer: Mutex<BufWriter<W>>,
}

impl JsonLinesConsumer<File> {
    /// Create (or truncate) `path` and export into it
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> JsonLinesConsumer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(BufWriter::new(writer)) }
    }

    /// Flush buffered lines to the underlying writer
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails
    pub fn flush(&self) -> Result<(), ExportError> {
        self.lock().flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer
    ///
    /// # Errors
    /// Returns an error if the final flush fails
    pub fn into_inner(self) -> Result<W, ExportError> {
        let writer = self.writer.into_inner().unwrap_or_else(PoisonError::into_inner);
        writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
    }

    fn write_batch(&self, events: &[CaptureEvent]) -> Result<(), ExportError> {
        let mut writer = self.lock();
        for event in events {
            serde_json::to_writer(&mut *writer, event)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufWriter<W>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> CaptureEventConsumer for JsonLinesConsumer<W> {
    fn process_events(&self, events: Vec<CaptureEvent>) {
        if let Err(e) = self.write_batch(&events) {
            warn!("Failed to export batch of {} events: {e}", events.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_capture_common::{InternedString, ThreadName};

    #[test]
    fn test_writes_one_line_per_event() {
        let consumer = JsonLinesConsumer::new(Vec::new());
        consumer.process_events(vec![
            CaptureEvent::from(InternedString { key: 7, intern: "gfx".to_string() }),
            CaptureEvent::from(ThreadName {
                pid: 1,
                tid: 2,
                name: "main".to_string(),
                timestamp_ns: 10,
            }),
        ]);
        let output = String::from_utf8(consumer.into_inner().unwrap()).unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"]["InternedString"]["key"], 7);
        assert_eq!(first["event"]["InternedString"]["intern"], "gfx");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"]["ThreadName"]["name"], "main");
    }

    #[test]
    fn test_create_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let consumer = JsonLinesConsumer::create(&path).unwrap();
        consumer.process_events(vec![CaptureEvent::from(ThreadName::default())]);
        consumer.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("ThreadName"));
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = JsonLinesConsumer::create(dir.path().join("missing").join("events.jsonl"));
        assert!(matches!(result, Err(ExportError::WriteFailed(_))));
    }
}
