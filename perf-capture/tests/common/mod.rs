//! Shared fixtures for session-level tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use perf_capture::config::CaptureOptions;
use perf_capture::consumer::CaptureEventConsumer;
use perf_capture::capture::GpuSubmissionSource;
use perf_capture::tracer::{ListenerHandle, Tracer, TracerFactory};
use perf_capture_common::{CaptureEvent, GpuQueueSubmission};

/// Keeps every batch it receives, in dispatch order
#[derive(Default)]
pub struct RecordingConsumer {
    batches: Mutex<Vec<Vec<CaptureEvent>>>,
}

impl RecordingConsumer {
    /// Number of `process_events` calls, empty batches included
    pub fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Number of batches that carried at least one event
    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().iter().filter(|batch| !batch.is_empty()).count()
    }

    /// Non-empty batches, in dispatch order
    pub fn batches(&self) -> Vec<Vec<CaptureEvent>> {
        self.batches.lock().unwrap().iter().filter(|batch| !batch.is_empty()).cloned().collect()
    }

    /// Every received event, flattened in dispatch order
    pub fn events(&self) -> Vec<CaptureEvent> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

impl CaptureEventConsumer for RecordingConsumer {
    fn process_events(&self, events: Vec<CaptureEvent>) {
        self.batches.lock().unwrap().push(events);
    }
}

/// Tracer driven by the test itself through the captured listener handle
pub struct ScriptedTracerFactory {
    pub handle: Arc<Mutex<Option<ListenerHandle>>>,
    pub fail_start: bool,
}

impl ScriptedTracerFactory {
    pub fn new() -> Self {
        Self { handle: Arc::new(Mutex::new(None)), fail_start: false }
    }

    pub fn failing() -> Self {
        Self { fail_start: true, ..Self::new() }
    }
}

struct ScriptedTracer {
    fail_start: bool,
}

impl Tracer for ScriptedTracer {
    fn start(&mut self) -> anyhow::Result<()> {
        if self.fail_start {
            anyhow::bail!("perf_event_open: permission denied");
        }
        Ok(())
    }

    fn stop(&mut self) {}
}

impl TracerFactory for ScriptedTracerFactory {
    fn create(&self, _options: &CaptureOptions, listener: ListenerHandle) -> Box<dyn Tracer> {
        *self.handle.lock().unwrap() = Some(listener);
        Box::new(ScriptedTracer { fail_start: self.fail_start })
    }
}

/// Next batch that carries events, skipping idle ticks
pub fn recv_non_empty(rx: &Receiver<Vec<CaptureEvent>>, timeout: Duration) -> Vec<CaptureEvent> {
    let deadline = Instant::now() + timeout;
    loop {
        let batch = rx.recv_deadline(deadline).expect("non-empty batch before the deadline");
        if !batch.is_empty() {
            return batch;
        }
    }
}

pub fn granted_handle(slot: &Arc<Mutex<Option<ListenerHandle>>>) -> ListenerHandle {
    slot.lock().unwrap().clone().expect("tracer was created with a listener handle")
}

/// GPU source that never has anything to splice
pub struct NoGpuSubmissions;

impl GpuSubmissionSource for NoGpuSubmissions {
    fn take_submissions(&self) -> Vec<GpuQueueSubmission> {
        Vec::new()
    }
}

/// Each key is defined once, before every event that references it
pub fn assert_definitions_precede_references(events: &[CaptureEvent]) {
    let mut defined = HashSet::new();
    for (index, event) in events.iter().enumerate() {
        if let Some(key) = event.defined_key() {
            assert!(defined.insert(key), "key {key:?} defined twice (event {index})");
        }
        for key in event.referenced_keys() {
            assert!(defined.contains(&key), "event {index} references undefined key {key:?}");
        }
    }
}
