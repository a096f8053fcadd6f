//! # Downstream Consumers
//!
//! The sender thread hands every drained batch to a [`CaptureEventConsumer`].
//! The consumer owns the batch from then on and is responsible for its own
//! batching, serialization and delivery.
//!
//! - [`ChannelConsumer`]: forwards batches over a crossbeam channel
//! - [`StatsConsumer`]: counts events per kind, optionally forwarding
//! - [`crate::export::JsonLinesConsumer`]: writes events as JSON lines

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use log::warn;
use perf_capture_common::{CaptureEvent, EventKind};

/// Receives every batch drained by the sender thread, empty ones included
pub trait CaptureEventConsumer: Send + Sync {
    fn process_events(&self, events: Vec<CaptureEvent>);
}

impl<C: CaptureEventConsumer + ?Sized> CaptureEventConsumer for Arc<C> {
    fn process_events(&self, events: Vec<CaptureEvent>) {
        (**self).process_events(events);
    }
}

/// Forwards batches to a channel receiver (e.g. the transport thread)
pub struct ChannelConsumer {
    tx: Sender<Vec<CaptureEvent>>,
}

impl ChannelConsumer {
    #[must_use]
    pub fn new(tx: Sender<Vec<CaptureEvent>>) -> Self {
        Self { tx }
    }

    /// Consumer backed by an unbounded channel, plus its receiving end
    #[must_use]
    pub fn unbounded() -> (Self, Receiver<Vec<CaptureEvent>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl CaptureEventConsumer for ChannelConsumer {
    fn process_events(&self, events: Vec<CaptureEvent>) {
        let count = events.len();
        if self.tx.send(events).is_err() {
            warn!("Capture event receiver is gone, dropping batch of {count} events");
        }
    }
}

/// Counters collected by [`StatsConsumer`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub batches: u64,
    pub events: u64,
    pub largest_batch: usize,
    pub per_kind: BTreeMap<EventKind, u64>,
}

impl CaptureStats {
    pub fn count(&self, kind: EventKind) -> u64 {
        self.per_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Number of `Interned*` definition events
    pub fn interning_events(&self) -> u64 {
        self.count(EventKind::InternedCallstack)
            + self.count(EventKind::InternedString)
            + self.count(EventKind::InternedTracepointInfo)
    }
}

/// Counts dispatched events, then forwards them to an optional inner consumer
#[derive(Default)]
pub struct StatsConsumer {
    stats: Mutex<CaptureStats>,
    inner: Option<Arc<dyn CaptureEventConsumer>>,
}

impl StatsConsumer {
    /// Counting-only consumer; batches are dropped after counting
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn forwarding_to(inner: Arc<dyn CaptureEventConsumer>) -> Self {
        Self { stats: Mutex::default(), inner: Some(inner) }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CaptureEventConsumer for StatsConsumer {
    fn process_events(&self, events: Vec<CaptureEvent>) {
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.batches += 1;
            stats.events += events.len() as u64;
            stats.largest_batch = stats.largest_batch.max(events.len());
            for event in &events {
                *stats.per_kind.entry(event.kind()).or_insert(0) += 1;
            }
        }
        if let Some(inner) = &self.inner {
            inner.process_events(events);
        }
    }
}

/// Display capture statistics
#[allow(clippy::cast_precision_loss)]
pub fn display_statistics(stats: &CaptureStats) {
    let average = if stats.batches == 0 { 0.0 } else { stats.events as f64 / stats.batches as f64 };
    eprintln!(
        "stats: events={} batches={} avg_batch={average:.1} largest_batch={}",
        stats.events, stats.batches, stats.largest_batch
    );
    for (kind, count) in &stats.per_kind {
        eprintln!("  {kind:<24} {count}");
    }
}
