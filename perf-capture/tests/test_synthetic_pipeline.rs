mod common;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{assert_definitions_precede_references, NoGpuSubmissions, RecordingConsumer};
use perf_capture::capture::CaptureHandler;
use perf_capture::config::CaptureOptions;
use perf_capture::consumer::{CaptureEventConsumer, StatsConsumer};
use perf_capture::tracer::SyntheticTracerFactory;
use perf_capture_common::{EventKind, KeySpace};

fn wait_for(counter: &std::sync::atomic::AtomicU64, target: u64) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while counter.load(Ordering::Relaxed) < target {
        assert!(Instant::now() < deadline, "synthetic producers stalled");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_synthetic_session_keeps_ordering_invariants() {
    let recorder = Arc::new(RecordingConsumer::default());
    let inner: Arc<dyn CaptureEventConsumer> = recorder.clone();
    let stats = Arc::new(StatsConsumer::forwarding_to(inner));

    let factory = SyntheticTracerFactory::new(4, 0).with_events_per_producer(900);
    let emitted = factory.emitted_counter();
    let mut handler =
        CaptureHandler::new(factory, stats.clone()).with_gpu_source(Arc::new(NoGpuSubmissions));

    handler
        .start(CaptureOptions { send_event_count_threshold: 256, ..CaptureOptions::default() })
        .unwrap();
    wait_for(&emitted, 3600);
    handler.stop().unwrap();

    let events = recorder.events();
    assert_definitions_precede_references(&events);

    let summary = stats.stats();
    assert_eq!(summary.events as usize, events.len());
    assert_eq!(summary.batches as usize, recorder.call_count());
    println!("{} events in {} batches", summary.events, summary.batches);

    // 100 full cycles per producer
    assert_eq!(summary.count(EventKind::CallstackSample), 400);
    assert_eq!(summary.count(EventKind::GpuJob), 400);
    assert_eq!(summary.count(EventKind::TracepointEvent), 400);
    assert_eq!(summary.count(EventKind::AddressInfo), 4);
    assert_eq!(summary.count(EventKind::InternedCallstack), 3);
    assert_eq!(summary.count(EventKind::InternedTracepointInfo), 3);
    assert_eq!(summary.count(EventKind::InternedString), 8);

    let mut spaces: BTreeMap<KeySpace, HashSet<u64>> = BTreeMap::new();
    for event in &events {
        if let Some((space, key)) = event.defined_key() {
            spaces.entry(space).or_default().insert(key);
        }
    }
    assert_eq!(spaces[&KeySpace::String].len(), 8);
}

#[test]
fn test_restarted_session_redefines_keys() {
    let recorder = Arc::new(RecordingConsumer::default());
    let factory = SyntheticTracerFactory::new(1, 0).with_events_per_producer(9);
    let emitted = factory.emitted_counter();
    let mut handler =
        CaptureHandler::new(factory, recorder.clone()).with_gpu_source(Arc::new(NoGpuSubmissions));

    for session in 1..=2u64 {
        handler.start(CaptureOptions::default()).unwrap();
        wait_for(&emitted, 9 * session);
        handler.stop().unwrap();
    }

    let definitions = recorder
        .events()
        .iter()
        .filter(|event| event.kind() == EventKind::InternedCallstack)
        .count();
    assert_eq!(definitions, 2, "each session starts with empty caches");
}
