mod common;

use std::fs::File;
use std::sync::Arc;

use common::{granted_handle, RecordingConsumer, ScriptedTracerFactory};
use perf_capture::capture::splice::write_submissions;
use perf_capture::capture::CaptureHandler;
use perf_capture::config::CaptureOptions;
use perf_capture::tracer::TracerListener;
use perf_capture_common::capture_event::Event;
use perf_capture_common::{
    EventKind, GpuCommandBuffer, GpuQueueSubmission, GpuQueueSubmissionMetaInfo, GpuSubmitInfo,
    ThreadName,
};

fn submission(tid: i32) -> GpuQueueSubmission {
    GpuQueueSubmission {
        meta_info: Some(GpuQueueSubmissionMetaInfo {
            tid,
            pre_submission_cpu_timestamp: 1_000,
            post_submission_cpu_timestamp: 2_000,
        }),
        submit_infos: vec![GpuSubmitInfo {
            command_buffers: vec![GpuCommandBuffer {
                begin_gpu_timestamp_ns: 1_500,
                end_gpu_timestamp_ns: 1_800,
            }],
        }],
        num_begin_markers: 0,
        completed_markers: Vec::new(),
    }
}

fn session(exchange_file: &std::path::Path) -> (CaptureHandler, Arc<RecordingConsumer>, ScriptedTracerFactory) {
    let recorder = Arc::new(RecordingConsumer::default());
    let factory = ScriptedTracerFactory::new();
    let scripted = ScriptedTracerFactory { handle: Arc::clone(&factory.handle), fail_start: false };
    let mut handler = CaptureHandler::new(factory, recorder.clone());
    handler
        .start(CaptureOptions {
            gpu_exchange_file: exchange_file.to_path_buf(),
            ..CaptureOptions::default()
        })
        .unwrap();
    (handler, recorder, scripted)
}

#[test]
fn test_exchange_file_is_spliced_into_final_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orbit_test_file");
    write_submissions(File::create(&path).unwrap(), &[submission(1), submission(2), submission(3)])
        .unwrap();

    let (mut handler, recorder, factory) = session(&path);
    granted_handle(&factory.handle).on_thread_name(ThreadName::default());
    handler.stop().unwrap();

    let events = recorder.events();
    let kinds: Vec<_> = events.iter().map(|event| event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ThreadName,
            EventKind::GpuQueueSubmission,
            EventKind::GpuQueueSubmission,
            EventKind::GpuQueueSubmission,
        ]
    );

    let tids: Vec<_> = events
        .iter()
        .filter_map(|event| match &event.event {
            Some(Event::GpuQueueSubmission(submission)) => {
                submission.meta_info.as_ref().map(|meta| meta.tid)
            }
            _ => None,
        })
        .collect();
    assert_eq!(tids, vec![1, 2, 3]);
    assert!(!path.exists(), "exchange file must be removed after splicing");
}

#[test]
fn test_missing_exchange_file_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never_written");

    let (mut handler, recorder, factory) = session(&path);
    granted_handle(&factory.handle).on_thread_name(ThreadName::default());
    handler.stop().unwrap();

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::ThreadName);
}

#[test]
fn test_splice_only_session_dispatches_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orbit_test_file");
    write_submissions(File::create(&path).unwrap(), &[submission(9)]).unwrap();

    let (mut handler, recorder, _factory) = session(&path);
    handler.stop().unwrap();

    assert_eq!(recorder.batch_count(), 1);
    assert_eq!(recorder.events()[0].kind(), EventKind::GpuQueueSubmission);
}
