//! Sender thread: drains the event buffer into the consumer

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};
use perf_capture_common::CaptureEvent;

use super::buffer::{Drain, EventBuffer};
use super::splice::GpuSubmissionSource;
use crate::consumer::CaptureEventConsumer;
use crate::introspection;

pub(crate) const SENDER_THREAD_NAME: &str = "capture-sender";

/// Spawn the sender thread for one session
///
/// The thread exits after the final drain, so joining it after
/// [`EventBuffer::mark_stopped`] guarantees everything was dispatched.
pub(crate) fn spawn(
    buffer: Arc<EventBuffer>,
    consumer: Arc<dyn CaptureEventConsumer>,
    gpu_source: Arc<dyn GpuSubmissionSource>,
    send_interval: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(SENDER_THREAD_NAME.to_string())
        .spawn(move || run(&buffer, consumer.as_ref(), gpu_source.as_ref(), send_interval))
}

fn run(
    buffer: &EventBuffer,
    consumer: &dyn CaptureEventConsumer,
    gpu_source: &dyn GpuSubmissionSource,
    send_interval: Duration,
) {
    let mut batches = 0u64;
    let mut dispatched = 0u64;

    loop {
        let _scope = introspection::scope("SenderThread iteration");

        let (mut events, done) = match buffer.wait_and_drain(send_interval) {
            Drain::Pending(events) => (events, false),
            Drain::Final(events) => (events, true),
        };
        if done {
            let submissions = gpu_source.take_submissions();
            events.extend(submissions.into_iter().map(CaptureEvent::from));
        }

        debug!("Dispatching batch of {} events", events.len());
        batches += 1;
        dispatched += events.len() as u64;
        consumer.process_events(events);

        if done {
            break;
        }
    }

    info!("Sender thread finished: {dispatched} events in {batches} batches");
}
