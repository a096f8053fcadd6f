//! Synthetic tracer for load testing
//!
//! Spawns producer threads that cycle through every event kind using a small
//! fixed set of callstacks, timelines, addresses and tracepoints, so the
//! interning caches see both first occurrences and repeats.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use perf_capture_common::address_info::{FunctionNameOrKey, MapNameOrKey};
use perf_capture_common::callstack_sample::CallstackOrKey;
use perf_capture_common::gpu_job::TimelineOrKey;
use perf_capture_common::tracepoint_event::TracepointInfoOrKey;
use perf_capture_common::{
    AddressInfo, Callstack, CallstackSample, FunctionCall, GpuJob, IntrospectionScope,
    SchedulingSlice, ThreadName, ThreadState, ThreadStateSlice, TracepointEvent, TracepointInfo,
};

use super::{ListenerHandle, Tracer, TracerFactory, TracerListener};
use crate::config::CaptureOptions;
use crate::os_utils::{current_pid, current_tid, monotonic_timestamp_ns};

/// Number of distinct event kinds a producer cycles through
pub const SYNTHETIC_EVENT_KINDS: u64 = 9;

const CALLSTACKS: [&[u64]; 3] = [
    &[0x5555_0000_1000, 0x5555_0000_2000, 0x5555_0000_3000],
    &[0x5555_0000_1000, 0x5555_0000_4000],
    &[0x7fff_0000_0100, 0x5555_0000_2000, 0x5555_0000_3000, 0x5555_0000_5000],
];

const TIMELINES: [&str; 2] = ["gfx", "sdma0"];

const ADDRESSES: [(u64, &str, &str); 4] = [
    (0x5555_0000_1000, "_ZN3app4main17h0123456789abcdefE", "/usr/bin/app"),
    (0x5555_0000_2000, "_ZN3app6worker3run17hfedcba9876543210E", "/usr/bin/app"),
    (0x5555_0000_3000, "_ZN3std2rt10lang_start17h00112233445566ffE", "/usr/bin/app"),
    (0x7fff_0000_0100, "__libc_start_main", "/usr/lib/libc.so.6"),
];

const TRACEPOINTS: [(&str, &str); 3] =
    [("sched", "sched_switch"), ("sched", "sched_wakeup"), ("irq", "irq_handler_entry")];

/// Builds a [`SyntheticTracer`] per session
#[derive(Debug, Clone)]
pub struct SyntheticTracerFactory {
    producers: usize,
    events_per_second: u64,
    events_per_producer: Option<u64>,
    emitted: Arc<AtomicU64>,
}

impl SyntheticTracerFactory {
    /// `events_per_second` is the total rate across producers; 0 disables pacing
    #[must_use]
    pub fn new(producers: usize, events_per_second: u64) -> Self {
        Self {
            producers: producers.max(1),
            events_per_second,
            events_per_producer: None,
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make each producer stop on its own after `limit` events
    #[must_use]
    pub fn with_events_per_producer(mut self, limit: u64) -> Self {
        self.events_per_producer = Some(limit);
        self
    }

    /// Total events emitted by every tracer this factory created
    #[must_use]
    pub fn emitted_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.emitted)
    }
}

impl TracerFactory for SyntheticTracerFactory {
    fn create(&self, options: &CaptureOptions, listener: ListenerHandle) -> Box<dyn Tracer> {
        debug!(
            "Creating synthetic tracer: {} producers, sampling at {} Hz",
            self.producers, options.sampling_frequency_hz
        );
        Box::new(SyntheticTracer {
            listener,
            producers: self.producers,
            pacing: pacing(self.producers, self.events_per_second),
            events_per_producer: self.events_per_producer,
            emitted: Arc::clone(&self.emitted),
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        })
    }
}

fn pacing(producers: usize, events_per_second: u64) -> Option<Duration> {
    if events_per_second == 0 {
        return None;
    }
    let per_producer = (events_per_second / producers as u64).max(1);
    Some(Duration::from_secs(1) / u32::try_from(per_producer).unwrap_or(u32::MAX))
}

/// A tracer whose producers emit a deterministic event mix
pub struct SyntheticTracer {
    listener: ListenerHandle,
    producers: usize,
    pacing: Option<Duration>,
    events_per_producer: Option<u64>,
    emitted: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Tracer for SyntheticTracer {
    fn start(&mut self) -> Result<()> {
        if !self.threads.is_empty() {
            anyhow::bail!("synthetic tracer already started");
        }
        self.running.store(true, Ordering::Release);

        for index in 0..self.producers {
            let producer = Producer {
                listener: self.listener.clone(),
                index,
                pacing: self.pacing,
                limit: self.events_per_producer,
                emitted: Arc::clone(&self.emitted),
                running: Arc::clone(&self.running),
            };
            let spawned = thread::Builder::new()
                .name(format!("synthetic-producer-{index}"))
                .spawn(move || producer.run());
            match spawned {
                Ok(handle) => self.threads.push(handle),
                Err(e) => {
                    self.stop();
                    return Err(e).context("Failed to spawn synthetic producer thread");
                }
            }
        }

        info!("Synthetic tracer started with {} producers", self.producers);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("Synthetic producer thread panicked");
            }
        }
        info!("Synthetic tracer stopped after {} events", self.emitted.load(Ordering::Relaxed));
    }
}

impl Drop for SyntheticTracer {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.stop();
        }
    }
}

struct Producer {
    listener: ListenerHandle,
    index: usize,
    pacing: Option<Duration>,
    limit: Option<u64>,
    emitted: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl Producer {
    fn run(self) {
        let pid = current_pid();
        let tid = current_tid();
        let mut seq = 0u64;

        while self.running.load(Ordering::Acquire) && self.limit.is_none_or(|limit| seq < limit) {
            emit(&self.listener, pid, tid, self.index, seq);
            self.emitted.fetch_add(1, Ordering::Relaxed);
            seq += 1;
            if let Some(pause) = self.pacing {
                thread::sleep(pause);
            }
        }
    }
}

/// Emit the `seq`-th event of a producer's cycle
pub fn emit(listener: &dyn TracerListener, pid: i32, tid: i32, producer: usize, seq: u64) {
    let now = monotonic_timestamp_ns();
    let round = usize::try_from(seq / SYNTHETIC_EVENT_KINDS).unwrap_or(usize::MAX);
    let core = i32::try_from(producer % 8).unwrap_or(0);

    match seq % SYNTHETIC_EVENT_KINDS {
        0 => listener.on_scheduling_slice(SchedulingSlice {
            pid,
            tid,
            core,
            in_timestamp_ns: now.saturating_sub(1_000),
            out_timestamp_ns: now,
        }),
        1 => listener.on_callstack_sample(CallstackSample {
            pid,
            tid,
            timestamp_ns: now,
            callstack_or_key: Some(CallstackOrKey::Callstack(Callstack {
                pcs: CALLSTACKS[round % CALLSTACKS.len()].to_vec(),
            })),
        }),
        2 => listener.on_function_call(FunctionCall {
            pid,
            tid,
            absolute_address: ADDRESSES[round % ADDRESSES.len()].0,
            begin_timestamp_ns: now.saturating_sub(500),
            end_timestamp_ns: now,
            depth: 0,
            return_value: seq,
            registers: vec![seq, 0, 0, 0, 0, 0],
        }),
        3 => listener.on_introspection_scope(IntrospectionScope {
            pid,
            tid,
            begin_timestamp_ns: now.saturating_sub(200),
            end_timestamp_ns: now,
            depth: 0,
            registers: vec![0; 6],
        }),
        4 => listener.on_gpu_job(GpuJob {
            pid,
            tid,
            context: 1,
            seqno: u32::try_from(round).unwrap_or(u32::MAX),
            depth: 0,
            amdgpu_cs_ioctl_time_ns: now.saturating_sub(4_000),
            amdgpu_sched_run_job_time_ns: now.saturating_sub(3_000),
            gpu_hardware_start_time_ns: now.saturating_sub(2_000),
            dma_fence_signaled_time_ns: now,
            timeline_or_key: Some(TimelineOrKey::Timeline(
                TIMELINES[round % TIMELINES.len()].to_string(),
            )),
        }),
        5 => listener.on_thread_name(ThreadName {
            pid,
            tid,
            name: format!("synthetic-producer-{producer}"),
            timestamp_ns: now,
        }),
        6 => {
            let mut slice = ThreadStateSlice {
                pid,
                tid,
                begin_timestamp_ns: now.saturating_sub(1_000),
                end_timestamp_ns: now,
                ..Default::default()
            };
            slice.set_thread_state(if round % 2 == 0 {
                ThreadState::Running
            } else {
                ThreadState::InterruptibleSleep
            });
            listener.on_thread_state_slice(slice);
        }
        7 => {
            let (address, function_name, map_name) = ADDRESSES[round % ADDRESSES.len()];
            listener.on_address_info(AddressInfo {
                absolute_address: address,
                offset_in_function: 0,
                function_name_or_key: Some(FunctionNameOrKey::FunctionName(
                    function_name.to_string(),
                )),
                map_name_or_key: Some(MapNameOrKey::MapName(map_name.to_string())),
            });
        }
        _ => {
            let (category, name) = TRACEPOINTS[round % TRACEPOINTS.len()];
            listener.on_tracepoint_event(TracepointEvent {
                pid,
                tid,
                time_ns: now,
                cpu: core,
                tracepoint_info_or_key: Some(TracepointInfoOrKey::TracepointInfo(TracepointInfo {
                    category: category.to_string(),
                    name: name.to_string(),
                })),
            });
        }
    }
}
