//! # Shared Capture Event Types (Tracer ↔ Core ↔ Transport)
//!
//! Defines the protobuf messages exchanged between the OS-level tracer, the
//! capture core and the downstream transport. Messages are declared by hand
//! with `prost` derives so the crate needs no build script; field tags are
//! part of the wire contract and must never be renumbered.
//!
//! ## Key-or-Payload Fields
//!
//! Several events can refer to a large payload either inline or through a
//! 64-bit interning key (see `Interned*` messages). The choice is modelled as
//! a `oneof`:
//!
//! - Producers always fill the inline variant (`Callstack`, `Timeline`, ...)
//! - The capture core replaces it with the key variant before dispatch
//!
//! ## Key Types
//!
//! - [`CaptureEvent`] - Tagged union over every event kind
//! - [`EventKind`] - Fieldless name of the active variant
//! - [`GpuQueueSubmission`] - Record format of the GPU exchange file

#![allow(clippy::derive_partial_eq_without_eq)]

use std::fmt;

use serde::Serialize;

// ============================================================================
// Scheduling and Thread Metadata
// ============================================================================

/// A time slice during which a thread was scheduled on a core.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct SchedulingSlice {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(int32, tag = "3")]
    pub core: i32,
    #[prost(uint64, tag = "4")]
    pub in_timestamp_ns: u64,
    #[prost(uint64, tag = "5")]
    pub out_timestamp_ns: u64,
}

/// Name of a thread, as observed at `timestamp_ns`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ThreadName {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(uint64, tag = "4")]
    pub timestamp_ns: u64,
}

/// Linux thread state as reported by the scheduler tracepoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, prost::Enumeration)]
#[repr(i32)]
pub enum ThreadState {
    Running = 0,
    Runnable = 1,
    InterruptibleSleep = 2,
    UninterruptibleSleep = 3,
    Stopped = 4,
    Traced = 5,
    Dead = 6,
    Zombie = 7,
    Parked = 8,
    Idle = 9,
}

/// A time span during which a thread stayed in one [`ThreadState`].
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ThreadStateSlice {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(enumeration = "ThreadState", tag = "3")]
    pub thread_state: i32,
    #[prost(uint64, tag = "4")]
    pub begin_timestamp_ns: u64,
    #[prost(uint64, tag = "5")]
    pub end_timestamp_ns: u64,
}

// ============================================================================
// Callstacks
// ============================================================================

/// Ordered program counters, innermost frame first.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, prost::Message)]
pub struct Callstack {
    #[prost(uint64, repeated, tag = "1")]
    pub pcs: Vec<u64>,
}

/// A sampled callstack of one thread.
///
/// Producers send `Callstack`; the core rewrites it to `CallstackKey`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct CallstackSample {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(uint64, tag = "4")]
    pub timestamp_ns: u64,
    #[prost(oneof = "callstack_sample::CallstackOrKey", tags = "3, 5")]
    pub callstack_or_key: Option<callstack_sample::CallstackOrKey>,
}

pub mod callstack_sample {
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, prost::Oneof)]
    pub enum CallstackOrKey {
        #[prost(message, tag = "3")]
        Callstack(super::Callstack),
        #[prost(uint64, tag = "5")]
        CallstackKey(u64),
    }
}

// ============================================================================
// Instrumentation
// ============================================================================

/// A dynamically instrumented function call.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct FunctionCall {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(uint64, tag = "3")]
    pub absolute_address: u64,
    #[prost(uint64, tag = "4")]
    pub begin_timestamp_ns: u64,
    #[prost(uint64, tag = "5")]
    pub end_timestamp_ns: u64,
    #[prost(int32, tag = "6")]
    pub depth: i32,
    #[prost(uint64, tag = "7")]
    pub return_value: u64,
    #[prost(uint64, repeated, tag = "8")]
    pub registers: Vec<u64>,
}

/// A scope recorded by the profiler's own self-instrumentation.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct IntrospectionScope {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(uint64, tag = "3")]
    pub begin_timestamp_ns: u64,
    #[prost(uint64, tag = "4")]
    pub end_timestamp_ns: u64,
    #[prost(uint32, tag = "5")]
    pub depth: u32,
    #[prost(uint64, repeated, tag = "6")]
    pub registers: Vec<u64>,
}

// ============================================================================
// GPU
// ============================================================================

/// A GPU job as seen by the kernel driver tracepoints.
///
/// Producers send `Timeline`; the core rewrites it to `TimelineKey`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GpuJob {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(uint32, tag = "3")]
    pub context: u32,
    #[prost(uint32, tag = "4")]
    pub seqno: u32,
    #[prost(int32, tag = "6")]
    pub depth: i32,
    #[prost(uint64, tag = "7")]
    pub amdgpu_cs_ioctl_time_ns: u64,
    #[prost(uint64, tag = "8")]
    pub amdgpu_sched_run_job_time_ns: u64,
    #[prost(uint64, tag = "9")]
    pub gpu_hardware_start_time_ns: u64,
    #[prost(uint64, tag = "10")]
    pub dma_fence_signaled_time_ns: u64,
    #[prost(oneof = "gpu_job::TimelineOrKey", tags = "5, 11")]
    pub timeline_or_key: Option<gpu_job::TimelineOrKey>,
}

pub mod gpu_job {
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, prost::Oneof)]
    pub enum TimelineOrKey {
        #[prost(string, tag = "5")]
        Timeline(String),
        #[prost(uint64, tag = "11")]
        TimelineKey(u64),
    }
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GpuQueueSubmissionMetaInfo {
    #[prost(int32, tag = "1")]
    pub tid: i32,
    #[prost(uint64, tag = "2")]
    pub pre_submission_cpu_timestamp: u64,
    #[prost(uint64, tag = "3")]
    pub post_submission_cpu_timestamp: u64,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GpuCommandBuffer {
    #[prost(uint64, tag = "1")]
    pub begin_gpu_timestamp_ns: u64,
    #[prost(uint64, tag = "2")]
    pub end_gpu_timestamp_ns: u64,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GpuSubmitInfo {
    #[prost(message, repeated, tag = "1")]
    pub command_buffers: Vec<GpuCommandBuffer>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GpuDebugMarker {
    #[prost(uint64, tag = "1")]
    pub text_key: u64,
    #[prost(uint32, tag = "2")]
    pub depth: u32,
    #[prost(uint64, tag = "3")]
    pub begin_cpu_timestamp_ns: u64,
    #[prost(uint64, tag = "4")]
    pub end_gpu_timestamp_ns: u64,
}

/// One `vkQueueSubmit` as recorded by the out-of-process GPU layer.
///
/// This is the record type of the GPU exchange file: each record is a 4-byte
/// little-endian length followed by the encoded message.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GpuQueueSubmission {
    #[prost(message, optional, tag = "1")]
    pub meta_info: Option<GpuQueueSubmissionMetaInfo>,
    #[prost(message, repeated, tag = "2")]
    pub submit_infos: Vec<GpuSubmitInfo>,
    #[prost(uint32, tag = "3")]
    pub num_begin_markers: u32,
    #[prost(message, repeated, tag = "4")]
    pub completed_markers: Vec<GpuDebugMarker>,
}

// ============================================================================
// Symbols and Tracepoints
// ============================================================================

/// Symbol information for one absolute instruction address.
///
/// Producers send the raw `FunctionName` and `MapName`; the core rewrites
/// both to keys of interned strings.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct AddressInfo {
    #[prost(uint64, tag = "1")]
    pub absolute_address: u64,
    #[prost(uint64, tag = "3")]
    pub offset_in_function: u64,
    #[prost(oneof = "address_info::FunctionNameOrKey", tags = "2, 5")]
    pub function_name_or_key: Option<address_info::FunctionNameOrKey>,
    #[prost(oneof = "address_info::MapNameOrKey", tags = "4, 6")]
    pub map_name_or_key: Option<address_info::MapNameOrKey>,
}

pub mod address_info {
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, prost::Oneof)]
    pub enum FunctionNameOrKey {
        #[prost(string, tag = "2")]
        FunctionName(String),
        #[prost(uint64, tag = "5")]
        FunctionNameKey(u64),
    }

    #[derive(Clone, PartialEq, Serialize, prost::Oneof)]
    pub enum MapNameOrKey {
        #[prost(string, tag = "4")]
        MapName(String),
        #[prost(uint64, tag = "6")]
        MapNameKey(u64),
    }
}

/// Descriptor of a kernel tracepoint (`category:name`, e.g. `sched:sched_switch`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, prost::Message)]
pub struct TracepointInfo {
    #[prost(string, tag = "1")]
    pub category: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

/// A hit of a kernel tracepoint.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct TracepointEvent {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(uint64, tag = "3")]
    pub time_ns: u64,
    #[prost(int32, tag = "4")]
    pub cpu: i32,
    #[prost(oneof = "tracepoint_event::TracepointInfoOrKey", tags = "5, 6")]
    pub tracepoint_info_or_key: Option<tracepoint_event::TracepointInfoOrKey>,
}

pub mod tracepoint_event {
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, prost::Oneof)]
    pub enum TracepointInfoOrKey {
        #[prost(message, tag = "5")]
        TracepointInfo(super::TracepointInfo),
        #[prost(uint64, tag = "6")]
        TracepointInfoKey(u64),
    }
}

// ============================================================================
// Interning Definitions
// ============================================================================

/// Defines `key` as referring to the callstack `intern`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct InternedCallstack {
    #[prost(uint64, tag = "1")]
    pub key: u64,
    #[prost(message, optional, tag = "2")]
    pub intern: Option<Callstack>,
}

/// Defines `key` as referring to the string `intern`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct InternedString {
    #[prost(uint64, tag = "1")]
    pub key: u64,
    #[prost(string, tag = "2")]
    pub intern: String,
}

/// Defines `key` as referring to the tracepoint descriptor `intern`.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct InternedTracepointInfo {
    #[prost(uint64, tag = "1")]
    pub key: u64,
    #[prost(message, optional, tag = "2")]
    pub intern: Option<TracepointInfo>,
}

// ============================================================================
// Capture Event
// ============================================================================

/// Tagged union over every event the capture core dispatches.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct CaptureEvent {
    #[prost(
        oneof = "capture_event::Event",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13"
    )]
    pub event: Option<capture_event::Event>,
}

pub mod capture_event {
    use serde::Serialize;

    #[derive(Clone, PartialEq, Serialize, prost::Oneof)]
    pub enum Event {
        #[prost(message, tag = "1")]
        SchedulingSlice(super::SchedulingSlice),
        #[prost(message, tag = "2")]
        CallstackSample(super::CallstackSample),
        #[prost(message, tag = "3")]
        FunctionCall(super::FunctionCall),
        #[prost(message, tag = "4")]
        IntrospectionScope(super::IntrospectionScope),
        #[prost(message, tag = "5")]
        GpuJob(super::GpuJob),
        #[prost(message, tag = "6")]
        ThreadName(super::ThreadName),
        #[prost(message, tag = "7")]
        ThreadStateSlice(super::ThreadStateSlice),
        #[prost(message, tag = "8")]
        AddressInfo(super::AddressInfo),
        #[prost(message, tag = "9")]
        TracepointEvent(super::TracepointEvent),
        #[prost(message, tag = "10")]
        InternedCallstack(super::InternedCallstack),
        #[prost(message, tag = "11")]
        InternedString(super::InternedString),
        #[prost(message, tag = "12")]
        InternedTracepointInfo(super::InternedTracepointInfo),
        #[prost(message, tag = "13")]
        GpuQueueSubmission(super::GpuQueueSubmission),
    }
}

/// Name of the active [`CaptureEvent`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    SchedulingSlice,
    CallstackSample,
    FunctionCall,
    IntrospectionScope,
    GpuJob,
    ThreadName,
    ThreadStateSlice,
    AddressInfo,
    TracepointEvent,
    InternedCallstack,
    InternedString,
    InternedTracepointInfo,
    GpuQueueSubmission,
    /// An event whose `oneof` was never set
    Empty,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Independent key namespaces, one per interning cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum KeySpace {
    Callstack,
    String,
    Tracepoint,
}

impl CaptureEvent {
    /// Returns the kind of the active variant
    #[must_use]
    pub fn kind(&self) -> EventKind {
        use capture_event::Event;

        match &self.event {
            Some(Event::SchedulingSlice(_)) => EventKind::SchedulingSlice,
            Some(Event::CallstackSample(_)) => EventKind::CallstackSample,
            Some(Event::FunctionCall(_)) => EventKind::FunctionCall,
            Some(Event::IntrospectionScope(_)) => EventKind::IntrospectionScope,
            Some(Event::GpuJob(_)) => EventKind::GpuJob,
            Some(Event::ThreadName(_)) => EventKind::ThreadName,
            Some(Event::ThreadStateSlice(_)) => EventKind::ThreadStateSlice,
            Some(Event::AddressInfo(_)) => EventKind::AddressInfo,
            Some(Event::TracepointEvent(_)) => EventKind::TracepointEvent,
            Some(Event::InternedCallstack(_)) => EventKind::InternedCallstack,
            Some(Event::InternedString(_)) => EventKind::InternedString,
            Some(Event::InternedTracepointInfo(_)) => EventKind::InternedTracepointInfo,
            Some(Event::GpuQueueSubmission(_)) => EventKind::GpuQueueSubmission,
            None => EventKind::Empty,
        }
    }

    /// Returns true for `Interned*` definition events
    #[must_use]
    pub fn is_interning(&self) -> bool {
        self.defined_key().is_some()
    }

    /// The key defined by an `Interned*` event
    #[must_use]
    pub fn defined_key(&self) -> Option<(KeySpace, u64)> {
        use capture_event::Event;

        match &self.event {
            Some(Event::InternedCallstack(interned)) => Some((KeySpace::Callstack, interned.key)),
            Some(Event::InternedString(interned)) => Some((KeySpace::String, interned.key)),
            Some(Event::InternedTracepointInfo(interned)) => {
                Some((KeySpace::Tracepoint, interned.key))
            }
            _ => None,
        }
    }

    /// Every interning key this event refers to (not defines)
    #[must_use]
    pub fn referenced_keys(&self) -> Vec<(KeySpace, u64)> {
        use address_info::{FunctionNameOrKey, MapNameOrKey};
        use callstack_sample::CallstackOrKey;
        use capture_event::Event;
        use gpu_job::TimelineOrKey;
        use tracepoint_event::TracepointInfoOrKey;

        let mut keys = Vec::new();
        match &self.event {
            Some(Event::CallstackSample(sample)) => {
                if let Some(CallstackOrKey::CallstackKey(key)) = sample.callstack_or_key {
                    keys.push((KeySpace::Callstack, key));
                }
            }
            Some(Event::GpuJob(job)) => {
                if let Some(TimelineOrKey::TimelineKey(key)) = job.timeline_or_key {
                    keys.push((KeySpace::String, key));
                }
            }
            Some(Event::AddressInfo(info)) => {
                if let Some(FunctionNameOrKey::FunctionNameKey(key)) = info.function_name_or_key {
                    keys.push((KeySpace::String, key));
                }
                if let Some(MapNameOrKey::MapNameKey(key)) = info.map_name_or_key {
                    keys.push((KeySpace::String, key));
                }
            }
            Some(Event::TracepointEvent(event)) => {
                if let Some(TracepointInfoOrKey::TracepointInfoKey(key)) =
                    event.tracepoint_info_or_key
                {
                    keys.push((KeySpace::Tracepoint, key));
                }
            }
            _ => {}
        }
        keys
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for CaptureEvent {
                fn from(payload: $variant) -> Self {
                    CaptureEvent { event: Some(capture_event::Event::$variant(payload)) }
                }
            }
        )*
    };
}

impl_from_payload!(
    SchedulingSlice,
    CallstackSample,
    FunctionCall,
    IntrospectionScope,
    GpuJob,
    ThreadName,
    ThreadStateSlice,
    AddressInfo,
    TracepointEvent,
    InternedCallstack,
    InternedString,
    InternedTracepointInfo,
    GpuQueueSubmission,
);

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    #[test]
    fn test_kind_matches_variant() {
        let event = CaptureEvent::from(ThreadName { name: "main".to_string(), ..Default::default() });
        assert_eq!(event.kind(), EventKind::ThreadName);
        assert_eq!(CaptureEvent::default().kind(), EventKind::Empty);
        assert_eq!(EventKind::GpuJob.to_string(), "GpuJob");
    }

    #[test]
    fn test_defined_and_referenced_keys() {
        let definition =
            CaptureEvent::from(InternedString { key: 42, intern: "gfx".to_string() });
        assert!(definition.is_interning());
        assert_eq!(definition.defined_key(), Some((KeySpace::String, 42)));

        let reference = CaptureEvent::from(AddressInfo {
            absolute_address: 0x1000,
            offset_in_function: 4,
            function_name_or_key: Some(address_info::FunctionNameOrKey::FunctionNameKey(42)),
            map_name_or_key: Some(address_info::MapNameOrKey::MapNameKey(7)),
        });
        assert!(!reference.is_interning());
        assert_eq!(reference.referenced_keys(), vec![(KeySpace::String, 42), (KeySpace::String, 7)]);
    }

    #[test]
    fn test_inline_payload_is_not_a_reference() {
        let sample = CaptureEvent::from(CallstackSample {
            callstack_or_key: Some(callstack_sample::CallstackOrKey::Callstack(Callstack {
                pcs: vec![1, 2, 3],
            })),
            ..Default::default()
        });
        assert!(sample.referenced_keys().is_empty());
    }

    #[test]
    fn test_thread_state_accessor() {
        let mut slice = ThreadStateSlice::default();
        slice.set_thread_state(ThreadState::UninterruptibleSleep);
        assert_eq!(slice.thread_state, 3);
        assert_eq!(slice.thread_state(), ThreadState::UninterruptibleSleep);
    }

    #[test]
    fn test_gpu_queue_submission_decodes_from_encoded_bytes() {
        let submission = GpuQueueSubmission {
            meta_info: Some(GpuQueueSubmissionMetaInfo {
                tid: 12,
                pre_submission_cpu_timestamp: 100,
                post_submission_cpu_timestamp: 200,
            }),
            submit_infos: vec![GpuSubmitInfo {
                command_buffers: vec![GpuCommandBuffer {
                    begin_gpu_timestamp_ns: 150,
                    end_gpu_timestamp_ns: 180,
                }],
            }],
            num_begin_markers: 0,
            completed_markers: Vec::new(),
        };
        let bytes = submission.encode_to_vec();
        let decoded = GpuQueueSubmission::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.meta_info.unwrap().tid, 12);
        assert_eq!(decoded.submit_infos[0].command_buffers[0].end_gpu_timestamp_ns, 180);
    }
}
