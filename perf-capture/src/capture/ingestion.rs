//! # Event Ingestion
//!
//! One handler per event kind. Each handler checks the event arrived in the
//! form the tracer contract requires, interns its large payloads, and
//! appends the rewritten event to the session's [`EventBuffer`].
//!
//! ## Interned Payloads
//!
//! | Event             | Payload                      | Cache       |
//! |-------------------|------------------------------|-------------|
//! | `CallstackSample` | callstack                    | callstack   |
//! | `GpuJob`          | timeline name                | string      |
//! | `AddressInfo`     | demangled function, map name | string      |
//! | `TracepointEvent` | `category:name` descriptor   | tracepoint  |
//!
//! On the first occurrence of a key its `Interned*` definition is appended
//! before the referencing event. Referencing events always carry the key;
//! the payload is never sent twice in one session.
//!
//! ## Contract Violations
//!
//! An event arriving with a key where the payload is expected means the
//! tracer is broken. The handlers panic instead of guessing.

use std::sync::Arc;

use log::info;
use perf_capture_common::address_info::{FunctionNameOrKey, MapNameOrKey};
use perf_capture_common::callstack_sample::CallstackOrKey;
use perf_capture_common::gpu_job::TimelineOrKey;
use perf_capture_common::tracepoint_event::TracepointInfoOrKey;
use perf_capture_common::{
    AddressInfo, Callstack, CallstackSample, CaptureEvent, FunctionCall, GpuJob,
    InternedCallstack, InternedString, InternedTracepointInfo, IntrospectionScope,
    SchedulingSlice, ThreadName, ThreadStateSlice, TracepointEvent, TracepointInfo,
};

use super::buffer::EventBuffer;
use crate::demangle::Demangler;
use crate::domain::{Address, Key};
use crate::interning::{fingerprint, AddressDedupFilter, InternCache};
use crate::tracer::TracerListener;

/// Session-scoped ingestion state: the caches live exactly as long as this
pub struct CaptureIngestion {
    buffer: Arc<EventBuffer>,
    demangler: Arc<dyn Demangler>,
    callstack_cache: InternCache,
    string_cache: InternCache,
    tracepoint_cache: InternCache,
    address_filter: AddressDedupFilter,
}

impl CaptureIngestion {
    #[must_use]
    pub fn new(buffer: Arc<EventBuffer>, demangler: Arc<dyn Demangler>) -> Self {
        Self {
            buffer,
            demangler,
            callstack_cache: InternCache::new("callstacks"),
            string_cache: InternCache::new("strings"),
            tracepoint_cache: InternCache::new("tracepoints"),
            address_filter: AddressDedupFilter::new(),
        }
    }

    fn enqueue(&self, event: impl Into<CaptureEvent>) {
        self.buffer.push(event.into());
    }

    fn intern_callstack(&self, callstack: Callstack) -> Key {
        let key = fingerprint::callstack_key(&callstack);
        self.callstack_cache
            .intern_if_necessary(key, |key| {
                self.enqueue(InternedCallstack { key: key.as_raw(), intern: Some(callstack) });
            })
            .key()
    }

    fn intern_string(&self, value: String) -> Key {
        let key = fingerprint::string_key(&value);
        self.string_cache
            .intern_if_necessary(key, |key| {
                self.enqueue(InternedString { key: key.as_raw(), intern: value });
            })
            .key()
    }

    fn intern_tracepoint_info(&self, info: TracepointInfo) -> Key {
        let key = fingerprint::tracepoint_key(&info);
        self.tracepoint_cache
            .intern_if_necessary(key, |key| {
                self.enqueue(InternedTracepointInfo { key: key.as_raw(), intern: Some(info) });
            })
            .key()
    }

    /// Log the cache sizes reached this session
    pub fn log_summary(&self) {
        for cache in [&self.callstack_cache, &self.string_cache, &self.tracepoint_cache] {
            info!("Interned {} {}", cache.len(), cache.name());
        }
        info!("Resolved {} addresses", self.address_filter.len());
    }
}

impl TracerListener for CaptureIngestion {
    fn on_scheduling_slice(&self, scheduling_slice: SchedulingSlice) {
        self.enqueue(scheduling_slice);
    }

    fn on_callstack_sample(&self, mut callstack_sample: CallstackSample) {
        let Some(CallstackOrKey::Callstack(callstack)) = callstack_sample.callstack_or_key.take()
        else {
            panic!("CallstackSample must carry its full callstack, not a key");
        };
        let key = self.intern_callstack(callstack);
        callstack_sample.callstack_or_key = Some(CallstackOrKey::CallstackKey(key.as_raw()));
        self.enqueue(callstack_sample);
    }

    fn on_function_call(&self, function_call: FunctionCall) {
        self.enqueue(function_call);
    }

    fn on_introspection_scope(&self, introspection_scope: IntrospectionScope) {
        self.enqueue(introspection_scope);
    }

    fn on_gpu_job(&self, mut gpu_job: GpuJob) {
        let Some(TimelineOrKey::Timeline(timeline)) = gpu_job.timeline_or_key.take() else {
            panic!("GpuJob must carry its timeline name, not a key");
        };
        let key = self.intern_string(timeline);
        gpu_job.timeline_or_key = Some(TimelineOrKey::TimelineKey(key.as_raw()));
        self.enqueue(gpu_job);
    }

    fn on_thread_name(&self, thread_name: ThreadName) {
        self.enqueue(thread_name);
    }

    fn on_thread_state_slice(&self, thread_state_slice: ThreadStateSlice) {
        self.enqueue(thread_state_slice);
    }

    fn on_address_info(&self, mut address_info: AddressInfo) {
        if !self.address_filter.should_process(Address(address_info.absolute_address)) {
            return;
        }

        let Some(FunctionNameOrKey::FunctionName(function_name)) =
            address_info.function_name_or_key.take()
        else {
            panic!("AddressInfo must carry its raw function name, not a key");
        };
        let Some(MapNameOrKey::MapName(map_name)) = address_info.map_name_or_key.take() else {
            panic!("AddressInfo must carry its map name, not a key");
        };

        let function_name_key = self.intern_string(self.demangler.demangle(&function_name));
        let map_name_key = self.intern_string(map_name);
        address_info.function_name_or_key =
            Some(FunctionNameOrKey::FunctionNameKey(function_name_key.as_raw()));
        address_info.map_name_or_key = Some(MapNameOrKey::MapNameKey(map_name_key.as_raw()));
        self.enqueue(address_info);
    }

    fn on_tracepoint_event(&self, mut tracepoint_event: TracepointEvent) {
        let Some(TracepointInfoOrKey::TracepointInfo(info)) =
            tracepoint_event.tracepoint_info_or_key.take()
        else {
            panic!("TracepointEvent must carry its tracepoint info, not a key");
        };
        let key = self.intern_tracepoint_info(info);
        tracepoint_event.tracepoint_info_or_key =
            Some(TracepointInfoOrKey::TracepointInfoKey(key.as_raw()));
        self.enqueue(tracepoint_event);
    }
}
