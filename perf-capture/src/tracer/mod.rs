//! # Tracer Control Surface
//!
//! The OS-level tracer (perf events, eBPF, uprobes) lives outside this crate.
//! It is plugged in through two traits:
//!
//! - [`TracerFactory`]: builds a [`Tracer`] for one session, handing it a
//!   [`ListenerHandle`] to report decoded events through
//! - [`Tracer`]: starts and stops event production
//!
//! ## Listener Handles
//!
//! A [`ListenerHandle`] is a revocable capability to the session's ingestion
//! API. It does not keep the session alive: once the session is stopped the
//! handle is revoked and every call on it is a no-op. Tracers may clone it
//! freely into their producer threads.

use std::sync::{Arc, Weak};

use perf_capture_common::{
    AddressInfo, CallstackSample, FunctionCall, GpuJob, IntrospectionScope, SchedulingSlice,
    ThreadName, ThreadStateSlice, TracepointEvent,
};

use crate::config::CaptureOptions;

pub mod synthetic;

pub use synthetic::{SyntheticTracer, SyntheticTracerFactory};

/// One entry point per event kind the tracer can report
///
/// Implementations must be callable concurrently from any number of
/// producer threads.
pub trait TracerListener: Send + Sync {
    fn on_scheduling_slice(&self, scheduling_slice: SchedulingSlice);
    fn on_callstack_sample(&self, callstack_sample: CallstackSample);
    fn on_function_call(&self, function_call: FunctionCall);
    fn on_introspection_scope(&self, introspection_scope: IntrospectionScope);
    fn on_gpu_job(&self, gpu_job: GpuJob);
    fn on_thread_name(&self, thread_name: ThreadName);
    fn on_thread_state_slice(&self, thread_state_slice: ThreadStateSlice);
    fn on_address_info(&self, address_info: AddressInfo);
    fn on_tracepoint_event(&self, tracepoint_event: TracepointEvent);
}

/// An OS-level tracer producing events for one session
pub trait Tracer: Send {
    /// Begin producing events
    ///
    /// # Errors
    /// Returns an error if the tracer could not attach its event sources
    fn start(&mut self) -> anyhow::Result<()>;

    /// Stop producing events
    ///
    /// Must not return while any call into the listener is still in flight.
    fn stop(&mut self);
}

/// Creates a tracer for each capture session
pub trait TracerFactory: Send {
    fn create(&self, options: &CaptureOptions, listener: ListenerHandle) -> Box<dyn Tracer>;
}

/// Revocable, non-owning handle to a session's ingestion API
#[derive(Clone)]
pub struct ListenerHandle {
    listener: Weak<dyn TracerListener>,
}

impl ListenerHandle {
    pub(crate) fn new(listener: &Arc<dyn TracerListener>) -> Self {
        Self { listener: Arc::downgrade(listener) }
    }

    /// A handle that was never granted; every call is dropped
    #[must_use]
    pub fn revoked() -> Self {
        let listener: Weak<dyn TracerListener> = Weak::<NoopListener>::new();
        Self { listener }
    }

    /// Returns true once the owning session has been stopped
    pub fn is_revoked(&self) -> bool {
        self.listener.strong_count() == 0
    }

    fn with_listener(&self, deliver: impl FnOnce(&dyn TracerListener)) {
        if let Some(listener) = self.listener.upgrade() {
            deliver(listener.as_ref());
        }
    }
}

impl TracerListener for ListenerHandle {
    fn on_scheduling_slice(&self, scheduling_slice: SchedulingSlice) {
        self.with_listener(|listener| listener.on_scheduling_slice(scheduling_slice));
    }

    fn on_callstack_sample(&self, callstack_sample: CallstackSample) {
        self.with_listener(|listener| listener.on_callstack_sample(callstack_sample));
    }

    fn on_function_call(&self, function_call: FunctionCall) {
        self.with_listener(|listener| listener.on_function_call(function_call));
    }

    fn on_introspection_scope(&self, introspection_scope: IntrospectionScope) {
        self.with_listener(|listener| listener.on_introspection_scope(introspection_scope));
    }

    fn on_gpu_job(&self, gpu_job: GpuJob) {
        self.with_listener(|listener| listener.on_gpu_job(gpu_job));
    }

    fn on_thread_name(&self, thread_name: ThreadName) {
        self.with_listener(|listener| listener.on_thread_name(thread_name));
    }

    fn on_thread_state_slice(&self, thread_state_slice: ThreadStateSlice) {
        self.with_listener(|listener| listener.on_thread_state_slice(thread_state_slice));
    }

    fn on_address_info(&self, address_info: AddressInfo) {
        self.with_listener(|listener| listener.on_address_info(address_info));
    }

    fn on_tracepoint_event(&self, tracepoint_event: TracepointEvent) {
        self.with_listener(|listener| listener.on_tracepoint_event(tracepoint_event));
    }
}

/// Placeholder type for [`ListenerHandle::revoked`]
struct NoopListener;

impl TracerListener for NoopListener {
    fn on_scheduling_slice(&self, _: SchedulingSlice) {}
    fn on_callstack_sample(&self, _: CallstackSample) {}
    fn on_function_call(&self, _: FunctionCall) {}
    fn on_introspection_scope(&self, _: IntrospectionScope) {}
    fn on_gpu_job(&self, _: GpuJob) {}
    fn on_thread_name(&self, _: ThreadName) {}
    fn on_thread_state_slice(&self, _: ThreadStateSlice) {}
    fn on_address_info(&self, _: AddressInfo) {}
    fn on_tracepoint_event(&self, _: TracepointEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        thread_names: AtomicUsize,
    }

    impl TracerListener for CountingListener {
        fn on_scheduling_slice(&self, _: SchedulingSlice) {}
        fn on_callstack_sample(&self, _: CallstackSample) {}
        fn on_function_call(&self, _: FunctionCall) {}
        fn on_introspection_scope(&self, _: IntrospectionScope) {}
        fn on_gpu_job(&self, _: GpuJob) {}
        fn on_thread_name(&self, _: ThreadName) {
            self.thread_names.fetch_add(1, Ordering::Relaxed);
        }
        fn on_thread_state_slice(&self, _: ThreadStateSlice) {}
        fn on_address_info(&self, _: AddressInfo) {}
        fn on_tracepoint_event(&self, _: TracepointEvent) {}
    }

    #[test]
    fn test_handle_forwards_while_granted() {
        let counting = Arc::new(CountingListener::default());
        let listener: Arc<dyn TracerListener> = counting.clone();
        let handle = ListenerHandle::new(&listener);

        handle.on_thread_name(ThreadName::default());
        handle.clone().on_thread_name(ThreadName::default());

        assert!(!handle.is_revoked());
        assert_eq!(counting.thread_names.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_handle_is_revoked_when_session_drops_listener() {
        let counting = Arc::new(CountingListener::default());
        let listener: Arc<dyn TracerListener> = counting.clone();
        let handle = ListenerHandle::new(&listener);
        drop(listener);
        drop(counting);

        assert!(handle.is_revoked());
        // Must not panic
        handle.on_thread_name(ThreadName::default());
    }

    #[test]
    fn test_revoked_handle() {
        let handle = ListenerHandle::revoked();
        assert!(handle.is_revoked());
        handle.on_gpu_job(GpuJob::default());
    }
}
