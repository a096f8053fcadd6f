//! Capture session lifecycle
//!
//! [`CaptureHandler`] owns at most one session at a time. A session bundles
//! the tracer, the ingestion state (caches, filter, buffer) and the sender
//! thread; all of it is created by [`CaptureHandler::start`] and torn down
//! by [`CaptureHandler::stop`].
//!
//! Stop order:
//! 1. Stop the tracer (no producer call is in flight afterwards)
//! 2. Revoke the introspection listener and the tracer's listener handle
//! 3. Mark the buffer stopped, waking the sender for its final drain
//! 4. Join the sender

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};
use perf_capture_common::IntrospectionScope;

use super::buffer::EventBuffer;
use super::ingestion::CaptureIngestion;
use super::sender;
use super::splice::{ExchangeFile, GpuSubmissionSource};
use crate::config::CaptureOptions;
use crate::consumer::CaptureEventConsumer;
use crate::demangle::{Demangler, RustcDemangler};
use crate::domain::CaptureError;
use crate::introspection::{self, ListenerId, Scope};
use crate::os_utils::current_pid;
use crate::tracer::{ListenerHandle, Tracer, TracerFactory, TracerListener};

struct Session {
    tracer: Box<dyn Tracer>,
    ingestion: Arc<CaptureIngestion>,
    buffer: Arc<EventBuffer>,
    sender: JoinHandle<()>,
    introspection_listener: Option<ListenerId>,
}

/// Starts and stops capture sessions, forwarding their events to one consumer
pub struct CaptureHandler {
    factory: Box<dyn TracerFactory>,
    consumer: Arc<dyn CaptureEventConsumer>,
    demangler: Arc<dyn Demangler>,
    gpu_source: Option<Arc<dyn GpuSubmissionSource>>,
    session: Option<Session>,
}

impl CaptureHandler {
    pub fn new(factory: impl TracerFactory + 'static, consumer: Arc<dyn CaptureEventConsumer>) -> Self {
        Self {
            factory: Box::new(factory),
            consumer,
            demangler: Arc::new(RustcDemangler),
            gpu_source: None,
            session: None,
        }
    }

    /// Replace the default Rust demangler
    #[must_use]
    pub fn with_demangler(mut self, demangler: impl Demangler + 'static) -> Self {
        self.demangler = Arc::new(demangler);
        self
    }

    /// Read GPU submissions from `source` instead of the configured exchange file
    #[must_use]
    pub fn with_gpu_source(mut self, source: Arc<dyn GpuSubmissionSource>) -> Self {
        self.gpu_source = Some(source);
        self
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session
    ///
    /// # Errors
    /// - [`CaptureError::AlreadyStarted`] if a session is active
    /// - [`CaptureError::ThreadSpawn`] if the sender thread cannot be spawned
    /// - [`CaptureError::TracerStart`] if the tracer fails to start; the
    ///   partially created session is torn down first
    pub fn start(&mut self, options: CaptureOptions) -> Result<(), CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let buffer = Arc::new(EventBuffer::new(options.send_event_count_threshold));
        let ingestion =
            Arc::new(CaptureIngestion::new(Arc::clone(&buffer), Arc::clone(&self.demangler)));
        let listener: Arc<dyn TracerListener> = ingestion.clone();

        let gpu_source: Arc<dyn GpuSubmissionSource> = match &self.gpu_source {
            Some(source) => Arc::clone(source),
            None => Arc::new(ExchangeFile::new(&options.gpu_exchange_file)),
        };
        let sender = sender::spawn(
            Arc::clone(&buffer),
            Arc::clone(&self.consumer),
            gpu_source,
            options.send_interval,
        )
        .map_err(CaptureError::ThreadSpawn)?;

        let introspection_listener =
            options.enable_introspection.then(|| install_introspection(ListenerHandle::new(&listener)));

        let mut tracer = self.factory.create(&options, ListenerHandle::new(&listener));
        drop(listener);
        if let Err(e) = tracer.start() {
            if let Some(id) = introspection_listener {
                introspection::remove_listener(id);
            }
            drop(ingestion);
            buffer.mark_stopped();
            if sender.join().is_err() {
                warn!("Sender thread panicked while tearing down a failed start");
            }
            return Err(CaptureError::TracerStart(e));
        }

        info!(
            "Capture session started (send interval {:?}, threshold {}, introspection {})",
            options.send_interval,
            buffer.high_water_mark(),
            options.enable_introspection
        );
        self.session =
            Some(Session { tracer, ingestion, buffer, sender, introspection_listener });
        Ok(())
    }

    /// Stop the active session, returning once every event was dispatched
    ///
    /// # Errors
    /// - [`CaptureError::NotStarted`] if no session is active
    /// - [`CaptureError::SenderThreadPanicked`] if the final drain was lost
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        let Session { mut tracer, ingestion, buffer, sender, introspection_listener } =
            self.session.take().ok_or(CaptureError::NotStarted)?;

        tracer.stop();

        if let Some(id) = introspection_listener {
            if !introspection::remove_listener(id) {
                warn!("Introspection listener was replaced during the session");
            }
        }
        ingestion.log_summary();
        // Last strong reference: every ListenerHandle of this session is now revoked
        drop(ingestion);

        buffer.mark_stopped();
        sender.join().map_err(|_| CaptureError::SenderThreadPanicked)?;
        info!("Capture session stopped");
        Ok(())
    }
}

impl Drop for CaptureHandler {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.stop() {
                warn!("Failed to stop capture session on drop: {e}");
            }
        }
    }
}

fn install_introspection(handle: ListenerHandle) -> ListenerId {
    let pid = current_pid();
    introspection::install_listener(move |scope: &Scope| {
        handle.on_introspection_scope(IntrospectionScope {
            pid,
            tid: scope.tid,
            begin_timestamp_ns: scope.begin_ns,
            end_timestamp_ns: scope.end_ns,
            depth: scope.depth,
            registers: scope.registers.to_vec(),
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::StatsConsumer;
    use perf_capture_common::{EventKind, ThreadName};
    use std::sync::Mutex;

    struct NoGpu;

    impl GpuSubmissionSource for NoGpu {
        fn take_submissions(&self) -> Vec<perf_capture_common::GpuQueueSubmission> {
            Vec::new()
        }
    }

    /// Emits one thread name from `start`, then stays quiet
    struct OneShotTracer {
        listener: ListenerHandle,
        fail: bool,
    }

    impl Tracer for OneShotTracer {
        fn start(&mut self) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("no permission to open perf events");
            }
            self.listener.on_thread_name(ThreadName { tid: 5, name: "main".into(), ..Default::default() });
            Ok(())
        }

        fn stop(&mut self) {}
    }

    struct OneShotFactory {
        fail: bool,
        handles: Arc<Mutex<Vec<ListenerHandle>>>,
    }

    impl TracerFactory for OneShotFactory {
        fn create(&self, _: &CaptureOptions, listener: ListenerHandle) -> Box<dyn Tracer> {
            self.handles.lock().unwrap().push(listener.clone());
            Box::new(OneShotTracer { listener, fail: self.fail })
        }
    }

    fn handler(fail: bool) -> (CaptureHandler, Arc<StatsConsumer>, Arc<Mutex<Vec<ListenerHandle>>>) {
        let stats = Arc::new(StatsConsumer::new());
        let handles = Arc::new(Mutex::new(Vec::new()));
        let factory = OneShotFactory { fail, handles: Arc::clone(&handles) };
        let handler = CaptureHandler::new(factory, stats.clone()).with_gpu_source(Arc::new(NoGpu));
        (handler, stats, handles)
    }

    #[test]
    fn test_start_stop_delivers_events() {
        let (mut handler, stats, handles) = handler(false);
        handler.start(CaptureOptions::default()).unwrap();
        assert!(handler.is_active());
        handler.stop().unwrap();
        assert!(!handler.is_active());

        assert_eq!(stats.stats().count(EventKind::ThreadName), 1);
        assert!(handles.lock().unwrap().iter().all(ListenerHandle::is_revoked));
    }

    #[test]
    fn test_misuse_is_reported() {
        let (mut handler, _stats, _handles) = handler(false);
        assert!(matches!(handler.stop(), Err(CaptureError::NotStarted)));

        handler.start(CaptureOptions::default()).unwrap();
        assert!(matches!(
            handler.start(CaptureOptions::default()),
            Err(CaptureError::AlreadyStarted)
        ));
        assert!(handler.is_active());
        handler.stop().unwrap();
    }

    #[test]
    fn test_tracer_start_failure_tears_down_session() {
        let (mut handler, stats, handles) = handler(true);
        let err = handler.start(CaptureOptions::default()).unwrap_err();
        assert!(matches!(err, CaptureError::TracerStart(_)));
        assert!(err.to_string().contains("no permission"));
        assert!(!handler.is_active());
        assert!(handles.lock().unwrap()[0].is_revoked());
        assert_eq!(stats.stats().events, 0);
    }

    #[test]
    fn test_sessions_can_be_restarted() {
        let (mut handler, stats, _handles) = handler(false);
        for _ in 0..3 {
            handler.start(CaptureOptions::default()).unwrap();
            handler.stop().unwrap();
        }
        // Caches are per session: the thread name arrives once per session
        assert_eq!(stats.stats().count(EventKind::ThreadName), 3);
    }

    #[test]
    fn test_drop_stops_active_session() {
        let (mut handler, stats, handles) = handler(false);
        handler.start(CaptureOptions::default()).unwrap();
        drop(handler);
        assert_eq!(stats.stats().events, 1);
        assert!(handles.lock().unwrap()[0].is_revoked());
    }
}
