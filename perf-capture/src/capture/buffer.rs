//! Shared event buffer and session state
//!
//! Both live behind one mutex: the sender's wake-up condition ("enough
//! events or session stopped") is evaluated atomically with every append
//! and with stop.

use std::mem;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use perf_capture_common::CaptureEvent;

use crate::domain::SessionState;

struct BufferState {
    events: Vec<CaptureEvent>,
    session: SessionState,
}

/// Result of one [`EventBuffer::wait_and_drain`]
#[derive(Debug)]
pub enum Drain {
    /// Session still active; more drains will follow
    Pending(Vec<CaptureEvent>),
    /// Session stopped; nothing can be appended after this drain
    Final(Vec<CaptureEvent>),
}

/// Pending events of one session, appended by producers and drained by the
/// sender thread
pub struct EventBuffer {
    state: Mutex<BufferState>,
    wake: Condvar,
    high_water_mark: usize,
}

impl EventBuffer {
    #[must_use]
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            state: Mutex::new(BufferState { events: Vec::new(), session: SessionState::Active }),
            wake: Condvar::new(),
            high_water_mark: high_water_mark.max(1),
        }
    }

    /// Append an event; returns false (dropping it) once the session stopped
    pub fn push(&self, event: CaptureEvent) -> bool {
        let mut state = self.lock();
        if state.session == SessionState::Stopped {
            debug!("Dropping {} event received after the session stopped", event.kind());
            return false;
        }
        state.events.push(event);
        if state.events.len() == self.high_water_mark {
            self.wake.notify_one();
        }
        true
    }

    /// Mark the session stopped and wake the sender for its final drain
    pub fn mark_stopped(&self) {
        let mut state = self.lock();
        state.session = SessionState::Stopped;
        self.wake.notify_all();
    }

    /// Wait up to `timeout` for the high-water mark or stop, then take
    /// everything buffered
    ///
    /// The buffer is swapped out in O(1); producers only wait for the swap.
    pub fn wait_and_drain(&self, timeout: Duration) -> Drain {
        let state = self.lock();
        let (mut state, _) = self
            .wake
            .wait_timeout_while(state, timeout, |state| {
                state.session == SessionState::Active && state.events.len() < self.high_water_mark
            })
            .unwrap_or_else(PoisonError::into_inner);

        let events = mem::take(&mut state.events);
        match state.session {
            SessionState::Active => Drain::Pending(events),
            SessionState::Stopped => Drain::Final(events),
        }
    }

    #[cfg(test)]
    fn session_state(&self) -> SessionState {
        self.lock().session
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
