//! # Self-Instrumentation Scopes
//!
//! Lightweight scopes the profiler records about itself. A [`ScopeGuard`]
//! measures the time between its creation and its drop on the current
//! thread; on drop the finished [`Scope`] is handed to the process-wide
//! listener, if one is installed.
//!
//! A capture session with introspection enabled installs a listener that
//! feeds the scopes back into the capture as `IntrospectionScope` events.
//!
//! ```rust,ignore
//! let _scope = introspection::scope("SenderThread iteration");
//! // ... work measured until `_scope` is dropped
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::interning::fingerprint;
use crate::os_utils::{current_tid, monotonic_timestamp_ns};

/// Number of register slots carried by each scope
pub const SCOPE_REGISTER_COUNT: usize = 6;

type ListenerFn = Box<dyn Fn(&Scope) + Send + Sync>;

static LISTENER: RwLock<Option<(ListenerId, ListenerFn)>> = RwLock::new(None);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// A finished introspection scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub name: &'static str,
    pub tid: i32,
    pub begin_ns: u64,
    pub end_ns: u64,
    /// Nesting depth on the recording thread (0 = outermost)
    pub depth: u32,
    /// Slot 0 holds the string fingerprint of `name`
    pub registers: [u64; SCOPE_REGISTER_COUNT],
}

/// Identifies an installed listener so only its owner can remove it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Records a scope until dropped
///
/// Must be dropped on the thread that created it.
#[must_use = "the scope ends when the guard is dropped"]
pub struct ScopeGuard {
    name: &'static str,
    begin_ns: u64,
    depth: u32,
    _not_send: PhantomData<*const ()>,
}

/// Start a scope on the current thread
pub fn scope(name: &'static str) -> ScopeGuard {
    let depth = DEPTH.with(|depth| {
        let current = depth.get();
        depth.set(current + 1);
        current
    });
    ScopeGuard { name, begin_ns: monotonic_timestamp_ns(), depth, _not_send: PhantomData }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let end_ns = monotonic_timestamp_ns();
        DEPTH.with(|depth| depth.set(self.depth));

        let listener = LISTENER.read().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, notify)) = listener.as_ref() {
            let mut registers = [0; SCOPE_REGISTER_COUNT];
            registers[0] = fingerprint::string_key(self.name).as_raw();
            notify(&Scope {
                name: self.name,
                tid: current_tid(),
                begin_ns: self.begin_ns,
                end_ns,
                depth: self.depth,
                registers,
            });
        }
    }
}

/// Install the process-wide listener, replacing any previous one
pub fn install_listener<F>(listener: F) -> ListenerId
where
    F: Fn(&Scope) + Send + Sync + 'static,
{
    let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
    let mut slot = LISTENER.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        log::warn!("Replacing an installed introspection listener");
    }
    *slot = Some((id, Box::new(listener)));
    id
}

/// Remove the listener installed as `id`; returns false if it was replaced
pub fn remove_listener(id: ListenerId) -> bool {
    let mut slot = LISTENER.write().unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref() {
        Some((installed, _)) if *installed == id => {
            *slot = None;
            true
        }
        _ => false,
    }
}
