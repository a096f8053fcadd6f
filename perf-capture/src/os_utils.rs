//! Process, thread and clock helpers
//!
//! Timestamps use `CLOCK_MONOTONIC`, the clock the kernel tracer stamps its
//! events with, so self-instrumentation lines up with traced events.

#![allow(unsafe_code)] // clock_gettime() and gettid() require unsafe

/// Current `CLOCK_MONOTONIC` time in nanoseconds
#[allow(clippy::cast_sign_loss)]
pub fn monotonic_timestamp_ns() -> u64 {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: `ts` is a valid, writable timespec; CLOCK_MONOTONIC always exists on Linux
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Kernel thread ID of the calling thread
#[allow(clippy::cast_possible_truncation)]
pub fn current_tid() -> i32 {
    // SAFETY: gettid takes no arguments and cannot fail
    unsafe { libc::syscall(libc::SYS_gettid) as i32 }
}

/// Process ID of the calling process
#[allow(clippy::cast_possible_wrap)]
pub fn current_pid() -> i32 {
    std::process::id() as i32
}
