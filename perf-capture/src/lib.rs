//! # perf-capture - Event Collection Core of a Sampling/Tracing Profiler
//!
//! perf-capture sits between an OS-level tracer (perf events, eBPF,
//! uprobes) and the transport that streams a capture to a client. It accepts
//! decoded events from many producer threads at once, deduplicates their
//! large payloads through interning, and dispatches them downstream in
//! batches from a single sender thread.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    OS-level Tracer (external)                   │
//! │  • perf_event sampling, sched tracepoints, uprobes, GPU jobs    │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ TracerListener calls (many threads)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     perf-capture (This Crate)                   │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Ingestion   │──▶│ Event Buffer │──▶│    Sender    │         │
//! │  │ (per kind)   │   │ (mutex+cvar) │   │   Thread     │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │         │                                     │                 │
//! │         ▼                                     │ on stop         │
//! │  ┌──────────────┐                      ┌──────▼───────┐         │
//! │  │  Interning   │                      │  GPU Splice  │         │
//! │  │ Caches+Filter│                      │ (exchange f.)│         │
//! │  └──────────────┘                      └──────────────┘         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ Vec<CaptureEvent> batches
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          CaptureEventConsumer (transport, export, stats)        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`capture`]: session lifecycle, ingestion, event buffer, sender thread
//!   - `handler`: start/stop of a capture session
//!   - `ingestion`: per-kind handlers rewriting payloads to interning keys
//!   - `buffer`: pending events plus session state under one lock
//!   - `splice`: GPU exchange file appended to the final batch
//!
//! - [`interning`]: fingerprints, intern caches and the address dedup filter
//!
//! - [`tracer`]: control surface of the external tracer, plus a synthetic
//!   tracer for load testing
//!
//! - [`consumer`]: downstream consumers (channel, statistics)
//!
//! - [`export`]: JSON-lines export of every dispatched event
//!
//! ### Support Modules
//!
//! - [`introspection`]: self-instrumentation scopes
//! - [`demangle`]: demangling of resolved function names
//! - [`config`]: capture session options
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: core domain types (Key, Address) and error types
//! - [`os_utils`]: monotonic clock and thread ids
//!
//! ## Ordering Guarantees
//!
//! - Events from one producer thread are dispatched in the order submitted
//! - Every `Interned*` definition is dispatched before any event using its key
//! - Nothing submitted before stop is lost; nothing is dispatched after it
//!
//! ## Typical Usage
//!
//! ```bash
//! # Run a 5 second session against the synthetic tracer
//! ./perf-capture --duration 5
//!
//! # Export every dispatched event for offline analysis
//! ./perf-capture --export events.jsonl --introspection
//! ```
//!
//! ## Key Concepts
//!
//! - **Interning**: a repeated payload is sent once as `Interned*`, then by key
//! - **Fingerprint**: 64-bit content hash used as the interning key
//! - **High-water mark**: pending-event count that wakes the sender early
//! - **Splice**: external GPU records appended to the last batch on stop

// Expose modules for testing
pub mod capture;
pub mod cli;
pub mod config;
pub mod consumer;
pub mod demangle;
pub mod domain;
pub mod export;
pub mod interning;
pub mod introspection;
pub mod os_utils;
pub mod tracer;
