//! # perf-capture - Main Entry Point
//!
//! Runs one capture session against the synthetic tracer, then prints the
//! dispatch statistics. With `--export FILE` every dispatched event is also
//! written to FILE as JSON lines.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use perf_capture::capture::CaptureHandler;
use perf_capture::cli::Args;
use perf_capture::consumer::{display_statistics, CaptureEventConsumer, StatsConsumer};
use perf_capture::export::JsonLinesConsumer;
use perf_capture::tracer::SyntheticTracerFactory;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;
    let options = args.capture_options()?;

    if !quiet {
        println!("perf-capture v{}", env!("CARGO_PKG_VERSION"));
        println!("producers: {} at {} events/s", args.producers, args.rate);
        println!("exchange file: {}", options.gpu_exchange_file.display());
    }

    let exporter = args
        .export
        .as_ref()
        .map(|path| {
            JsonLinesConsumer::create(path)
                .map(Arc::new)
                .with_context(|| format!("Failed to create export file {}", path.display()))
        })
        .transpose()?;

    let stats = Arc::new(match &exporter {
        Some(exporter) => {
            let inner: Arc<dyn CaptureEventConsumer> = exporter.clone();
            StatsConsumer::forwarding_to(inner)
        }
        None => StatsConsumer::new(),
    });

    let factory = SyntheticTracerFactory::new(args.producers, args.rate);
    let emitted = factory.emitted_counter();
    let mut handler = CaptureHandler::new(factory, stats.clone());

    handler.start(options).context("Failed to start capture session")?;
    let started = Instant::now();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let exit_reason = match args.duration_limit() {
        Some(limit) => tokio::select! {
            () = tokio::time::sleep(limit) => "duration limit reached",
            _ = &mut ctrl_c => "interrupted",
        },
        None => {
            ctrl_c.await.context("Failed to listen for Ctrl-C")?;
            "interrupted"
        }
    };

    handler.stop().context("Failed to stop capture session")?;
    info!("Capture session ended: {exit_reason}");

    let summary = stats.stats();
    if !quiet {
        eprintln!(
            "\n{}: {:.1}s, {} events produced, {} dispatched",
            exit_reason,
            started.elapsed().as_secs_f64(),
            emitted.load(Ordering::Relaxed),
            summary.events
        );
        display_statistics(&summary);
    }

    if let (Some(exporter), Some(path)) = (exporter, args.export.as_ref()) {
        exporter.flush().context("Failed to flush export file")?;
        if !quiet {
            println!("saved: {}", path.display());
        }
    }

    Ok(())
}
