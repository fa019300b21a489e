use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mirrorface_core::events::{Event, EventSink};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod sink;

use config::Settings;
use engine::Engine;
use sink::LineSink;

#[derive(Parser)]
#[command(name = "mirrorfaced", version)]
#[command(about = "Continuous face identification with login/logout events on stdout")]
struct Cli {
    /// Startup configuration as a single JSON object
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries only the JSON event stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let sink: Arc<dyn EventSink> = Arc::new(LineSink::stdout());

    // The host must always receive a diagnosable message, never a silent
    // crash: every error path funnels into one final status event.
    if let Err(err) = run(sink.clone()).await {
        sink.emit(&Event::status(format!("Unhandled error: {err:#}")));
        std::process::exit(1);
    }
}

async fn run(sink: Arc<dyn EventSink>) -> Result<()> {
    let cli = Cli::parse();

    sink.emit(&Event::status("Facial recognition started..."));

    let settings = Settings::from_json(cli.config.as_deref().unwrap_or("{}"), &sink)
        .context("invalid startup configuration")?;
    settings.announce(&sink);

    let stop = Arc::new(AtomicBool::new(false));
    let engine = Engine::start(&settings, sink.clone(), stop.clone())
        .context("startup failed")?;

    let loop_thread = std::thread::Builder::new()
        .name("mirrorface-engine".into())
        .spawn(move || engine.run())
        .context("failed to spawn engine thread")?;
    let mut loop_done = tokio::task::spawn_blocking(move || loop_thread.join());

    // The loop ends either on a shutdown signal or on its own, e.g. after
    // a camera failure.
    let joined = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            sink.emit(&Event::status("Shutdown requested"));
            stop.store(true, Ordering::Relaxed);
            None
        }
        result = &mut loop_done => Some(result),
    };
    let joined = match joined {
        Some(result) => result,
        None => loop_done.await,
    };
    joined
        .context("engine join task failed")?
        .map_err(|_| anyhow::anyhow!("engine thread panicked"))?;

    Ok(())
}
