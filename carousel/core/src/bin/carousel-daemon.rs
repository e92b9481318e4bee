//! Carousel Daemon
//!
//! Headless plugin-host harness for the carousel engine. Speaks the UI
//! protocol as newline-delimited JSON: events arrive on stdin, messages
//! leave on stdout. Logs go to stderr so the protocol stream stays clean.
//!
//! # Usage
//!
//! ```bash
//! # Convert the seeded demo frame, answering the partial-slide prompt:
//! printf '%s\n%s\n%s\n' \
//!   '{"type":"convert-to-carousel","resolution":"square"}' \
//!   '{"type":"partial-slide-response","action":"expand"}' \
//!   '{"type":"cancel"}' | carousel-daemon
//!
//! # With verbose logging
//! RUST_LOG=debug carousel-daemon
//! ```
//!
//! # Environment Variables
//!
//! - `CAROUSEL_DEMO_FRAME`: seeded frame size as `WIDTHxHEIGHT`
//!   (default `3240x1080`; set empty to start with an empty document)
//! - `CAROUSEL_*`: engine tunables, see [`EngineConfig::from_env`]
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)

use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use carousel_core::host::{DocumentHost, MemoryHost, Rect};
use carousel_core::{Engine, EngineConfig, EngineMessage, UiEvent};

/// Seed the in-memory document with one selected frame so commands have
/// something to operate on.
async fn seed_document(host: &MemoryHost) -> anyhow::Result<()> {
    let size = std::env::var("CAROUSEL_DEMO_FRAME").unwrap_or_else(|_| "3240x1080".to_string());
    if size.is_empty() {
        info!("starting with an empty document");
        return Ok(());
    }

    let (width, height) = size
        .split_once('x')
        .and_then(|(w, h)| Some((w.parse::<f64>().ok()?, h.parse::<f64>().ok()?)))
        .ok_or_else(|| anyhow::anyhow!("invalid CAROUSEL_DEMO_FRAME '{size}', expected WxH"))?;

    let frame = host
        .create_frame(None, "Artboard", Rect::new(0.0, 0.0, width, height))
        .await?;
    host.set_selection(std::slice::from_ref(&frame)).await?;
    info!(frame = %frame, width, height, "seeded demo frame");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol; logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carousel_daemon=info".parse()?)
                .add_directive("carousel_core=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting carousel daemon");
    info!("PID: {}", std::process::id());

    let config = match carousel_core::load_config() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config file unusable; using defaults");
            EngineConfig::from_env()
        }
    };

    let host = MemoryHost::new();
    seed_document(&host).await?;

    let (msg_tx, mut msg_rx) = tokio::sync::mpsc::channel::<EngineMessage>(100);
    let mut engine = Engine::new(host, config, msg_tx);

    // Writer task: engine messages out as JSON lines.
    let writer = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to serialize message"),
            }
        }
    });

    info!("Ready; reading events from stdin");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<UiEvent>(line) {
            Ok(event) => {
                if let Err(e) = engine.handle_event(event).await {
                    warn!(error = %e, "failed to handle event");
                }
                if engine.is_shutting_down() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "ignoring malformed event");
            }
        }
    }

    // Dropping the engine closes the message channel once in-flight runs
    // finish, which ends the writer task.
    drop(engine);
    writer.await?;

    info!("Carousel daemon stopped cleanly");
    Ok(())
}
