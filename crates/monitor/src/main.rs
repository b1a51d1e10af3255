//! `plotty-monitor` -- job status for a plotty workspace.
//!
//! Prints a single snapshot by default, keeps polling with
//! `PLOTTY_FOLLOW=true`, or follows pushed updates from the status
//! service with `PLOTTY_LIVE=true`. See [`MonitorConfig::from_env`] for
//! every variable.

use std::io::Write;
use std::sync::{Arc, Mutex};

use plotty_core::{PlotError, PlotResult};
use plotty_live::LiveClient;
use plotty_monitor::{LiveView, Monitor, MonitorConfig};
use plotty_store::{JobStore, Workspace};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "plotty_monitor=info,plotty_live=info,plotty_store=info";

/// ANSI "clear screen, cursor home".
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("✗ Error: {e}");
        eprintln!("  {}", e.recovery_hint());
        std::process::exit(1);
    }
}

async fn run() -> PlotResult<()> {
    let config = MonitorConfig::from_env()?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, stopping");
            on_signal.cancel();
        }
    });

    if config.live {
        return run_live(&config, cancel).await;
    }

    let workspace = Workspace::discover(config.workspace.as_deref())?;
    tracing::info!(
        workspace = %workspace.root().display(),
        follow = config.follow,
        interval_ms = config.poll_interval.as_millis() as u64,
        "Starting plotty-monitor",
    );

    let mut monitor = Monitor::new(JobStore::new(workspace), std::io::stdout())
        .with_poll_interval(config.poll_interval)
        .with_clear_screen(config.clear_screen);

    if config.follow {
        monitor.start_monitoring(cancel).await
    } else {
        monitor.static_snapshot().map(|_| ())
    }
}

/// Render pushed updates until the server closes the socket or Ctrl-C.
async fn run_live(config: &MonitorConfig, cancel: CancellationToken) -> PlotResult<()> {
    let view = Arc::new(Mutex::new(LiveView::new()));
    let mut client = LiveClient::new(config.ws_host.clone(), config.ws_port);

    let errors = Arc::clone(&view);
    client.on_error(move |e| {
        if let Ok(mut view) = errors.lock() {
            view.record_error(e.to_string());
        }
    });

    let clear = config.clear_screen;
    let frames = Arc::clone(&view);
    client.on_message(move |msg| {
        let Ok(mut view) = frames.lock() else {
            return;
        };
        view.apply(msg);
        draw(&view, clear);
    });

    if !client.connect().await {
        return Err(PlotError::connection(format!(
            "Could not connect to the status service at {}",
            client.url()
        )));
    }
    if let Ok(mut view) = view.lock() {
        view.set_connected(true);
        draw(&view, clear);
    }

    client.subscribe(&["all"]).await?;

    tokio::select! {
        result = client.listen() => result?,
        _ = cancel.cancelled() => {}
    }
    client.disconnect().await;

    if let Ok(mut view) = view.lock() {
        view.set_connected(false);
        draw(&view, clear);
    }
    println!("\n\n👋 Monitor stopped by user");
    Ok(())
}

fn draw(view: &LiveView, clear: bool) {
    let mut out = std::io::stdout().lock();
    let prefix = if clear { CLEAR_SCREEN } else { "" };
    let _ = writeln!(out, "{prefix}{}", view.render());
    let _ = out.flush();
}
