//! keytapd: keyboard interception daemon
//!
//! Installs a system-wide event tap and the configured global hotkeys, and
//! reports every consumed key and hotkey press on stdout as JSON lines.
//!
//! - A binding with action `activate` turns the tap on
//! - `escape` while the tap is on turns it off
//!
//! The main thread runs the CFRunLoop; tokio runs everything else.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn init_logging(default_level: Option<&str>) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level.unwrap_or("info"))),
        )
        .init();
}

#[cfg(target_os = "macos")]
fn main() -> Result<()> {
    use keytap::config::Config;

    let config = Config::load();
    init_logging(
        config
            .as_ref()
            .ok()
            .and_then(|config| config.log_level.as_deref()),
    );
    daemon::run(config?)
}

#[cfg(not(target_os = "macos"))]
fn main() -> Result<()> {
    init_logging(None);
    tracing::error!("keytapd only runs on macOS");
    anyhow::bail!("unsupported platform: {}", std::env::consts::OS)
}

#[cfg(target_os = "macos")]
mod daemon {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};

    use keytap::config::Config;
    use keytap::events::KeyEvent;
    use keytap::lifecycle::ShutdownSignal;
    use keytap::platform::macos::dispatch::{run_main_loop, stop_main_loop};
    use keytap::tap::ESCAPE_SYMBOL;
    use keytap::{Engine, EventTap, Platform};

    /// Binding action that turns the tap on
    const ACTIVATE: &str = "activate";

    pub fn run(config: Config) -> Result<()> {
        info!(version = env!("CARGO_PKG_VERSION"), "keytapd starting");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("keytap-worker")
            .build()
            .context("failed to start tokio runtime")?;

        let engine = Engine::init(
            Platform::native(),
            runtime.handle().clone(),
            config.engine_settings(),
        );

        // Callbacks run on the tap thread and the main thread; never block them
        let (event_tx, event_rx) = mpsc::channel::<KeyEvent>(256);

        for (hotkey, action) in &config.bindings {
            let tx = event_tx.clone();
            let event = KeyEvent::Hotkey {
                action: action.clone(),
                hotkey: hotkey.clone(),
            };
            match engine.hotkeys().bind(hotkey, move || {
                if tx.try_send(event.clone()).is_err() {
                    warn!("event queue full, dropping hotkey press");
                }
            }) {
                Ok(id) => info!(%hotkey, %action, %id, "bound hotkey"),
                Err(e) => warn!(%hotkey, %action, "skipping binding: {}", e),
            }
        }

        let tx = event_tx.clone();
        let tap = engine
            .create_event_tap(move |symbol| {
                if tx.try_send(KeyEvent::symbol(symbol)).is_err() {
                    warn!("event queue full, dropping key");
                }
            })
            .context("failed to install event tap; grant Accessibility permission to keytapd")?;
        let tap = Arc::new(tap);
        tap.set_hotkeys(&config.pass_through_hotkeys());
        drop(event_tx);

        runtime.spawn(report_events(event_rx, Arc::clone(&tap)));
        runtime.spawn(async {
            let shutdown = ShutdownSignal::new();
            match shutdown.wait().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!("failed to listen for signals: {}", e),
            }
            stop_main_loop();
        });

        info!("daemon initialized, entering main loop");
        run_main_loop();

        info!("shutting down...");
        tap.destroy();
        engine.shutdown();
        runtime.shutdown_timeout(Duration::from_secs(1));
        info!("keytapd stopped");

        Ok(())
    }

    /// Print events and drive the tap from them
    async fn report_events(mut events: mpsc::Receiver<KeyEvent>, tap: Arc<EventTap>) {
        while let Some(event) = events.recv().await {
            let mut follow_up = None;
            match &event {
                KeyEvent::Hotkey { action, .. } if action == ACTIVATE && !tap.is_enabled() => {
                    tap.enable();
                    follow_up = Some(KeyEvent::TapEnabled);
                }
                KeyEvent::Symbol { symbol } if symbol == ESCAPE_SYMBOL => {
                    tap.disable();
                    follow_up = Some(KeyEvent::TapDisabled);
                }
                _ => {}
            }

            for event in std::iter::once(event).chain(follow_up) {
                match event.to_json_line() {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!(%event, "failed to serialize event: {}", e),
                }
            }
        }
    }
}
