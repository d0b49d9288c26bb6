//! tap-client — entry point.
//!
//! ```text
//! tap-client                      Connect with defaults
//! tap-client --config <path>      Use custom config TOML
//! tap-client --server <url>       Override the server URL
//! tap-client --gen-config        Dump default config and exit
//! ```
//!
//! Headless harness around `tap-core`: authenticates, opens the
//! session channel pair, decodes frames into the viewport, and logs
//! throughput until interrupted. Touch surfaces embed the library
//! directly; this binary exercises the same wiring end to end.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tap_core::auth::{AuthClient, TokenStore};
use tap_core::protocol::{InputCommand, StreamControl};
use tap_core::session::{SessionEvent, SessionManager, WsConnector};
use tap_core::viewport::{Camera, FrameViewport};

use config::{ClientConfig, TokenFile};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tap-client", about = "Touch remote desktop client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tap-client.toml")]
    config: PathBuf,

    /// Server URL (overrides config). Example: http://192.168.1.20:8443
    #[arg(short, long)]
    server: Option<String>,

    /// Password for non-interactive login (otherwise prompted).
    #[arg(short, long)]
    password: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(url) = cli.server {
        config.server.url = url;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("tap-client v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Authenticate ─────────────────────────────────────────

    let auth = AuthClient::new(config.http_base());
    let store = TokenFile::new(&config.server.token_file);
    let token = authenticate(&auth, &store, cli.password).await?;

    if let Some(token) = &token {
        match auth.system_info(token).await {
            Ok(sys) => info!(
                "remote: {} ({}), {} monitor(s), up {}",
                sys.hostname,
                sys.os,
                sys.monitors.len(),
                sys.uptime
            ),
            Err(e) => warn!("system info unavailable: {e}"),
        }
    }

    // ── 2. Wire the core ────────────────────────────────────────

    let camera = Arc::new(std::sync::Mutex::new(Camera::new()));
    let viewport = FrameViewport::new(Arc::clone(&camera));
    let mut stats_rx = viewport.stats_receiver();

    let options = config.connect_options(token);
    let (session, mut events) = SessionManager::new(options, Arc::new(WsConnector));
    session.connect();

    // ── 3. Event loop ───────────────────────────────────────────

    let mut stats_tick = tokio::time::interval(Duration::from_secs(5));
    stats_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = stats_tick.tick() => {
                let stats = stats_rx.borrow_and_update().clone();
                if stats.total_frames > 0 {
                    info!(
                        fps = stats.fps,
                        frames = stats.total_frames,
                        dropped = stats.dropped_frames,
                        "{}x{}", stats.width, stats.height
                    );
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::Connecting { attempt } => {
                        info!(attempt, "connecting");
                    }
                    SessionEvent::Connected => {
                        info!("connected");
                        // Push the configured tuning to the server.
                        session.send_command(&InputCommand::SetSensitivity {
                            value: config.input.sensitivity,
                        });
                        if config.stream.monitor != 0 {
                            session.send_stream_control(&StreamControl::SetMonitor {
                                monitor: config.stream.monitor,
                            });
                        }
                    }
                    SessionEvent::Frame(bytes) => {
                        viewport.apply_frame(bytes);
                    }
                    SessionEvent::CommandText(text) => {
                        info!("server message: {text}");
                    }
                    SessionEvent::Latency(ms) => {
                        tracing::debug!("latency ~{ms:.0} ms (frame spacing)");
                    }
                    SessionEvent::Disconnected { retry_in: Some(delay) } => {
                        warn!("disconnected, retrying in {delay:?}");
                    }
                    SessionEvent::Disconnected { retry_in: None } => {}
                    SessionEvent::AuthRejected => {
                        error!("server rejected the stored token; log in again");
                        store.clear();
                        break;
                    }
                    SessionEvent::GaveUp => {
                        error!("connection lost");
                        break;
                    }
                }
            }
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    session.disconnect();
    Ok(())
}

// ── Auth bootstrap ───────────────────────────────────────────────

/// Restore the persisted token, or walk the setup/login exchange
/// with a password prompt. Returns `None` against a server with no
/// password configured and none desired.
async fn authenticate(
    auth: &AuthClient,
    store: &TokenFile,
    password: Option<String>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let stored = store.load();
    let status = auth.status(stored.as_deref()).await?;

    if status.authenticated {
        info!("using stored token");
        return Ok(stored);
    }

    if status.setup_required {
        info!("first run: no password configured on the server");
        let password = match password {
            Some(p) => p,
            None => rpassword::prompt_password("Choose a password: ")?,
        };
        auth.setup(&password).await?;
        let token = auth.login(&password).await?;
        store.store(&token);
        return Ok(Some(token));
    }

    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };
    let token = auth.login(&password).await?;
    store.store(&token);
    Ok(Some(token))
}
