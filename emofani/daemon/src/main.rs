//! Emofani Daemon - UDP-Controlled Face Runtime
//!
//! Runs the face control core headless: listens for UDP commands, ticks the
//! expression state machine at a fixed rate and answers every command with a
//! status packet. A renderer can be attached through the JSON readout.
//!
//! # Usage
//!
//! ```bash
//! # Serve on the default port (11000)
//! emofani-daemon
//!
//! # Custom port and config file, mirrored display
//! emofani-daemon serve --port 12000 --config ./emofani.toml --mirror-gaze
//!
//! # Print the smoothed face state as JSON lines
//! emofani-daemon serve --json-readout
//!
//! # Send one command to a running face and print the reply
//! emofani-daemon send expression=happy%50
//! emofani-daemon send gazex=-20 --host 192.168.1.10 --reply-port 11001
//!
//! # Verbose logging
//! RUST_LOG=debug emofani-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown (listener stopped, port released)

mod client;
mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use emofani_core::{load_config_from_path, ConfigOverrides, OutboundStatus};

use server::FaceServer;

/// Emofani Daemon - drive an animated face over UDP
#[derive(Parser, Debug)]
#[command(name = "emofani-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short = 'l',
        long,
        env = "EMOFANI_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the face (default)
    Serve(ServeArgs),
    /// Send one command to a running face and print its reply
    Send(SendArgs),
}

impl Default for Command {
    fn default() -> Self {
        Self::Serve(ServeArgs::default())
    }
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// UDP port to receive commands on
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "EMOFANI_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mirror horizontal gaze (for mirrored displays); `--mirror-gaze=false`
    /// overrides a config file that turns it on
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    mirror_gaze: Option<bool>,

    /// Ticks per second
    #[arg(long, value_name = "HZ")]
    tick_hz: Option<u32>,

    /// Print the face readout as JSON lines on stdout
    #[arg(long)]
    json_readout: bool,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Parameter assignment, e.g. `arousal=40` or `expression=sad%80`
    #[arg(value_name = "KEY=VALUE")]
    assignment: String,

    /// Host the face listens on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port the face listens on
    #[arg(short = 'p', long, default_value_t = emofani_core::config::DEFAULT_RECEIVE_PORT)]
    port: u16,

    /// Host the face should reply to
    #[arg(long, default_value = "127.0.0.1")]
    reply_host: String,

    /// Local port to receive the reply on (0 picks a free port)
    #[arg(long, default_value_t = emofani_core::config::DEFAULT_FALLBACK_PORT)]
    reply_port: u16,

    /// Message timestamp (defaults to the current time in milliseconds)
    #[arg(short = 't', long)]
    timestamp: Option<i64>,

    /// How long to wait for the reply
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    timeout_ms: u64,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("emofani_daemon={level},emofani_core={level}"))
    });

    // Logs go to stderr so stdout stays free for readouts and replies
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(args: ServeArgs) -> Result<()> {
    info!("Emofani daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.or_else(emofani_core::default_config_path);
    let mut config = load_config_from_path(config_path)?;

    let mut overrides = ConfigOverrides::new();
    if let Some(port) = args.port {
        overrides = overrides.with_receive_port(port);
    }
    if let Some(mirror) = args.mirror_gaze {
        overrides = overrides.with_mirror_gaze(mirror);
    }
    if let Some(hz) = args.tick_hz {
        overrides = overrides.with_tick_hz(hz);
    }
    overrides.apply(&mut config)?;

    info!(
        port = config.receive_port,
        fallback = %format!("{}:{}", config.fallback_host, config.fallback_port),
        tick_hz = config.tick_hz,
        source = %config.source(),
        "Configuration loaded"
    );

    let result = FaceServer::new(config, args.json_readout).run().await;

    match result {
        Ok(()) => {
            info!("Emofani daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command.unwrap_or_default() {
        Command::Serve(args) => serve(args).await,
        Command::Send(args) => {
            let status = client::send(&args).await?;
            println!("{status}");
            match status {
                OutboundStatus::Ok(_) => Ok(()),
                OutboundStatus::Error(message) => {
                    anyhow::bail!("Face rejected the command: {message}")
                }
            }
        }
    }
}
