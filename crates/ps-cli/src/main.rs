//! CLI entry point for the pos-scan barcode decoder.
//!
//! This binary turns a terminal keyboard into a keyboard-wedge scanner
//! test bench: it decodes scanner bursts from live key presses, or from a
//! scripted key sequence replayed on a virtual clock.
//!
//! # Usage
//!
//! ```bash
//! pos-scan [OPTIONS] <COMMAND>
//!
//! # Decode live key presses until Escape is pressed
//! pos-scan listen
//!
//! # Replay a scripted scan and print the counters
//! pos-scan replay --stats text:4006381333931 Enter
//!
//! # A pause longer than the idle timeout discards the partial scan
//! pos-scan --idle-timeout-ms 200 replay text:1234 +500 text:5678 Enter
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod keys;
mod replay;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures_util::StreamExt;
use ps_core::Config;
use ps_decoder::{attach, DecodeStats, KeyBus, KeySource, Scheduler, TokioScheduler};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::replay::ReplayEvent;

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Decodes keyboard-wedge barcode scanner input.
///
/// Scanners type their payload as a fast burst of keys ending in Enter.
/// Bursts of a valid length are printed as barcodes; anything else is
/// discarded.
#[derive(Parser)]
#[command(name = "pos-scan", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "POS_SCAN_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Milliseconds of inactivity after which a partial scan is discarded.
    #[arg(long, global = true, env = "POS_SCAN_IDLE_TIMEOUT_MS")]
    idle_timeout_ms: Option<u64>,

    /// Accept only digit keys into the scan buffer.
    #[arg(long, global = true)]
    digits_only: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Decode live key presses from the terminal.
    Listen,

    /// Decode a scripted key sequence on a virtual clock.
    ///
    /// Tokens: `+<ms>` waits, `text:<chars>` types each character, and
    /// anything else is one key name such as `Enter` or `Shift`.
    Replay {
        /// Script tokens.
        #[arg(required = true, allow_hyphen_values = true)]
        keys: Vec<String>,

        /// Virtual milliseconds between consecutive key presses.
        #[arg(long, default_value_t = 0)]
        key_interval_ms: u64,

        /// Print the decoder counters as JSON when done.
        #[arg(long)]
        stats: bool,
    },
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects `RUST_LOG` if set. Otherwise uses `debug` with `--verbose`
/// and `info` by default. Logs go to stderr so stdout carries only
/// barcodes.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the optional config file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the merged
/// configuration is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            Config::load(path).map_err(|e| eyre!("Failed to load config {path}: {e}"))?
        }
        None => Config::default(),
    };

    if let Some(ms) = cli.idle_timeout_ms {
        config.decoder.idle_timeout_ms = ms;
    }
    if cli.digits_only {
        config.decoder.digits_only = true;
    }

    config.validate()?;
    debug!(?config, "Configuration resolved");
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Puts the terminal in raw mode until dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> color_eyre::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best effort: nothing useful can be done if the terminal refuses.
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Decodes live key presses until the quit key, Ctrl+C, or SIGTERM.
///
/// # Errors
///
/// Returns an error if the terminal cannot be put in raw mode or the
/// event stream fails.
async fn run_listen(config: &Config) -> color_eyre::Result<()> {
    info!(
        quit_key = %config.cli.quit_key,
        idle_timeout_ms = config.decoder.idle_timeout_ms,
        "Listening for scans"
    );

    let bus = Arc::new(KeyBus::new());
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current()?);

    // Raw mode turns off output post-processing, so lines end in "\r\n".
    let handle = attach(
        Arc::clone(&bus) as Arc<dyn KeySource>,
        scheduler,
        config.decoder.clone(),
        |barcode| {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let _ = write!(out, "{barcode}\r\n");
            let _ = out.flush();
        },
        Some(Box::new(|| {
            let _ = write!(std::io::stderr().lock(), "invalid scan\r\n");
        })),
    )?;

    {
        let _raw = RawModeGuard::enable()?;

        // Handle SIGTERM for graceful shutdown on Unix
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;

            tokio::select! {
                result = read_keys(&bus, &config.cli.quit_key) => result?,
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        read_keys(&bus, &config.cli.quit_key).await?;
    }

    let stats = handle.decoder().stats();
    handle.detach();
    log_stats(&stats);
    Ok(())
}

/// Forwards terminal key presses to `bus` until a quit key arrives.
async fn read_keys(bus: &KeyBus, quit_key: &str) -> color_eyre::Result<()> {
    let mut events = EventStream::new();

    while let Some(event) = events.next().await {
        let Event::Key(key) = event? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if keys::is_interrupt(&key) {
            info!("Received Ctrl+C, shutting down");
            break;
        }

        let input = keys::key_input(&key);
        if input.key() == quit_key {
            info!(key = %input, "Quit key pressed");
            break;
        }
        bus.publish(&input);
    }

    Ok(())
}

/// Replays a scripted key sequence and prints what was decoded.
///
/// # Errors
///
/// Returns an error if the script is malformed or output fails.
fn run_replay(
    config: &Config,
    keys: &[String],
    key_interval_ms: u64,
    show_stats: bool,
) -> color_eyre::Result<()> {
    let steps = replay::parse_script(keys)?;
    info!(steps = steps.len(), "Replaying key script");

    let report = replay::run(
        &config.decoder,
        &steps,
        Duration::from_millis(key_interval_ms),
    )?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in &report.events {
        match event {
            ReplayEvent::Decoded(barcode) => writeln!(out, "{barcode}")?,
            ReplayEvent::Invalid => writeln!(std::io::stderr().lock(), "invalid scan")?,
        }
    }

    if show_stats {
        writeln!(out, "{}", serde_json::to_string_pretty(&report.stats)?)?;
    }

    log_stats(&report.stats);
    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn log_stats(stats: &DecodeStats) {
    info!(
        decoded = stats.decoded,
        invalid = stats.invalid,
        ignored = stats.ignored,
        timeouts = stats.timeouts,
        success_percent = format_args!("{:.1}", stats.success_percent()),
        "Decoder finished"
    );
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Resolve configuration
    let config = build_config(&cli)?;

    // 5. Route to appropriate command
    match &cli.command {
        Commands::Listen => run_listen(&config).await,
        Commands::Replay {
            keys,
            key_interval_ms,
            stats,
        } => run_replay(&config, keys, *key_interval_ms, *stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay_args() {
        let cli = Cli::parse_from([
            "pos-scan",
            "--idle-timeout-ms",
            "250",
            "replay",
            "--stats",
            "text:12345678",
            "Enter",
        ]);
        assert_eq!(cli.idle_timeout_ms, Some(250));
        match cli.command {
            Commands::Replay { keys, stats, .. } => {
                assert_eq!(keys, vec!["text:12345678", "Enter"]);
                assert!(stats);
            }
            Commands::Listen => panic!("expected replay"),
        }
    }

    #[test]
    fn test_build_config_applies_overrides() {
        let cli = Cli::parse_from([
            "pos-scan",
            "--digits-only",
            "--idle-timeout-ms",
            "300",
            "listen",
        ]);
        let config = build_config(&cli).unwrap();
        assert!(config.decoder.digits_only);
        assert_eq!(config.decoder.idle_timeout_ms, 300);
    }

    #[test]
    fn test_build_config_rejects_zero_timeout() {
        let cli = Cli::parse_from(["pos-scan", "--idle-timeout-ms", "0", "listen"]);
        assert!(build_config(&cli).is_err());
    }
}
