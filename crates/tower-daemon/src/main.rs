//! Town clock daemon entry point.
//!
//! Wires configuration, relays, the hand log and the day/night schedule
//! into a [`Tower`], then polls the wall clock and ticks once per minute
//! until a shutdown signal arrives.

mod diagnostics;
mod signals;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_common::config::{RelayConfig, RelayDriver, TowerConfig};
use tower_core::face_time::FaceTime;
use tower_core::tower::{Tower, TowerBuilder};
use tower_relay::{
    GpioLamp, GpioRelay, LampRelay, LoggingLamp, LoggingRelay, RelayPort, SimulatedLamp,
    SimulatedRelay,
};
use tracing::{error, info, warn};

use crate::diagnostics::{DiagnosticsCollector, DiagnosticsState};
use crate::signals::SignalHandler;

/// Ticks between periodic status lines (one per hour).
const STATUS_EVERY_TICKS: u64 = 60;

/// Town clock daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "town-clock",
    about = "Town clock daemon - keeps the tower's hands in step with true time",
    version,
    long_about = None
)]
struct Args {
    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use simulated relays instead of the configured driver.
    #[arg(long, short = 's')]
    simulated: bool,

    /// Maximum minute ticks to process (0 = infinite).
    #[arg(long, default_value = "0")]
    max_ticks: u64,

    /// Current dial reading, "H:MM" for both hands or "H:MM,H:MM" for each.
    #[arg(long, value_name = "H:MM[,H:MM]")]
    set_hands: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting town clock");

    let mut config = load_config(&args)?;
    if args.simulated {
        config.relay.driver = RelayDriver::Simulated;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        timezone = %config.timezone,
        driver = ?config.relay.driver,
        cutoff = config.hands.cutoff,
        "Configuration loaded"
    );

    let running = Arc::new(AtomicBool::new(true));
    let signal_handler =
        SignalHandler::new(Arc::clone(&running)).context("Failed to set up signal handlers")?;

    let diag_state = Arc::new(DiagnosticsState::new());
    let diagnostics = DiagnosticsCollector::new(Arc::clone(&diag_state));

    let mut tower = build_tower(&config, &args, running)?;

    run_daemon(&mut tower, &config, &signal_handler, &diagnostics, args.max_ticks);
    Ok(())
}

/// Initialize logging with the specified log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_logging(level: &str) {
    let filter = format!(
        "town_clock={level},tower_core={level},tower_relay={level},tower_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `TOWN_CLOCK_CONFIG` environment variable
/// 3. `/etc/town-clock/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<TowerConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return TowerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Ok(env_path) = std::env::var("TOWN_CLOCK_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from TOWN_CLOCK_CONFIG");
            return TowerConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from TOWN_CLOCK_CONFIG={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "TOWN_CLOCK_CONFIG set but file does not exist, checking other locations"
        );
    }

    for candidate in ["/etc/town-clock/config.toml", "config/default.toml"] {
        let path = Path::new(candidate);
        if path.exists() {
            info!(config_path = %path.display(), "Loading config");
            return TowerConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(TowerConfig::default())
}

/// Parse `--set-hands`: one dial reading for both hands or two separated by a comma.
fn parse_set_hands(text: &str) -> Result<[i32; 2]> {
    let readings = text
        .split(',')
        .map(|part| FaceTime::parse_dial(part).map(FaceTime::minutes))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid --set-hands value {text:?}"))?;

    match readings.as_slice() {
        [both] => Ok([*both, *both]),
        [one, two] => Ok([*one, *two]),
        _ => bail!("--set-hands takes one or two dial readings, got {}", readings.len()),
    }
}

/// Create the hand relays for the configured driver.
fn create_relays(config: &RelayConfig) -> Result<[Box<dyn RelayPort>; 2]> {
    let names = ["hand-one", "hand-two"];
    match config.driver {
        RelayDriver::Logging => {
            info!("Using logging relays");
            Ok(names.map(|name| Box::new(LoggingRelay::new(name)) as Box<dyn RelayPort>))
        }
        RelayDriver::Simulated => {
            info!("Using simulated relays");
            Ok(names.map(|name| Box::new(SimulatedRelay::new(name)) as Box<dyn RelayPort>))
        }
        RelayDriver::Gpio => {
            info!(pins = ?config.hand_pins, common = ?config.common_pin, "Using GPIO relays");
            let open = |i: usize| -> Result<Box<dyn RelayPort>> {
                let relay = GpioRelay::open(
                    names[i],
                    &config.gpio_root,
                    config.hand_pins[i],
                    config.common_pin,
                    config.pulse_width,
                )
                .with_context(|| format!("Failed to open relay {}", names[i]))?;
                Ok(Box::new(relay))
            };
            Ok([open(0)?, open(1)?])
        }
    }
}

/// Create the lamp relay for the configured driver.
fn create_lamp(config: &RelayConfig) -> Result<Box<dyn LampRelay>> {
    Ok(match config.driver {
        RelayDriver::Logging => Box::new(LoggingLamp::new()),
        RelayDriver::Simulated => Box::new(SimulatedLamp::new()),
        RelayDriver::Gpio => Box::new(
            GpioLamp::open(&config.gpio_root, config.lamp_pin)
                .with_context(|| format!("Failed to open lamp relay on pin {}", config.lamp_pin))?,
        ),
    })
}

fn build_tower(config: &TowerConfig, args: &Args, running: Arc<AtomicBool>) -> Result<Tower> {
    let relays = create_relays(&config.relay)?;
    let lamp = create_lamp(&config.relay)?;

    let mut builder = TowerBuilder::from_config(config, relays)
        .context("Failed to configure tower")?
        .lamp(lamp)
        .running(running);

    if let Some(text) = &args.set_hands {
        let positions = parse_set_hands(text)?;
        info!(one = positions[0], two = positions[1], "Hand positions set from command line");
        builder = builder.positions(positions);
    }

    Ok(builder.build())
}

/// Main daemon loop.
fn run_daemon(
    tower: &mut Tower,
    config: &TowerConfig,
    signal_handler: &SignalHandler,
    diagnostics: &DiagnosticsCollector,
    max_ticks: u64,
) {
    info!(
        tick_interval = %humantime::format_duration(config.tick_interval),
        "Entering tick loop"
    );

    let mut ticks_run = 0u64;

    while !signal_handler.shutdown_requested() {
        if signal_handler.take_hangup() {
            info!(positions = ?tower.positions(), "Hangup acknowledged");
        }

        let ticked = match tower.poll(Utc::now()) {
            Ok(Some(report)) => {
                diagnostics.state().record_tick(&report);
                for (hand, e) in &report.pass.relay_failures {
                    warn!(%hand, error = %e, "Hand will be retried next minute");
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!(error = %e, "Tick failed, retrying next minute");
                diagnostics.state().record_error(&e);
                true
            }
        };

        if ticked {
            ticks_run += 1;
            if max_ticks > 0 && ticks_run >= max_ticks {
                info!(ticks = ticks_run, "Maximum tick count reached");
                signal_handler.request_shutdown();
                break;
            }

            if ticks_run % STATUS_EVERY_TICKS == 0 {
                let snapshot = diagnostics.snapshot(tower.scheduler().state());
                info!(
                    health = %snapshot.health,
                    ticks = snapshot.tick_count,
                    pulses_one = snapshot.pulses[0],
                    pulses_two = snapshot.pulses[1],
                    relay_failures = snapshot.relay_failures,
                    "Periodic status"
                );
            }
        }

        std::thread::sleep(config.tick_interval);
    }

    info!("Shutting down...");
    diagnostics.state().set_shutting_down();

    let snapshot = diagnostics.snapshot(tower.scheduler().state());
    info!(
        total_ticks = snapshot.tick_count,
        correcting_passes = snapshot.correcting_passes,
        pulses_one = snapshot.pulses[0],
        pulses_two = snapshot.pulses[1],
        relay_failures = snapshot.relay_failures,
        schedule_exceeded = snapshot.schedule_exceeded,
        wraparound_anomalies = snapshot.wraparound_anomalies,
        signals = signal_handler.state().signal_count(),
        uptime_secs = snapshot.uptime.as_secs(),
        final_state = %snapshot.state,
        positions = ?tower.positions(),
        "Daemon shutdown complete"
    );
}
