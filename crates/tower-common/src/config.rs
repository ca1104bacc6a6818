//! Configuration structures for the clock controller.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for the tower installation.

use crate::position::Position;
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    /// IANA timezone the dial shows (e.g. "Australia/Sydney").
    pub timezone: String,

    /// How often the daemon polls the wall clock for a minute boundary.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Settle time after each scheduler loop body.
    #[serde(with = "humantime_serde")]
    pub pulse_interval: Duration,

    /// Per-hand correction settings.
    pub hands: HandsConfig,

    /// Relay driver configuration.
    pub relay: RelayConfig,

    /// Location of the tower.
    pub position: Position,

    /// Lamp switching configuration.
    pub lights: LightsConfig,

    /// Persisted hand-position log.
    pub log: LogConfig,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            timezone: String::from("Australia/Sydney"),
            tick_interval: Duration::from_millis(200),
            pulse_interval: Duration::from_millis(500),
            hands: HandsConfig::default(),
            relay: RelayConfig::default(),
            position: Position::default(),
            lights: LightsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Per-hand correction settings, shared by both hands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandsConfig {
    /// Minutes within which a hand nearly a full lap behind is left to coast.
    pub cutoff: i32,

    /// Wait between pulses within a batch.
    #[serde(with = "humantime_serde")]
    pub pulse_interval: Duration,
}

impl Default for HandsConfig {
    fn default() -> Self {
        Self {
            cutoff: 30,
            pulse_interval: Duration::from_millis(500),
        }
    }
}

/// Supported relay drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelayDriver {
    /// Log pulses without touching hardware.
    #[default]
    Logging,
    /// In-memory relays for testing.
    Simulated,
    /// Linux sysfs GPIO.
    Gpio,
}

/// Relay wiring and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay driver type.
    pub driver: RelayDriver,

    /// GPIO lines for hand one and hand two.
    pub hand_pins: [u32; 2],

    /// Common relay energised alongside either hand relay.
    pub common_pin: Option<u32>,

    /// GPIO line for the lamp relay.
    pub lamp_pin: u32,

    /// How long the relay is held energised for one pulse.
    #[serde(with = "humantime_serde")]
    pub pulse_width: Duration,

    /// Root of the sysfs GPIO tree.
    pub gpio_root: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            driver: RelayDriver::Logging,
            hand_pins: [24, 25],
            common_pin: Some(23),
            lamp_pin: 22,
            pulse_width: Duration::from_millis(200),
            gpio_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}

/// How the lamp decides it is night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LightsMode {
    /// Sun elevation below the twilight angle at the configured position.
    #[default]
    Solar,
    /// Fixed local on/off times.
    Fixed,
    /// Never switch the lamp on.
    Off,
}

/// Lamp switching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    /// Day/night source.
    pub mode: LightsMode,

    /// Local time the lamp turns on in `fixed` mode ("HH:MM").
    pub on: String,

    /// Local time the lamp turns off in `fixed` mode ("HH:MM").
    pub off: String,

    /// Sun elevation in degrees below which it counts as night.
    pub twilight_angle: f64,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            mode: LightsMode::Solar,
            on: String::from("18:00"),
            off: String::from("06:00"),
            twilight_angle: -6.0,
        }
    }
}

impl LightsConfig {
    /// Parse the fixed-mode switching times.
    ///
    /// # Errors
    ///
    /// Returns an error if either time is not "HH:MM".
    pub fn fixed_times(&self) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        let parse = |field: &str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M")
                .map_err(|e| ConfigError::Invalid(format!("lights.{field} = {value:?}: {e}")))
        };
        Ok((parse("on", &self.on)?, parse("off", &self.off)?))
    }
}

/// Persisted hand-position log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// JSON Lines file recording hand positions after each correction.
    pub hand_log: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            hand_log: PathBuf::from("hand_positions.jsonl"),
        }
    }
}

impl TowerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Resolve the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA zone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid(format!("timezone {:?}: {e}", self.timezone)))
    }

    /// Check values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        if !(0..720).contains(&self.hands.cutoff) {
            return Err(ConfigError::Invalid(format!(
                "hands.cutoff must be within 0..720, got {}",
                self.hands.cutoff
            )));
        }
        if self.relay.pulse_width.is_zero() {
            return Err(ConfigError::Invalid(
                "relay.pulse_width must be greater than zero".into(),
            ));
        }
        if self.tick_interval >= Duration::from_secs(1) {
            return Err(ConfigError::Invalid(format!(
                "tick_interval must be shorter than one second to catch the minute boundary, got {}",
                humantime::format_duration(self.tick_interval)
            )));
        }
        if self.lights.mode == LightsMode::Fixed {
            self.lights.fixed_times()?;
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A setting parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
