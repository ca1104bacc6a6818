//! Linux sysfs GPIO relay driver.
//!
//! Each relay coil is wired to one GPIO line driven through
//! `/sys/class/gpio`. A pulse energises the line (and the optional shared
//! common relay) for a fixed width, then returns everything to rest:
//!
//! ```text
//! common  ____/‾‾‾‾‾‾‾‾‾‾‾‾‾‾\____
//! hand    _____/‾‾‾‾‾‾‾‾‾‾‾‾\_____
//!              |<- width ->|
//! ```
//!
//! Lines are exported and set to output once, when the relay is opened.

use crate::{LampRelay, RelayPort};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tower_common::error::{ClockError, ClockResult};
use tracing::{debug, info, trace, warn};

/// A single exported GPIO output line.
#[derive(Debug)]
pub struct GpioPin {
    pin: u32,
    value_path: PathBuf,
}

impl GpioPin {
    /// Export `pin` under `root` (if needed), configure it as an output and
    /// drive it low.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Io`] if any sysfs write fails.
    pub fn open(root: &Path, pin: u32) -> ClockResult<Self> {
        let pin_dir = root.join(format!("gpio{pin}"));
        if !pin_dir.exists() {
            debug!(pin, root = %root.display(), "Exporting GPIO line");
            write_sysfs(&root.join("export"), &pin.to_string())?;
        }
        write_sysfs(&pin_dir.join("direction"), "out")?;

        let gpio = Self {
            pin,
            value_path: pin_dir.join("value"),
        };
        gpio.set(false)?;
        Ok(gpio)
    }

    /// Line number.
    #[must_use]
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Drive the line high (`true`) or low.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Io`] if the value file cannot be written.
    pub fn set(&self, high: bool) -> ClockResult<()> {
        write_sysfs(&self.value_path, if high { "1" } else { "0" })
    }
}

fn write_sysfs(path: &Path, value: &str) -> ClockResult<()> {
    fs::write(path, value).map_err(|e| ClockError::Io(format!("{}: {e}", path.display())))
}

/// Hand relay on a sysfs GPIO line.
#[derive(Debug)]
pub struct GpioRelay {
    name: String,
    line: GpioPin,
    common: Option<GpioPin>,
    pulse_width: Duration,
}

impl GpioRelay {
    /// Open the hand line and the optional common line.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Io`] if either line cannot be set up.
    pub fn open(
        name: impl Into<String>,
        root: &Path,
        pin: u32,
        common_pin: Option<u32>,
        pulse_width: Duration,
    ) -> ClockResult<Self> {
        let name = name.into();
        let line = GpioPin::open(root, pin)?;
        let common = common_pin.map(|p| GpioPin::open(root, p)).transpose()?;
        info!(relay = %name, pin, ?common_pin, "GPIO relay ready");
        Ok(Self {
            name,
            line,
            common,
            pulse_width,
        })
    }

    /// Configured pulse width.
    #[must_use]
    pub fn pulse_width(&self) -> Duration {
        self.pulse_width
    }

    fn energise(&self) -> ClockResult<()> {
        if let Some(common) = &self.common {
            common.set(true)?;
        }
        self.line.set(true)
    }

    fn release(&self) -> ClockResult<()> {
        let line = self.line.set(false);
        let common = self.common.as_ref().map_or(Ok(()), |c| c.set(false));
        line.and(common)
    }
}

impl RelayPort for GpioRelay {
    fn pulse(&mut self) -> ClockResult<()> {
        if let Err(e) = self.energise() {
            if let Err(release) = self.release() {
                warn!(relay = %self.name, error = %release, "Failed to return relay to rest");
            }
            return Err(ClockError::pulse_failure(&self.name, e));
        }

        thread::sleep(self.pulse_width);

        self.release()
            .map_err(|e| ClockError::pulse_failure(&self.name, e))?;
        trace!(relay = %self.name, width_ms = self.pulse_width.as_millis(), "Pulse complete");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Lamp relay on a sysfs GPIO line.
#[derive(Debug)]
pub struct GpioLamp {
    line: GpioPin,
    lit: bool,
}

impl GpioLamp {
    /// Open the lamp line, starting switched off.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Io`] if the line cannot be set up.
    pub fn open(root: &Path, pin: u32) -> ClockResult<Self> {
        Ok(Self {
            line: GpioPin::open(root, pin)?,
            lit: false,
        })
    }
}

impl LampRelay for GpioLamp {
    fn set_lit(&mut self, lit: bool) -> ClockResult<()> {
        self.line.set(lit)?;
        self.lit = lit;
        Ok(())
    }

    fn is_lit(&self) -> bool {
        self.lit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a fake sysfs tree with pre-exported lines.
    fn fake_sysfs(pins: &[u32]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for pin in pins {
            let pin_dir = dir.path().join(format!("gpio{pin}"));
            fs::create_dir(&pin_dir).unwrap();
            fs::write(pin_dir.join("direction"), "in").unwrap();
            fs::write(pin_dir.join("value"), "1").unwrap();
        }
        dir
    }

    fn read_value(root: &Path, pin: u32) -> String {
        fs::read_to_string(root.join(format!("gpio{pin}/value"))).unwrap()
    }

    #[test]
    fn test_open_configures_output_low() {
        let sysfs = fake_sysfs(&[24]);
        let pin = GpioPin::open(sysfs.path(), 24).unwrap();
        assert_eq!(pin.pin(), 24);
        assert_eq!(
            fs::read_to_string(sysfs.path().join("gpio24/direction")).unwrap(),
            "out"
        );
        assert_eq!(read_value(sysfs.path(), 24), "0");
    }

    #[test]
    fn test_unexported_line_is_exported() {
        let sysfs = tempfile::tempdir().unwrap();
        // No gpio25 directory and no kernel to create it: export is written,
        // then direction fails.
        let result = GpioPin::open(sysfs.path(), 25);
        assert_eq!(
            fs::read_to_string(sysfs.path().join("export")).unwrap(),
            "25"
        );
        assert!(matches!(result, Err(ClockError::Io(_))));
    }

    #[test]
    fn test_pulse_returns_lines_to_rest() {
        let sysfs = fake_sysfs(&[24, 23]);
        let mut relay = GpioRelay::open(
            "hand-one",
            sysfs.path(),
            24,
            Some(23),
            Duration::from_millis(1),
        )
        .unwrap();

        relay.pulse().unwrap();
        assert_eq!(read_value(sysfs.path(), 24), "0");
        assert_eq!(read_value(sysfs.path(), 23), "0");
        assert_eq!(relay.name(), "hand-one");
    }

    #[test]
    fn test_pulse_failure_when_line_disappears() {
        let sysfs = fake_sysfs(&[24]);
        let mut relay =
            GpioRelay::open("hand-one", sysfs.path(), 24, None, Duration::from_millis(1)).unwrap();

        fs::remove_dir_all(sysfs.path().join("gpio24")).unwrap();
        let err = relay.pulse().unwrap_err();
        assert!(matches!(err, ClockError::PulseFailure { ref relay, .. } if relay == "hand-one"));
    }

    #[test]
    fn test_lamp_switching() {
        let sysfs = fake_sysfs(&[22]);
        let mut lamp = GpioLamp::open(sysfs.path(), 22).unwrap();
        assert!(!lamp.is_lit());

        lamp.set_lit(true).unwrap();
        assert!(lamp.is_lit());
        assert_eq!(read_value(sysfs.path(), 22), "1");

        lamp.set_lit(false).unwrap();
        assert_eq!(read_value(sysfs.path(), 22), "0");
    }
}
