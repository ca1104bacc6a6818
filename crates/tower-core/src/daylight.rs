//! Day/night decision for the tower lamp.
//!
//! [`SolarSchedule`] uses the NOAA low-precision solar position equations,
//! good to well under a degree of elevation, which is far finer than the
//! lamp needs.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use std::f64::consts::PI;
use tower_common::config::{ConfigError, LightsConfig, LightsMode};
use tower_common::position::Position;

/// Decides whether the lamp should be lit.
pub trait DayNight: Send {
    /// Returns true if `instant` is night at the tower.
    fn is_night(&self, instant: DateTime<Utc>) -> bool;
}

impl<D: DayNight + ?Sized> DayNight for Box<D> {
    fn is_night(&self, instant: DateTime<Utc>) -> bool {
        (**self).is_night(instant)
    }
}

/// Night while the sun is below a twilight angle.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarSchedule {
    latitude: f64,
    longitude: f64,
    twilight_angle: f64,
}

impl SolarSchedule {
    /// Civil twilight: sun six degrees below the horizon.
    pub const CIVIL_TWILIGHT: f64 = -6.0;

    /// Schedule for `position`, dark once the sun is below `twilight_angle`
    /// degrees.
    #[must_use]
    pub fn new(position: &Position, twilight_angle: f64) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            twilight_angle,
        }
    }

    /// Solar elevation in degrees at `instant`.
    #[must_use]
    pub fn elevation(&self, instant: DateTime<Utc>) -> f64 {
        solar_elevation(instant, self.latitude, self.longitude)
    }
}

impl DayNight for SolarSchedule {
    fn is_night(&self, instant: DateTime<Utc>) -> bool {
        self.elevation(instant) < self.twilight_angle
    }
}

/// Night between two local wall-clock times.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchedule {
    on: NaiveTime,
    off: NaiveTime,
    tz: Tz,
}

impl FixedSchedule {
    /// Lamp on at `on`, off at `off`, both local to `tz`.
    ///
    /// When `on` is later than `off` the night spans midnight.
    #[must_use]
    pub fn new(on: NaiveTime, off: NaiveTime, tz: Tz) -> Self {
        Self { on, off, tz }
    }
}

impl DayNight for FixedSchedule {
    fn is_night(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.tz).time();
        if self.on <= self.off {
            self.on <= local && local < self.off
        } else {
            local >= self.on || local < self.off
        }
    }
}

/// Lamp never lit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverNight;

impl DayNight for NeverNight {
    fn is_night(&self, _instant: DateTime<Utc>) -> bool {
        false
    }
}

/// Build the schedule selected by `lights`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if fixed times cannot be parsed.
pub fn schedule_from_config(
    lights: &LightsConfig,
    position: &Position,
    tz: Tz,
) -> Result<Box<dyn DayNight>, ConfigError> {
    Ok(match lights.mode {
        LightsMode::Solar => Box::new(SolarSchedule::new(position, lights.twilight_angle)),
        LightsMode::Fixed => {
            let (on, off) = lights.fixed_times()?;
            Box::new(FixedSchedule::new(on, off, tz))
        }
        LightsMode::Off => Box::new(NeverNight),
    })
}

/// Sun elevation in degrees for a point at `latitude`/`longitude`
/// (degrees, north and east positive).
fn solar_elevation(instant: DateTime<Utc>, latitude: f64, longitude: f64) -> f64 {
    let minutes_utc = f64::from(instant.hour() * 60 + instant.minute()) + f64::from(instant.second()) / 60.0;
    let year = instant.year();
    let days_in_year = if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
        366.0
    } else {
        365.0
    };

    // Fractional year, radians
    let gamma = 2.0 * PI / days_in_year
        * (f64::from(instant.ordinal0()) + (minutes_utc / 60.0 - 12.0) / 24.0);

    // Minutes
    let equation_of_time = 229.18
        * (0.000_075 + 0.001_868 * gamma.cos()
            - 0.032_077 * gamma.sin()
            - 0.014_615 * (2.0 * gamma).cos()
            - 0.040_849 * (2.0 * gamma).sin());

    // Radians
    let declination = 0.006_918 - 0.399_912 * gamma.cos() + 0.070_257 * gamma.sin()
        - 0.006_758 * (2.0 * gamma).cos()
        + 0.000_907 * (2.0 * gamma).sin()
        - 0.002_697 * (3.0 * gamma).cos()
        + 0.001_48 * (3.0 * gamma).sin();

    let true_solar_minutes = minutes_utc + equation_of_time + 4.0 * longitude;
    let hour_angle = (true_solar_minutes / 4.0 - 180.0).to_radians();

    let lat = latitude.to_radians();
    let cos_zenith = (lat.sin() * declination.sin()
        + lat.cos() * declination.cos() * hour_angle.cos())
    .clamp(-1.0, 1.0);

    90.0 - cos_zenith.acos().to_degrees()
}
