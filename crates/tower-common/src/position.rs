//! Geographic position of the clock tower.
//!
//! Constructed once from configuration and handed by reference to whatever
//! needs it (currently the solar day/night schedule). There is no global
//! position cell.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Latitude, longitude and altitude of the tower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    /// Degrees north of the equator; south is negative.
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub latitude: f64,
    /// Degrees east of the prime meridian; west is negative.
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub longitude: f64,
    /// Metres above mean sea level.
    pub altitude: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            latitude: -30.3402,
            longitude: 152.7124,
            altitude: 741.0,
        }
    }
}

impl Position {
    /// Create a position from decimal degrees.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position({}, {}, {})",
            self.latitude, self.longitude, self.altitude
        )
    }
}

/// Parse a coordinate written as `"30.3402S"` or `"152.7124E"`.
///
/// N and E are positive, S and W negative. A bare number is accepted as-is.
pub fn parse_coordinate(text: &str) -> Result<f64, String> {
    let text = text.trim();
    let (number, sign) = match text.chars().last() {
        Some(c @ ('N' | 'n' | 'E' | 'e')) => (&text[..text.len() - c.len_utf8()], 1.0),
        Some(c @ ('S' | 's' | 'W' | 'w')) => (&text[..text.len() - c.len_utf8()], -1.0),
        Some(_) => (text, 1.0),
        None => return Err("empty coordinate".to_string()),
    };
    number
        .trim()
        .parse::<f64>()
        .map(|value| value * sign)
        .map_err(|e| format!("invalid coordinate {text:?}: {e}"))
}

fn deserialize_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct CoordinateVisitor;

    impl<'de> Visitor<'de> for CoordinateVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a string such as \"30.3402S\"")
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_coordinate(value).map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_any(CoordinateVisitor)
}
