use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The nine grahas used by the rule catalog.
///
/// Declaration order is the canonical order: it drives aspect pair ordering,
/// fact serialization and modifier products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CelestialBody {
    Sun,
    Moon,
    Mars,
    Mercury,
    Jupiter,
    Venus,
    Saturn,
    Rahu,
    Ketu,
}

impl CelestialBody {
    pub const ALL: [CelestialBody; 9] = [
        CelestialBody::Sun,
        CelestialBody::Moon,
        CelestialBody::Mars,
        CelestialBody::Mercury,
        CelestialBody::Jupiter,
        CelestialBody::Venus,
        CelestialBody::Saturn,
        CelestialBody::Rahu,
        CelestialBody::Ketu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CelestialBody::Sun => "Sun",
            CelestialBody::Moon => "Moon",
            CelestialBody::Mars => "Mars",
            CelestialBody::Mercury => "Mercury",
            CelestialBody::Jupiter => "Jupiter",
            CelestialBody::Venus => "Venus",
            CelestialBody::Saturn => "Saturn",
            CelestialBody::Rahu => "Rahu",
            CelestialBody::Ketu => "Ketu",
        }
    }

    /// Lunar nodes are shadow points, not physical bodies.
    pub fn is_node(&self) -> bool {
        matches!(self, CelestialBody::Rahu | CelestialBody::Ketu)
    }
}

impl fmt::Display for CelestialBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CelestialBody {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sun" => Ok(CelestialBody::Sun),
            "moon" => Ok(CelestialBody::Moon),
            "mars" => Ok(CelestialBody::Mars),
            "mercury" => Ok(CelestialBody::Mercury),
            "jupiter" => Ok(CelestialBody::Jupiter),
            "venus" => Ok(CelestialBody::Venus),
            "saturn" => Ok(CelestialBody::Saturn),
            "rahu" | "north_node" => Ok(CelestialBody::Rahu),
            "ketu" | "south_node" => Ok(CelestialBody::Ketu),
            other => Err(format!("unknown celestial body: {other}")),
        }
    }
}

/// Geographic location coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
}

impl GeoLocation {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// One body's raw ephemeris output for one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    pub body: CelestialBody,
    /// Ecliptic longitude in degrees (0-360)
    pub longitude: f64,
    /// Ecliptic latitude in degrees
    pub latitude: f64,
    /// Speed in longitude (degrees per day)
    pub daily_motion: f64,
    pub timestamp: DateTime<Utc>,
}

/// Input to a position provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub timestamp: DateTime<Utc>,
    pub location: GeoLocation,
    pub bodies: Vec<CelestialBody>,
}

/// Provider output: positions in request order plus the ascendant when the
/// provider computes houses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderChart {
    pub positions: Vec<RawPosition>,
    pub ascendant: Option<f64>,
}

/// Zodiac reference frame requested from the ephemeris.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Zodiac {
    Tropical,
    #[default]
    Sidereal,
}

/// Settings for ephemeris calculations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisSettings {
    pub zodiac: Zodiac,
    /// Ayanamsa name (for sidereal zodiac)
    pub ayanamsa: Option<String>,
    /// Directory holding the Swiss Ephemeris data files
    pub data_path: Option<std::path::PathBuf>,
}

impl Default for EphemerisSettings {
    fn default() -> Self {
        Self {
            zodiac: Zodiac::Sidereal,
            ayanamsa: Some("lahiri".to_string()),
            data_path: None,
        }
    }
}
