//! Vimshottari dasha periods.
//!
//! The 120-year cycle starts at the lord of the Moon's birth nakshatra. The
//! part of that first period the Moon had already traversed at birth is
//! treated as elapsed, and each period divides into nine sub-periods in the
//! same sequence, starting at its own lord.

use crate::chart::types::normalize_degrees;
use crate::ephemeris::CelestialBody;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const VIMSHOTTARI_TOTAL_YEARS: f64 = 120.0;
pub const VIMSHOTTARI_YEAR_DAYS: f64 = 365.25;

const VIMSHOTTARI_SEQUENCE: [(CelestialBody, f64); 9] = [
    (CelestialBody::Ketu, 7.0),
    (CelestialBody::Venus, 20.0),
    (CelestialBody::Sun, 6.0),
    (CelestialBody::Moon, 10.0),
    (CelestialBody::Mars, 7.0),
    (CelestialBody::Rahu, 18.0),
    (CelestialBody::Jupiter, 16.0),
    (CelestialBody::Saturn, 19.0),
    (CelestialBody::Mercury, 17.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DashaLevel {
    #[default]
    Mahadasha,
    Antardasha,
}

/// Dasha lords running at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashaFacts {
    /// Birth nakshatra of the Moon, 1 (Ashwini) to 27 (Revati).
    pub nakshatra: u8,
    pub mahadasha: CelestialBody,
    pub antardasha: CelestialBody,
}

impl DashaFacts {
    pub fn lord(&self, level: DashaLevel) -> CelestialBody {
        match level {
            DashaLevel::Mahadasha => self.mahadasha,
            DashaLevel::Antardasha => self.antardasha,
        }
    }
}

/// Nakshatra number (1-27) of a longitude and the fraction of it traversed.
pub fn nakshatra_of(longitude: f64) -> (u8, f64) {
    // scaled before dividing so exact boundaries stay exact
    let position = normalize_degrees(longitude) * 27.0 / 360.0;
    let index = (position.floor() as u8).min(26);
    let progress = (position - index as f64).clamp(0.0, 1.0);
    (index + 1, progress)
}

/// Lord ruling a nakshatra in the Vimshottari scheme.
pub fn nakshatra_lord(nakshatra: u8) -> CelestialBody {
    VIMSHOTTARI_SEQUENCE[(nakshatra.saturating_sub(1) % 9) as usize].0
}

/// Dasha lords at `at` for a chart born at `birth` with the Moon at
/// `moon_longitude`. Instants before birth read as the birth instant.
pub fn active_dasha(moon_longitude: f64, birth: DateTime<Utc>, at: DateTime<Utc>) -> DashaFacts {
    let (nakshatra, progress) = nakshatra_of(moon_longitude);
    let first = (nakshatra.saturating_sub(1) % 9) as usize;

    let elapsed_days = (at - birth).num_seconds().max(0) as f64 / 86_400.0;
    let years = VIMSHOTTARI_SEQUENCE[first].1 * progress + elapsed_days / VIMSHOTTARI_YEAR_DAYS;

    let (maha, into_maha) = locate(first, years % VIMSHOTTARI_TOTAL_YEARS, 1.0);
    let scale = VIMSHOTTARI_SEQUENCE[maha].1 / VIMSHOTTARI_TOTAL_YEARS;
    let (antar, _) = locate(maha, into_maha, scale);

    DashaFacts {
        nakshatra,
        mahadasha: VIMSHOTTARI_SEQUENCE[maha].0,
        antardasha: VIMSHOTTARI_SEQUENCE[antar].0,
    }
}

/// Walk the sequence from `start`, each period lasting its years times
/// `scale`, to the period containing `offset`. Returns its index and the
/// offset into it.
fn locate(start: usize, mut offset: f64, scale: f64) -> (usize, f64) {
    for step in 0..VIMSHOTTARI_SEQUENCE.len() {
        let index = (start + step) % VIMSHOTTARI_SEQUENCE.len();
        let span = VIMSHOTTARI_SEQUENCE[index].1 * scale;
        if offset < span {
            return (index, offset);
        }
        offset -= span;
    }
    // rounding left the offset at the very end of the cycle
    let last = (start + VIMSHOTTARI_SEQUENCE.len() - 1) % VIMSHOTTARI_SEQUENCE.len();
    (last, VIMSHOTTARI_SEQUENCE[last].1 * scale)
}
