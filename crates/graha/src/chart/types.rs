use crate::chart::dasha::{active_dasha, DashaFacts};
use crate::ephemeris::{CelestialBody, GeoLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Zodiac signs, numbered 1 (Aries) to 12 (Pisces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

const SIGNS: [Sign; 12] = [
    Sign::Aries,
    Sign::Taurus,
    Sign::Gemini,
    Sign::Cancer,
    Sign::Leo,
    Sign::Virgo,
    Sign::Libra,
    Sign::Scorpio,
    Sign::Sagittarius,
    Sign::Capricorn,
    Sign::Aquarius,
    Sign::Pisces,
];

impl Sign {
    /// 1-based sign number.
    pub fn number(&self) -> u8 {
        *self as u8 + 1
    }

    pub fn from_number(number: u8) -> Option<Sign> {
        if (1..=12).contains(&number) {
            Some(SIGNS[(number - 1) as usize])
        } else {
            None
        }
    }

    /// sign = floor(longitude / 30) + 1, after normalizing to [0, 360).
    pub fn from_longitude(longitude: f64) -> Sign {
        let normalized = normalize_degrees(longitude);
        let index = ((normalized / 30.0).floor() as usize).min(11);
        SIGNS[index]
    }

    /// The sign `offset` places further along the zodiac.
    pub fn offset(&self, offset: u8) -> Sign {
        SIGNS[(*self as usize + offset as usize) % 12]
    }

    /// Classical sign lord.
    pub fn lord(&self) -> CelestialBody {
        match self {
            Sign::Aries | Sign::Scorpio => CelestialBody::Mars,
            Sign::Taurus | Sign::Libra => CelestialBody::Venus,
            Sign::Gemini | Sign::Virgo => CelestialBody::Mercury,
            Sign::Cancer => CelestialBody::Moon,
            Sign::Leo => CelestialBody::Sun,
            Sign::Sagittarius | Sign::Pisces => CelestialBody::Jupiter,
            Sign::Capricorn | Sign::Aquarius => CelestialBody::Saturn,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Strength of a body by virtue of the sign it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dignity {
    Exalted,
    #[serde(alias = "own")]
    OwnSign,
    Neutral,
    Debilitated,
}

/// Aspect kinds in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectType {
    Conjunction,
    Opposition,
    Trine,
    Square,
    Sextile,
}

impl AspectType {
    pub const ALL: [AspectType; 5] = [
        AspectType::Conjunction,
        AspectType::Opposition,
        AspectType::Trine,
        AspectType::Square,
        AspectType::Sextile,
    ];

    /// Nominal separation in degrees.
    pub fn angle(&self) -> f64 {
        match self {
            AspectType::Conjunction => 0.0,
            AspectType::Opposition => 180.0,
            AspectType::Trine => 120.0,
            AspectType::Square => 90.0,
            AspectType::Sextile => 60.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectType::Conjunction => "conjunction",
            AspectType::Opposition => "opposition",
            AspectType::Trine => "trine",
            AspectType::Square => "square",
            AspectType::Sextile => "sextile",
        }
    }
}

impl FromStr for AspectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectType::ALL
            .iter()
            .find(|aspect| aspect.as_str() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| format!("unknown aspect type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HouseSystem {
    /// 30-degree houses measured from the ascendant degree.
    Equal,
    /// The ascendant's sign is the first house.
    #[default]
    WholeSign,
}

impl FromStr for HouseSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" => Ok(HouseSystem::Equal),
            "whole_sign" | "whole-sign" => Ok(HouseSystem::WholeSign),
            other => Err(format!("unsupported house system: {other} (valid: equal, whole_sign)")),
        }
    }
}

/// Reference frame and tolerances for chart normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    /// Bodies every chart must carry, in canonical order.
    pub bodies: Vec<CelestialBody>,
    pub house_system: HouseSystem,
    /// Per-body combustion threshold in degrees from the Sun.
    pub combustion: BTreeMap<CelestialBody, f64>,
    /// Default orb per aspect type.
    pub orbs: BTreeMap<AspectType, f64>,
    /// Per-body orb overrides.
    pub body_orbs: BTreeMap<CelestialBody, BTreeMap<AspectType, f64>>,
}

impl ChartConfig {
    /// Orb a single body allows for `aspect`.
    pub fn body_orb(&self, body: CelestialBody, aspect: AspectType) -> f64 {
        self.body_orbs
            .get(&body)
            .and_then(|overrides| overrides.get(&aspect))
            .or_else(|| self.orbs.get(&aspect))
            .copied()
            .unwrap_or(0.0)
    }

    /// Orb for a pair: the wider of the two bodies' orbs.
    pub fn pair_orb(&self, a: CelestialBody, b: CelestialBody, aspect: AspectType) -> f64 {
        self.body_orb(a, aspect).max(self.body_orb(b, aspect))
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        let combustion = BTreeMap::from([
            (CelestialBody::Moon, 12.0),
            (CelestialBody::Mars, 17.0),
            (CelestialBody::Mercury, 14.0),
            (CelestialBody::Jupiter, 11.0),
            (CelestialBody::Venus, 10.0),
            (CelestialBody::Saturn, 15.0),
        ]);
        let orbs = BTreeMap::from([
            (AspectType::Conjunction, 8.0),
            (AspectType::Opposition, 8.0),
            (AspectType::Trine, 7.0),
            (AspectType::Square, 7.0),
            (AspectType::Sextile, 5.0),
        ]);
        let luminary = BTreeMap::from([
            (AspectType::Conjunction, 10.0),
            (AspectType::Opposition, 10.0),
        ]);
        let body_orbs = BTreeMap::from([
            (CelestialBody::Sun, luminary.clone()),
            (CelestialBody::Moon, luminary),
        ]);
        Self {
            bodies: CelestialBody::ALL.to_vec(),
            house_system: HouseSystem::WholeSign,
            combustion,
            orbs,
            body_orbs,
        }
    }
}

/// Derived facts for one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFacts {
    pub longitude: f64,
    pub sign: Sign,
    pub house: u8,
    pub retrograde: bool,
    pub combust: bool,
    pub dignity: Dignity,
}

/// One edge of the aspect graph. `a` precedes `b` in canonical body order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectFact {
    pub a: CelestialBody,
    pub b: CelestialBody,
    pub aspect: AspectType,
    /// Deviation from the nominal angle, in degrees.
    pub orb: f64,
}

/// Immutable, normalized view of one chart.
///
/// Built only by [`crate::chart::normalize`]. Iteration order over bodies,
/// aspects and house lords is canonical, so equal content always serializes
/// and digests identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) location: Option<GeoLocation>,
    pub(crate) house_system: HouseSystem,
    pub(crate) ascendant: f64,
    pub(crate) ascendant_sign: Sign,
    pub(crate) bodies: BTreeMap<CelestialBody, BodyFacts>,
    pub(crate) aspects: Vec<AspectFact>,
    pub(crate) house_lords: BTreeMap<u8, CelestialBody>,
    /// Vimshottari lords at `timestamp`, reading the chart as a birth chart.
    /// Absent when the Moon is not configured.
    #[serde(default)]
    pub(crate) dasha: Option<DashaFacts>,
}

#[derive(Serialize)]
struct DigestView<'a> {
    house_system: HouseSystem,
    ascendant_sign: Sign,
    bodies: &'a BTreeMap<CelestialBody, BodyFacts>,
    aspects: &'a [AspectFact],
    house_lords: &'a BTreeMap<u8, CelestialBody>,
    dasha: Option<DashaFacts>,
}

impl FactSet {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }

    pub fn house_system(&self) -> HouseSystem {
        self.house_system
    }

    pub fn ascendant(&self) -> f64 {
        self.ascendant
    }

    pub fn ascendant_sign(&self) -> Sign {
        self.ascendant_sign
    }

    pub fn body(&self, body: CelestialBody) -> Option<&BodyFacts> {
        self.bodies.get(&body)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (CelestialBody, &BodyFacts)> {
        self.bodies.iter().map(|(body, facts)| (*body, facts))
    }

    pub fn aspects(&self) -> &[AspectFact] {
        &self.aspects
    }

    /// Aspect recorded between two bodies, in either argument order.
    pub fn aspect_between(&self, a: CelestialBody, b: CelestialBody) -> Option<&AspectFact> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.aspects.iter().find(|fact| fact.a == a && fact.b == b)
    }

    pub fn house_lord(&self, house: u8) -> Option<CelestialBody> {
        self.house_lords.get(&house).copied()
    }

    pub fn dasha(&self) -> Option<DashaFacts> {
        self.dasha
    }

    /// The same chart with its dasha lords advanced to `at`, treating this
    /// chart as the birth chart.
    pub fn with_dasha_at(&self, at: DateTime<Utc>) -> FactSet {
        let mut advanced = self.clone();
        advanced.dasha = self
            .bodies
            .get(&CelestialBody::Moon)
            .map(|moon| active_dasha(moon.longitude, self.timestamp, at));
        advanced
    }

    /// Stable content hash (hex SHA-256) of everything rule evaluation reads.
    ///
    /// Timestamp and location identify the chart but are not part of its
    /// content, so two instants producing identical facts share a digest.
    pub fn digest(&self) -> String {
        let view = DigestView {
            house_system: self.house_system,
            ascendant_sign: self.ascendant_sign,
            bodies: &self.bodies,
            aspects: &self.aspects,
            house_lords: &self.house_lords,
            dasha: self.dasha,
        };
        // Only derive(Serialize) data with string-convertible keys; cannot fail.
        let canonical = serde_json::to_vec(&view).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

/// Normalize degrees to [0, 360).
pub fn normalize_degrees(value: f64) -> f64 {
    let mut normalized = value % 360.0;
    if normalized < 0.0 {
        normalized += 360.0;
    }
    if normalized >= 360.0 {
        normalized -= 360.0;
    }
    // canonical zero
    normalized + 0.0
}

/// Shortest arc between two longitudes, in [0, 180].
pub fn angular_difference(lon1: f64, lon2: f64) -> f64 {
    let diff = (normalize_degrees(lon1) - normalize_degrees(lon2)).abs();
    diff.min(360.0 - diff)
}
