#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use graha_core::chart::{normalize, ChartConfig, FactSet};
use graha_core::ephemeris::{
    CelestialBody, GeoLocation, PositionProvider, PositionRequest, ProviderChart, RawPosition,
};
use graha_core::error::ProviderError;
use graha_core::rules::{CatalogLimits, RuleCatalog};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub const LIBRA_ASCENDANT: f64 = 200.0;
pub const UJJAIN: GeoLocation = GeoLocation { lat: 23.18, lon: 75.78 };

pub fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 18, 35, 0).unwrap()
}

pub fn position(
    body: CelestialBody,
    longitude: f64,
    daily_motion: f64,
    timestamp: DateTime<Utc>,
) -> RawPosition {
    RawPosition {
        body,
        longitude,
        latitude: 0.0,
        daily_motion,
        timestamp,
    }
}

/// Libra rising chart:
///
/// | body    | lon | sign        | house | state               |
/// |---------|-----|-------------|-------|---------------------|
/// | Sun     | 100 | Cancer      | 10    | neutral             |
/// | Moon    |  40 | Taurus      | 8     | exalted             |
/// | Mars    |  10 | Aries       | 7     | own sign            |
/// | Mercury | 112 | Cancer      | 10    | retrograde, combust |
/// | Jupiter | 250 | Sagittarius | 3     | own sign            |
/// | Venus   | 130 | Leo         | 11    | neutral             |
/// | Saturn  | 310 | Aquarius    | 5     | own sign            |
/// | Rahu    | 330 | Pisces      | 6     | retrograde          |
/// | Ketu    | 150 | Virgo       | 12    | retrograde          |
pub fn sample_positions_at(timestamp: DateTime<Utc>) -> Vec<RawPosition> {
    vec![
        position(CelestialBody::Sun, 100.0, 0.95, timestamp),
        position(CelestialBody::Moon, 40.0, 13.2, timestamp),
        position(CelestialBody::Mars, 10.0, 0.6, timestamp),
        position(CelestialBody::Mercury, 112.0, -0.3, timestamp),
        position(CelestialBody::Jupiter, 250.0, 0.1, timestamp),
        position(CelestialBody::Venus, 130.0, 1.2, timestamp),
        position(CelestialBody::Saturn, 310.0, 0.05, timestamp),
        position(CelestialBody::Rahu, 330.0, -0.05, timestamp),
        position(CelestialBody::Ketu, 150.0, -0.05, timestamp),
    ]
}

pub fn sample_positions() -> Vec<RawPosition> {
    sample_positions_at(ts())
}

pub fn sample_facts() -> FactSet {
    facts_from(&sample_positions())
}

/// Normalize `positions` with the sample ascendant and default config.
pub fn facts_from(positions: &[RawPosition]) -> FactSet {
    normalize(positions, LIBRA_ASCENDANT, Some(UJJAIN), &ChartConfig::default()).unwrap()
}

/// The sample chart with the given bodies moved to new longitudes.
pub fn sample_facts_with(moved: &[(CelestialBody, f64)]) -> FactSet {
    let mut positions = sample_positions();
    for position in &mut positions {
        if let Some((_, longitude)) = moved.iter().find(|(body, _)| *body == position.body) {
            position.longitude = *longitude;
        }
    }
    facts_from(&positions)
}

pub fn load_catalog(source: &str) -> RuleCatalog {
    RuleCatalog::load(source, &CatalogLimits::default()).unwrap()
}

/// Catalog exercising every leaf type against the sample chart.
pub const SAMPLE_CATALOG: &str = r#"{
    "version": "test-2024.1",
    "rules": [
        {"_comment": "=== placements ==="},
        {"id": "R1", "name": "Mars in 7th in own sign", "category": "relationship",
         "priority": 1, "base_weight": 2.0,
         "effects": {"love": -1.0, "career": 0.5},
         "condition": {"type": "and", "children": [
            {"type": "body_in_house", "body": "Mars", "houses": [7]},
            {"type": "dignity", "body": "Mars", "dignities": ["own"]}
         ]}},
        {"id": "R2", "name": "Combust Mercury", "category": "mind",
         "priority": 2, "base_weight": 1.0,
         "effects": {"mental": -2.0},
         "condition": {"type": "combust", "body": "Mercury"}},
        {"id": "R3", "name": "Exalted Moon", "category": "mind",
         "priority": 2, "base_weight": 1.0,
         "effects": {"mental": 2.0, "health": 1.0},
         "condition": {"type": "dignity", "body": "Moon", "dignities": ["exalted"]}},
        {"_comment": "=== aspects ==="},
        {"id": "R4", "name": "Mars trine Jupiter", "category": "career",
         "priority": 3, "base_weight": 1.0,
         "effects": {"career": 3.0, "finance": 1.0},
         "condition": {"type": "aspect", "a": "Jupiter", "b": "Mars", "aspects": ["trine"]}},
        {"id": "R5", "name": "Mars direct", "category": "general",
         "priority": 3, "base_weight": 1.0,
         "condition": {"type": "not", "child": {"type": "retrograde", "body": "Mars"}}},
        {"id": "R6", "name": "Moon in Taurus or Jupiter retrograde", "category": "mind",
         "priority": 3, "base_weight": 1.0,
         "condition": {"type": "or", "children": [
            {"type": "retrograde", "body": "Jupiter"},
            {"type": "body_in_sign", "body": "Moon", "signs": ["Taurus"]}
         ]}},
        {"id": "R7", "name": "Seventh lord in seventh", "category": "relationship",
         "priority": 4, "base_weight": 1.0,
         "effects": {"love": 2.0},
         "condition": {"type": "house_lord_in", "house": 7, "houses": [7]}},
        {"id": "R8", "name": "Saturn aspects the 7th", "category": "relationship",
         "priority": 4, "base_weight": 1.0,
         "effects": {"love": -1.5},
         "condition": {"type": "aspects_house", "body": "Saturn", "houses": [7]}},
        {"id": "R9", "name": "Sun with Mercury", "category": "career",
         "priority": 4, "base_weight": 1.0,
         "effects": {"career": 1.0},
         "condition": {"type": "same_house", "bodies": ["Sun", "Mercury"]}},
        {"id": "R10", "name": "Venus retrograde", "category": "relationship",
         "priority": 1, "base_weight": 5.0,
         "condition": {"type": "retrograde", "body": "Venus"}}
    ]
}"#;

/// Provider returning a fixed chart, optionally failing or stalling first.
pub struct FixedProvider {
    pub ascendant: Option<f64>,
    pub failures_before_success: u32,
    pub delay: Option<Duration>,
    pub always_fail: bool,
    pub calls: AtomicU32,
}

impl FixedProvider {
    pub fn new() -> Self {
        Self {
            ascendant: Some(LIBRA_ASCENDANT),
            failures_before_success: 0,
            delay: None,
            always_fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionProvider for FixedProvider {
    async fn positions(&self, request: &PositionRequest) -> Result<ProviderChart, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.always_fail || call < self.failures_before_success {
            return Err(ProviderError::CalculationFailed {
                body: "Sun".to_string(),
                timestamp: request.timestamp,
                message: "ephemeris offline".to_string(),
            });
        }
        Ok(ProviderChart {
            positions: sample_positions_at(request.timestamp),
            ascendant: self.ascendant,
        })
    }
}
