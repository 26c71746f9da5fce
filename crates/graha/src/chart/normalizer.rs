use crate::chart::aspects::AspectCalculator;
use crate::chart::dasha::active_dasha;
use crate::chart::dignities::dignity_of;
use crate::chart::houses::{cusp_sign, house_number};
use crate::chart::types::{
    angular_difference, normalize_degrees, BodyFacts, ChartConfig, FactSet, Sign,
};
use crate::ephemeris::{CelestialBody, GeoLocation, RawPosition};
use crate::error::InputError;
use std::collections::BTreeMap;

/// Compile raw positions into a [`FactSet`].
///
/// Exactly one position is required for every body in `config.bodies`;
/// positions for other bodies are ignored. All required positions must share
/// one timestamp.
pub fn normalize(
    positions: &[RawPosition],
    ascendant: f64,
    location: Option<GeoLocation>,
    config: &ChartConfig,
) -> Result<FactSet, InputError> {
    if let Some(loc) = location {
        if !loc.is_valid() {
            return Err(InputError::InvalidLocation {
                lat: loc.lat,
                lon: loc.lon,
            });
        }
    }
    if !ascendant.is_finite() {
        return Err(InputError::InvalidValue {
            field: "ascendant".to_string(),
            value: ascendant,
        });
    }

    let selected = select_required(positions, config)?;

    let timestamp = match selected.values().next() {
        Some(first) => first.timestamp,
        None => {
            return Err(InputError::IncompleteInput {
                missing: Vec::new(),
                duplicated: Vec::new(),
            })
        }
    };
    for (body, position) in &selected {
        if position.timestamp != timestamp {
            return Err(InputError::InconsistentInput {
                body: *body,
                expected: timestamp,
                found: position.timestamp,
            });
        }
        check_finite(*body, "longitude", position.longitude)?;
        check_finite(*body, "daily_motion", position.daily_motion)?;
    }

    let ascendant = normalize_degrees(ascendant);
    let sun_longitude = selected
        .get(&CelestialBody::Sun)
        .map(|sun| normalize_degrees(sun.longitude));

    let mut bodies = BTreeMap::new();
    for (body, position) in &selected {
        let longitude = normalize_degrees(position.longitude);
        let sign = Sign::from_longitude(longitude);
        let combust = match (sun_longitude, config.combustion.get(body)) {
            (Some(sun), Some(threshold)) if *body != CelestialBody::Sun => {
                angular_difference(longitude, sun) < *threshold
            }
            _ => false,
        };
        bodies.insert(
            *body,
            BodyFacts {
                longitude,
                sign,
                house: house_number(longitude, ascendant, config.house_system),
                retrograde: position.daily_motion < 0.0,
                combust,
                dignity: dignity_of(*body, sign),
            },
        );
    }

    let ordered: Vec<(CelestialBody, f64)> = bodies
        .iter()
        .map(|(body, facts)| (*body, facts.longitude))
        .collect();
    let aspects = AspectCalculator::new().compute_aspect_graph(&ordered, config);

    let house_lords = (1..=12u8)
        .map(|house| (house, cusp_sign(house, ascendant, config.house_system).lord()))
        .collect();

    let dasha = bodies
        .get(&CelestialBody::Moon)
        .map(|moon| active_dasha(moon.longitude, timestamp, timestamp));

    Ok(FactSet {
        timestamp,
        location,
        house_system: config.house_system,
        ascendant,
        ascendant_sign: Sign::from_longitude(ascendant),
        bodies,
        aspects,
        house_lords,
        dasha,
    })
}

/// Pick the single position of every required body, reporting gaps and repeats.
fn select_required<'a>(
    positions: &'a [RawPosition],
    config: &ChartConfig,
) -> Result<BTreeMap<CelestialBody, &'a RawPosition>, InputError> {
    let mut selected: BTreeMap<CelestialBody, &RawPosition> = BTreeMap::new();
    let mut duplicated = Vec::new();

    for position in positions {
        if !config.bodies.contains(&position.body) {
            continue;
        }
        if selected.insert(position.body, position).is_some()
            && !duplicated.contains(&position.body)
        {
            duplicated.push(position.body);
        }
    }

    let mut missing: Vec<CelestialBody> = config
        .bodies
        .iter()
        .filter(|body| !selected.contains_key(body))
        .copied()
        .collect();

    if missing.is_empty() && duplicated.is_empty() {
        return Ok(selected);
    }
    missing.sort();
    missing.dedup();
    duplicated.sort();
    Err(InputError::IncompleteInput {
        missing,
        duplicated,
    })
}

fn check_finite(body: CelestialBody, field: &str, value: f64) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::InvalidValue {
            field: format!("{body}.{field}"),
            value,
        })
    }
}
