//! Engine configuration read from `configs/engine.toml`.
//!
//! The TOML shape uses plain strings for bodies, aspects and offsets; they are
//! resolved into typed values here so a bad key fails at startup with the
//! offending field named.

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::chart::{AspectType, ChartConfig, HouseSystem};
use crate::ephemeris::{CelestialBody, EphemerisSettings, GeoLocation, RetryPolicy, Zodiac};
use crate::refresh::{DailySchedule, RefreshConfig, ReferenceChart};
use crate::rules::{CatalogLimits, DEFAULT_SCORE_SCALE};
use anyhow::{anyhow, bail, Context};
use chrono::Duration as ChronoDuration;
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "GRAHA_CONFIG";
const CANDIDATE_PATHS: [&str; 2] = ["configs/engine.toml", "../../configs/engine.toml"];

/// Fully resolved engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub catalog_path: PathBuf,
    pub limits: CatalogLimits,
    pub ephemeris: EphemerisSettings,
    pub chart: ChartConfig,
    pub retry: RetryPolicy,
    pub refresh: RefreshConfig,
    pub score_scale: f64,
    /// Most result-cache entries kept in memory.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let chart = ChartConfig::default();
        Self {
            catalog_path: PathBuf::from("rules/bphs_level2.json"),
            limits: CatalogLimits {
                bodies: chart.bodies.clone(),
                ..CatalogLimits::default()
            },
            ephemeris: EphemerisSettings::default(),
            chart,
            retry: RetryPolicy::default(),
            refresh: RefreshConfig::default(),
            score_scale: DEFAULT_SCORE_SCALE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RootToml {
    catalog: CatalogToml,
    ephemeris: EphemerisToml,
    chart: ChartToml,
    provider: ProviderToml,
    refresh: RefreshToml,
    scoring: ScoringToml,
    cache: CacheToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogToml {
    path: Option<PathBuf>,
    max_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EphemerisToml {
    path: Option<PathBuf>,
    zodiac: Option<String>,
    ayanamsa: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartToml {
    bodies: Option<Vec<String>>,
    house_system: Option<String>,
    combustion: BTreeMap<String, f64>,
    orbs: BTreeMap<String, f64>,
    body_orbs: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderToml {
    timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RefreshToml {
    local_time: Option<String>,
    utc_offset: Option<String>,
    misfire_grace_secs: Option<i64>,
    references: Option<Vec<ReferenceToml>>,
}

#[derive(Debug, Deserialize)]
struct ReferenceToml {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    ascendant: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScoringToml {
    scale: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheToml {
    capacity: Option<usize>,
}

/// Locate and load the engine configuration.
///
/// Looks at `explicit`, then `$GRAHA_CONFIG`, then the usual relative paths.
/// Falls back to built-in defaults when no file exists at the relative paths.
pub fn load_engine_config(explicit: Option<&Path>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = explicit {
        return load_engine_config_file(path);
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load_engine_config_file(Path::new(&path));
    }
    for candidate in &CANDIDATE_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            return load_engine_config_file(path);
        }
    }
    warn!(
        "No engine config found at {:?}; using built-in defaults",
        CANDIDATE_PATHS
    );
    Ok(EngineConfig::default())
}

pub fn load_engine_config_file(path: &Path) -> anyhow::Result<EngineConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read engine config {}", path.display()))?;
    let config = parse_engine_config(&text)
        .with_context(|| format!("Invalid engine config {}", path.display()))?;
    info!("Loaded engine config from {}", path.display());
    Ok(config)
}

/// Parse TOML text into a resolved [`EngineConfig`].
pub fn parse_engine_config(text: &str) -> anyhow::Result<EngineConfig> {
    let root: RootToml =
        toml::from_str(text).map_err(|e| anyhow!("Failed to parse engine config: {e}"))?;
    let defaults = EngineConfig::default();

    let chart = resolve_chart(root.chart)?;
    let limits = CatalogLimits {
        max_depth: root.catalog.max_depth.unwrap_or(defaults.limits.max_depth),
        bodies: chart.bodies.clone(),
    };
    if limits.max_depth == 0 {
        bail!("catalog.max_depth must be at least 1");
    }

    let score_scale = root.scoring.scale.unwrap_or(defaults.score_scale);
    if !score_scale.is_finite() || score_scale <= 0.0 {
        bail!("scoring.scale must be a positive number, got {score_scale}");
    }

    let cache_capacity = root.cache.capacity.unwrap_or(defaults.cache_capacity);
    if cache_capacity == 0 {
        bail!("cache.capacity must be at least 1");
    }

    Ok(EngineConfig {
        catalog_path: root.catalog.path.unwrap_or(defaults.catalog_path),
        limits,
        ephemeris: resolve_ephemeris(root.ephemeris)?,
        chart,
        retry: resolve_retry(root.provider, defaults.retry)?,
        refresh: resolve_refresh(root.refresh)?,
        score_scale,
        cache_capacity,
    })
}

fn resolve_ephemeris(raw: EphemerisToml) -> anyhow::Result<EphemerisSettings> {
    let defaults = EphemerisSettings::default();
    let zodiac = match raw.zodiac.as_deref().map(|z| z.trim().to_lowercase()) {
        None => defaults.zodiac,
        Some(z) if z == "sidereal" => Zodiac::Sidereal,
        Some(z) if z == "tropical" => Zodiac::Tropical,
        Some(other) => bail!("ephemeris.zodiac must be 'sidereal' or 'tropical', got '{other}'"),
    };
    Ok(EphemerisSettings {
        zodiac,
        ayanamsa: raw.ayanamsa.or(defaults.ayanamsa),
        data_path: raw.path,
    })
}

fn resolve_chart(raw: ChartToml) -> anyhow::Result<ChartConfig> {
    let mut chart = ChartConfig::default();

    if let Some(names) = raw.bodies {
        let mut bodies = Vec::with_capacity(names.len());
        for name in &names {
            let body = parse_body(name, "chart.bodies")?;
            if bodies.contains(&body) {
                bail!("chart.bodies lists {body} twice");
            }
            bodies.push(body);
        }
        if bodies.is_empty() {
            bail!("chart.bodies must name at least one body");
        }
        bodies.sort();
        chart.bodies = bodies;
    }

    if let Some(system) = raw.house_system {
        chart.house_system = system
            .parse::<HouseSystem>()
            .map_err(|e| anyhow!("chart.house_system: {e}"))?;
    }

    for (name, threshold) in raw.combustion {
        let body = parse_body(&name, "chart.combustion")?;
        check_degrees(threshold, &format!("chart.combustion.{name}"))?;
        chart.combustion.insert(body, threshold);
    }

    for (name, orb) in raw.orbs {
        let aspect = parse_aspect(&name, "chart.orbs")?;
        check_degrees(orb, &format!("chart.orbs.{name}"))?;
        chart.orbs.insert(aspect, orb);
    }

    for (body_name, overrides) in raw.body_orbs {
        let body = parse_body(&body_name, "chart.body_orbs")?;
        let entry = chart.body_orbs.entry(body).or_default();
        for (aspect_name, orb) in overrides {
            let aspect = parse_aspect(&aspect_name, &format!("chart.body_orbs.{body_name}"))?;
            check_degrees(orb, &format!("chart.body_orbs.{body_name}.{aspect_name}"))?;
            entry.insert(aspect, orb);
        }
    }

    Ok(chart)
}

fn resolve_retry(raw: ProviderToml, defaults: RetryPolicy) -> anyhow::Result<RetryPolicy> {
    let policy = RetryPolicy {
        timeout: raw
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout),
        max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts),
        initial_backoff: raw
            .initial_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_backoff),
        max_backoff: raw
            .max_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_backoff),
    };
    if policy.max_attempts == 0 {
        bail!("provider.max_attempts must be at least 1");
    }
    if policy.timeout.is_zero() {
        bail!("provider.timeout_ms must be positive");
    }
    Ok(policy)
}

fn resolve_refresh(raw: RefreshToml) -> anyhow::Result<RefreshConfig> {
    let defaults = RefreshConfig::default();
    let mut schedule = match (&raw.local_time, &raw.utc_offset) {
        (None, None) => defaults.schedule,
        (local_time, utc_offset) => DailySchedule::parse(
            local_time.as_deref().unwrap_or("00:05"),
            utc_offset.as_deref().unwrap_or("+05:30"),
        )
        .map_err(|e| anyhow!("refresh: {e}"))?,
    };
    if let Some(secs) = raw.misfire_grace_secs {
        if secs < 0 {
            bail!("refresh.misfire_grace_secs must not be negative");
        }
        schedule.misfire_grace = ChronoDuration::seconds(secs);
    }

    let references = match raw.references {
        None => defaults.references,
        Some(list) => {
            let mut references: Vec<ReferenceChart> = Vec::with_capacity(list.len());
            for item in list {
                let location = GeoLocation { lat: item.lat, lon: item.lon };
                if !location.is_valid() {
                    bail!("refresh.references.{}: invalid location {:?}", item.name, location);
                }
                if references.iter().any(|r| r.name == item.name) {
                    bail!("refresh.references: duplicate name '{}'", item.name);
                }
                references.push(ReferenceChart {
                    name: item.name,
                    location,
                    ascendant: item.ascendant,
                });
            }
            references
        }
    };

    Ok(RefreshConfig { schedule, references })
}

fn parse_body(name: &str, field: &str) -> anyhow::Result<CelestialBody> {
    name.parse::<CelestialBody>()
        .map_err(|e| anyhow!("{field}: {e}"))
}

fn parse_aspect(name: &str, field: &str) -> anyhow::Result<AspectType> {
    name.parse::<AspectType>()
        .map_err(|e| anyhow!("{field}: {e}"))
}

fn check_degrees(value: f64, field: &str) -> anyhow::Result<()> {
    if !value.is_finite() || !(0.0..=180.0).contains(&value) {
        bail!("{field} must be between 0 and 180 degrees, got {value}");
    }
    Ok(())
}
