use crate::ephemeris::provider::PositionProvider;
use crate::ephemeris::types::{
    CelestialBody, EphemerisSettings, GeoLocation, PositionRequest, ProviderChart, RawPosition,
    Zodiac,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use log::debug;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use swisseph::swe::{calc_ut, houses_ex, julday, set_ephe_path};

// Swiss Ephemeris body codes. Ketu has no code; it is derived from Rahu.
const BODY_CODES: &[(CelestialBody, u32)] = &[
    (CelestialBody::Sun, 0),
    (CelestialBody::Moon, 1),
    (CelestialBody::Mercury, 2),
    (CelestialBody::Venus, 3),
    (CelestialBody::Mars, 4),
    (CelestialBody::Jupiter, 5),
    (CelestialBody::Saturn, 6),
    (CelestialBody::Rahu, 11), // TRUE_NODE
];

/// Ayanamsa names accepted for the sidereal zodiac (Swiss SIDM_* constants).
const AYANAMSAS: &[(&str, i32)] = &[
    ("lahiri", 1),
    ("chitrapaksha", 1),
    ("fagan_bradley", 0),
    ("de_luce", 2),
    ("raman", 3),
    ("krishnamurti", 5),
    ("yukteshwar", 7),
    ("true_citra", 27),
];

const FLG_SWIEPH: i32 = 2;
const FLG_SPEED: i32 = 256;
const FLG_SIDEREAL: i32 = 64;
const GREG_CAL: u32 = 1;

static SWE_LOCK: Mutex<()> = Mutex::new(());

/// [`PositionProvider`] backed by the Swiss Ephemeris.
///
/// The C library keeps the data path and the ayanamsa as global state, so
/// both are applied under a process-wide lock before every calculation, which
/// runs on the blocking pool.
pub struct SwissEphemerisProvider {
    ephemeris_path: PathBuf,
    flags: i32,
    sidereal_mode: Option<i32>,
}

impl SwissEphemerisProvider {
    pub fn new(settings: &EphemerisSettings) -> Result<Self, ProviderError> {
        let path = settings.data_path.clone().unwrap_or_else(|| {
            env::var("SWISS_EPHEMERIS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/usr/local/share/swisseph"))
        });

        if !path.exists() {
            return Err(ProviderError::FileNotFound {
                path: path.display().to_string(),
                message: "Ephemeris path does not exist. \
                          Please ensure Swiss Ephemeris data files are installed."
                    .to_string(),
            });
        }
        // handed to the C library as a C string
        if path.to_str().map_or(true, |text| text.contains('\0')) {
            return Err(ProviderError::FileNotFound {
                path: path.display().to_string(),
                message: "Ephemeris path must be valid UTF-8 without NUL bytes.".to_string(),
            });
        }

        let mut flags = FLG_SWIEPH | FLG_SPEED;
        let sidereal_mode = match settings.zodiac {
            Zodiac::Tropical => None,
            Zodiac::Sidereal => {
                flags |= FLG_SIDEREAL;
                Some(resolve_ayanamsa(settings.ayanamsa.as_deref())?)
            }
        };

        Ok(Self {
            ephemeris_path: path,
            flags,
            sidereal_mode,
        })
    }

    pub fn ephemeris_path(&self) -> &Path {
        &self.ephemeris_path
    }

    /// Swiss `SIDM_*` mode applied before each calculation; `None` when tropical.
    pub fn sidereal_mode(&self) -> Option<i32> {
        self.sidereal_mode
    }
}

#[async_trait]
impl PositionProvider for SwissEphemerisProvider {
    async fn positions(&self, request: &PositionRequest) -> Result<ProviderChart, ProviderError> {
        let request = request.clone();
        let timestamp = request.timestamp;
        let flags = self.flags;
        let sidereal_mode = self.sidereal_mode;
        // checked to be UTF-8 in `new`
        let path = self.ephemeris_path.to_string_lossy().into_owned();

        tokio::task::spawn_blocking(move || {
            // a poisoned lock only means another calculation panicked
            let _guard = SWE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            apply_settings(&path, sidereal_mode);
            calc_chart(&request, flags)
        })
        .await
        .map_err(|err| ProviderError::CalculationFailed {
            body: "chart".to_string(),
            timestamp,
            message: format!("Ephemeris task failed: {}", err),
        })?
    }
}

/// Select the data files and the ayanamsa. Callers hold `SWE_LOCK`.
fn apply_settings(path: &str, sidereal_mode: Option<i32>) {
    set_ephe_path(path);
    if let Some(mode) = sidereal_mode {
        // SAFETY: value arguments only; the library's global state is guarded by SWE_LOCK
        unsafe { libswisseph_sys::swe_set_sid_mode(mode, 0.0, 0.0) };
    }
}

fn calc_chart(request: &PositionRequest, flags: i32) -> Result<ProviderChart, ProviderError> {
    let jd = datetime_to_julian_day(request.timestamp);
    debug!("Calculating {} bodies at JD {:.5}", request.bodies.len(), jd);

    let mut positions = Vec::with_capacity(request.bodies.len());
    for body in &request.bodies {
        let position = match body {
            CelestialBody::Ketu => {
                let rahu = calc_body(CelestialBody::Rahu, request.timestamp, jd, flags)?;
                RawPosition {
                    body: CelestialBody::Ketu,
                    longitude: (rahu.longitude + 180.0) % 360.0,
                    latitude: -rahu.latitude,
                    daily_motion: rahu.daily_motion,
                    timestamp: request.timestamp,
                }
            }
            other => calc_body(*other, request.timestamp, jd, flags)?,
        };
        positions.push(position);
    }

    Ok(ProviderChart {
        positions,
        ascendant: Some(calc_ascendant(jd, request.location, flags)),
    })
}

fn calc_body(
    body: CelestialBody,
    timestamp: DateTime<Utc>,
    jd: f64,
    flags: i32,
) -> Result<RawPosition, ProviderError> {
    let code = BODY_CODES
        .iter()
        .find(|(candidate, _)| *candidate == body)
        .map(|(_, code)| *code)
        .ok_or_else(|| ProviderError::CalculationFailed {
            body: body.to_string(),
            timestamp,
            message: format!("No ephemeris code for {}", body),
        })?;

    let result = calc_ut(jd, code, flags as u32).map_err(|e| ProviderError::CalculationFailed {
        body: body.to_string(),
        timestamp,
        message: format!("Swiss Ephemeris error: {}", e),
    })?;

    Ok(RawPosition {
        body,
        longitude: result.out[0] % 360.0,
        latitude: result.out[1],
        daily_motion: result.out[3],
        timestamp,
    })
}

fn calc_ascendant(jd: f64, location: GeoLocation, flags: i32) -> f64 {
    use swisseph::AscMc;
    let (_cusps, angles) = houses_ex(jd, flags, location.lat, location.lon, b'E' as i32);
    AscMc::from_array(angles).ascendant % 360.0
}

fn resolve_ayanamsa(ayanamsa: Option<&str>) -> Result<i32, ProviderError> {
    let ayanamsa = ayanamsa.unwrap_or("lahiri");
    AYANAMSAS
        .iter()
        .find(|(name, _)| *name == ayanamsa.to_lowercase())
        .map(|(_, mode)| *mode)
        .ok_or_else(|| ProviderError::InvalidAyanamsa {
            ayanamsa: ayanamsa.to_string(),
            valid: AYANAMSAS.iter().map(|(name, _)| name.to_string()).collect(),
        })
}

fn datetime_to_julian_day(dt: DateTime<Utc>) -> f64 {
    let hour_decimal =
        dt.hour() as f64 + dt.minute() as f64 / 60.0 + dt.second() as f64 / 3600.0;
    julday(dt.year(), dt.month() as i32, dt.day() as i32, hour_decimal, GREG_CAL)
}
