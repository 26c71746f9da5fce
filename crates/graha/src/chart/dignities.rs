//! Dignity tables for the nine grahas.
//!
//! Exaltation and debilitation take precedence over own sign, matching the
//! Parashari reading where Mercury in Virgo counts as exalted.

use crate::chart::types::{Dignity, Sign};
use crate::ephemeris::CelestialBody;

/// Mercury, Jupiter and Venus in canonical order.
pub const NATURAL_BENEFICS: [CelestialBody; 3] = [
    CelestialBody::Mercury,
    CelestialBody::Jupiter,
    CelestialBody::Venus,
];

pub fn exaltation_sign(body: CelestialBody) -> Sign {
    match body {
        CelestialBody::Sun => Sign::Aries,
        CelestialBody::Moon => Sign::Taurus,
        CelestialBody::Mars => Sign::Capricorn,
        CelestialBody::Mercury => Sign::Virgo,
        CelestialBody::Jupiter => Sign::Cancer,
        CelestialBody::Venus => Sign::Pisces,
        CelestialBody::Saturn => Sign::Libra,
        CelestialBody::Rahu => Sign::Taurus,
        CelestialBody::Ketu => Sign::Scorpio,
    }
}

/// Always the sign opposite the exaltation.
pub fn debilitation_sign(body: CelestialBody) -> Sign {
    exaltation_sign(body).offset(6)
}

pub fn own_signs(body: CelestialBody) -> &'static [Sign] {
    match body {
        CelestialBody::Sun => &[Sign::Leo],
        CelestialBody::Moon => &[Sign::Cancer],
        CelestialBody::Mars => &[Sign::Aries, Sign::Scorpio],
        CelestialBody::Mercury => &[Sign::Gemini, Sign::Virgo],
        CelestialBody::Jupiter => &[Sign::Sagittarius, Sign::Pisces],
        CelestialBody::Venus => &[Sign::Taurus, Sign::Libra],
        CelestialBody::Saturn => &[Sign::Capricorn, Sign::Aquarius],
        CelestialBody::Rahu => &[Sign::Aquarius],
        CelestialBody::Ketu => &[Sign::Scorpio],
    }
}

/// Dignity of `body` when placed in `sign`.
pub fn dignity_of(body: CelestialBody, sign: Sign) -> Dignity {
    if exaltation_sign(body) == sign {
        Dignity::Exalted
    } else if debilitation_sign(body) == sign {
        Dignity::Debilitated
    } else if own_signs(body).contains(&sign) {
        Dignity::OwnSign
    } else {
        Dignity::Neutral
    }
}
