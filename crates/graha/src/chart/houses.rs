use crate::chart::types::{normalize_degrees, HouseSystem, Sign};
use crate::ephemeris::CelestialBody;

pub const KENDRAS: [u8; 4] = [1, 4, 7, 10];

/// House number (1-12) of a longitude for the given ascendant.
pub fn house_number(longitude: f64, ascendant: f64, system: HouseSystem) -> u8 {
    match system {
        HouseSystem::Equal => {
            let diff = normalize_degrees(longitude - ascendant);
            ((diff / 30.0).floor() as u8).min(11) + 1
        }
        HouseSystem::WholeSign => {
            let sign = Sign::from_longitude(longitude).number();
            let lagna = Sign::from_longitude(ascendant).number();
            (sign + 12 - lagna) % 12 + 1
        }
    }
}

/// Sign on the cusp of `house`.
pub fn cusp_sign(house: u8, ascendant: f64, system: HouseSystem) -> Sign {
    match system {
        HouseSystem::Equal => Sign::from_longitude(ascendant + (house as f64 - 1.0) * 30.0),
        HouseSystem::WholeSign => Sign::from_longitude(ascendant).offset(house - 1),
    }
}

/// House counted `nth` from `house`, where the house itself is the 1st.
pub fn nth_from(house: u8, nth: u8) -> u8 {
    (house - 1 + nth - 1) % 12 + 1
}

/// Position of `to` counted from `from`, the inverse of [`nth_from`].
pub fn count_from(from: u8, to: u8) -> u8 {
    (to + 12 - from) % 12 + 1
}

/// Houses (counted from the body's own) that a graha aspects in full.
fn drishti_counts(body: CelestialBody) -> &'static [u8] {
    match body {
        CelestialBody::Mars => &[4, 7, 8],
        CelestialBody::Jupiter => &[5, 7, 9],
        CelestialBody::Saturn => &[3, 7, 10],
        _ => &[7],
    }
}

/// Houses receiving the full aspect of `body` placed in `house`.
pub fn aspected_houses(body: CelestialBody, house: u8) -> Vec<u8> {
    drishti_counts(body)
        .iter()
        .map(|nth| nth_from(house, *nth))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_house_number() {
        let asc = 0.0; // Aries rising
        assert_eq!(house_number(0.0, asc, HouseSystem::Equal), 1);
        assert_eq!(house_number(30.0, asc, HouseSystem::Equal), 2);
        assert_eq!(house_number(90.0, asc, HouseSystem::Equal), 4);
        assert_eq!(house_number(359.9, asc, HouseSystem::Equal), 12);
        // cusp at 15 Libra
        assert_eq!(house_number(14.0, 195.0, HouseSystem::Equal), 6);
        assert_eq!(house_number(16.0, 195.0, HouseSystem::Equal), 7);
    }

    #[test]
    fn test_whole_sign_house_number() {
        // Taurus lagna, Jupiter in Gemini is in the 2nd
        assert_eq!(house_number(75.0, 40.0, HouseSystem::WholeSign), 2);
        // Libra lagna, Mars in Aries is in the 7th
        assert_eq!(house_number(10.0, 200.0, HouseSystem::WholeSign), 7);
        assert_eq!(house_number(200.0, 205.0, HouseSystem::WholeSign), 1);
        assert_eq!(house_number(200.0, 229.0, HouseSystem::WholeSign), 12);
    }

    #[test]
    fn test_cusp_sign() {
        assert_eq!(cusp_sign(1, 200.0, HouseSystem::WholeSign), Sign::Libra);
        assert_eq!(cusp_sign(10, 200.0, HouseSystem::WholeSign), Sign::Cancer);
        assert_eq!(cusp_sign(2, 25.0, HouseSystem::Equal), Sign::Taurus);
        assert_eq!(cusp_sign(2, 35.0, HouseSystem::Equal), Sign::Gemini);
    }

    #[test]
    fn test_count_from() {
        assert_eq!(count_from(8, 8), 1);
        assert_eq!(count_from(8, 7), 12);
        assert_eq!(count_from(8, 10), 3);
        for from in 1..=12 {
            for nth in 1..=12 {
                assert_eq!(count_from(from, nth_from(from, nth)), nth);
            }
        }
    }

    #[test]
    fn test_special_aspects() {
        assert_eq!(aspected_houses(CelestialBody::Mars, 1), vec![4, 7, 8]);
        assert_eq!(aspected_houses(CelestialBody::Jupiter, 10), vec![2, 4, 6]);
        assert_eq!(aspected_houses(CelestialBody::Saturn, 12), vec![2, 6, 9]);
        assert_eq!(aspected_houses(CelestialBody::Venus, 3), vec![9]);
    }
}
