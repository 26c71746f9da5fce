pub mod aspects;
pub mod dasha;
pub mod dignities;
pub mod houses;
pub mod normalizer;
pub mod types;

pub use aspects::AspectCalculator;
pub use dasha::{active_dasha, nakshatra_of, DashaFacts, DashaLevel};
pub use dignities::{
    debilitation_sign, dignity_of, exaltation_sign, own_signs, NATURAL_BENEFICS,
};
pub use houses::{aspected_houses, count_from, cusp_sign, house_number, nth_from, KENDRAS};
pub use normalizer::normalize;
pub use types::{
    angular_difference, normalize_degrees, AspectFact, AspectType, BodyFacts, ChartConfig,
    Dignity, FactSet, HouseSystem, Sign,
};
