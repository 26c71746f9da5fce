pub mod adapter;
pub mod provider;
pub mod types;

pub use adapter::SwissEphemerisProvider;
pub use provider::{fetch_with_retry, PositionProvider, RetryPolicy};
pub use types::{
    CelestialBody, EphemerisSettings, GeoLocation, PositionRequest, ProviderChart, RawPosition,
    Zodiac,
};
