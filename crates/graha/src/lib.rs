//! Chart-to-facts compiler and rule engine for BPHS horoscope rules.
//!
//! Raw planetary positions are normalized into an immutable [`chart::FactSet`],
//! evaluated against a versioned [`rules::RuleCatalog`] and memoized in a
//! [`cache::ResultCache`]. [`service::HoroscopeService`] ties these together
//! and [`refresh::RefreshCoordinator`] recomputes the daily reference charts.

pub mod cache;
pub mod chart;
pub mod config;
pub mod ephemeris;
pub mod error;
pub mod refresh;
pub mod rules;
pub mod service;

pub use error::{EngineError, ErrorKind, ErrorReport};
pub use service::{ChartQuery, HoroscopeService, QueryResponse};
