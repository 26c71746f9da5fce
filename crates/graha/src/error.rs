//! Error taxonomy shared by the normalizer, catalog, engine and service.
//!
//! Every failure a caller can see maps onto one [`ErrorKind`], which tells a
//! transport whether to answer "fix your input", "try again later" or
//! "service misconfigured".

use crate::ephemeris::CelestialBody;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed or incomplete chart input. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Incomplete positions: missing {missing:?}, duplicated {duplicated:?}")]
    IncompleteInput {
        missing: Vec<CelestialBody>,
        duplicated: Vec<CelestialBody>,
    },
    #[error("Inconsistent positions: {body} is timestamped {found}, expected {expected}")]
    InconsistentInput {
        body: CelestialBody,
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: f64 },
    #[error("Invalid location: lat {lat}, lon {lon}")]
    InvalidLocation { lat: f64, lon: f64 },
    #[error("No ascendant supplied and the position provider did not compute one")]
    MissingAscendant,
    #[error("Unknown catalog version {requested} (loaded: {loaded})")]
    UnknownCatalogVersion { requested: String, loaded: String },
}

/// Failure of the external position provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Ephemeris file not found at path: {path}. {message}")]
    FileNotFound { path: String, message: String },
    #[error("Invalid ayanamsa: {ayanamsa}. Valid ayanamsas: {valid:?}")]
    InvalidAyanamsa { ayanamsa: String, valid: Vec<String> },
    #[error("Failed to calculate position for {body} at {timestamp}: {message}")]
    CalculationFailed {
        body: String,
        timestamp: DateTime<Utc>,
        message: String,
    },
    #[error("Position provider timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("Position provider unavailable after {attempts} attempt(s): {message}")]
    Unavailable { attempts: u32, message: String },
}

/// A single rejected catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleIssue {
    pub rule_id: String,
    pub reason: String,
}

/// The catalog failed validation. Lists every offending rule.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", describe_issues(.issues))]
pub struct CatalogValidationError {
    pub issues: Vec<RuleIssue>,
}

impl CatalogValidationError {
    pub fn single(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            issues: vec![RuleIssue {
                rule_id: rule_id.into(),
                reason: reason.into(),
            }],
        }
    }

    /// Offending ids in report order, without repeats.
    pub fn offending_ids(&self) -> Vec<&str> {
        unique_ids(&self.issues)
    }
}

fn unique_ids(issues: &[RuleIssue]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for issue in issues {
        if !ids.contains(&issue.rule_id.as_str()) {
            ids.push(issue.rule_id.as_str());
        }
    }
    ids
}

fn describe_issues(issues: &[RuleIssue]) -> String {
    let ids = unique_ids(issues);
    let mut out = format!(
        "Rule catalog failed validation ({} issue(s) in {})",
        issues.len(),
        ids.join(", ")
    );
    for issue in issues {
        out.push_str(&format!("; {}: {}", issue.rule_id, issue.reason));
    }
    out
}

/// A rule needed a fact the normalizer did not produce. Indicates a contract
/// mismatch between the catalog and the chart configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationInvariantError {
    #[error("Rule {rule_id} references {body}, which is absent from the fact set")]
    MissingBody { rule_id: String, body: CelestialBody },
    #[error(
        "Rule {rule_id} references the lord of house {house}, which is absent from the fact set"
    )]
    MissingHouseLord { rule_id: String, house: u8 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    CatalogValidation(#[from] CatalogValidationError),
    #[error(transparent)]
    ProviderUnavailable(#[from] ProviderError),
    #[error(transparent)]
    EvaluationInvariant(#[from] EvaluationInvariantError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    CatalogValidation,
    ProviderUnavailable,
    EvaluationInvariant,
}

/// Transport-facing shape of an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Input(_) => ErrorKind::Input,
            EngineError::CatalogValidation(_) => ErrorKind::CatalogValidation,
            EngineError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            EngineError::EvaluationInvariant(_) => ErrorKind::EvaluationInvariant,
        }
    }

    /// Only provider outages are worth retrying; everything else needs a fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ProviderUnavailable(_))
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}
