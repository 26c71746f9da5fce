use crate::ephemeris::GeoLocation;
use crate::error::ErrorReport;
use crate::refresh::schedule::DailySchedule;
use crate::service::{ChartQuery, HoroscopeService, QueryResponse};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

/// A chart recomputed every day at the scheduled instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceChart {
    pub name: String,
    pub location: GeoLocation,
    #[serde(default)]
    pub ascendant: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    pub schedule: DailySchedule,
    pub references: Vec<ReferenceChart>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            schedule: DailySchedule::default(),
            references: vec![ReferenceChart {
                name: "daily_transit".to_string(),
                location: GeoLocation { lat: 23.18, lon: 75.78 },
                ascendant: None,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartFailure {
    pub name: String,
    pub error: ErrorReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub day: NaiveDate,
    pub instant: DateTime<Utc>,
    pub refreshed: Vec<String>,
    pub failures: Vec<ChartFailure>,
    pub completed_at: DateTime<Utc>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Latest good result of a reference chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub day: NaiveDate,
    pub response: QueryResponse,
}

/// Recomputes the reference charts once per operational day.
///
/// Runs are serialized; a failed chart keeps its previous snapshot.
pub struct RefreshCoordinator {
    service: Arc<HoroscopeService>,
    config: RefreshConfig,
    gate: Mutex<()>,
    snapshots: RwLock<BTreeMap<String, Snapshot>>,
    last_report: RwLock<Option<RefreshReport>>,
}

impl RefreshCoordinator {
    pub fn new(service: Arc<HoroscopeService>, config: RefreshConfig) -> Self {
        Self {
            service,
            config,
            gate: Mutex::new(()),
            snapshots: RwLock::new(BTreeMap::new()),
            last_report: RwLock::new(None),
        }
    }

    pub fn schedule(&self) -> &DailySchedule {
        &self.config.schedule
    }

    pub fn service(&self) -> &Arc<HoroscopeService> {
        &self.service
    }

    /// Refresh for the operational day containing the current instant.
    pub async fn refresh_daily(&self) -> RefreshReport {
        self.refresh_at(Utc::now()).await
    }

    pub async fn refresh_at(&self, now: DateTime<Utc>) -> RefreshReport {
        let day = self.config.schedule.operational_day(now);
        self.refresh_day(day).await
    }

    /// Recompute every reference chart at `day`'s trigger instant.
    pub async fn refresh_day(&self, day: NaiveDate) -> RefreshReport {
        let _running = self.gate.lock().await;
        let instant = self.config.schedule.trigger_instant(day);
        info!(
            "Daily refresh for {} (reference instant {}, {} chart(s))",
            day,
            instant,
            self.config.references.len()
        );

        let mut refreshed = Vec::new();
        let mut failures = Vec::new();
        for reference in &self.config.references {
            let query = ChartQuery {
                timestamp: instant,
                location: reference.location,
                ascendant: reference.ascendant,
                catalog_version: None,
            };
            match self.service.refresh_query(&query).await {
                Ok(response) => {
                    self.snapshots
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(reference.name.clone(), Snapshot { day, response });
                    refreshed.push(reference.name.clone());
                }
                Err(err) => {
                    error!(
                        "Daily refresh of {} for {} failed, keeping previous snapshot: {}",
                        reference.name, day, err
                    );
                    failures.push(ChartFailure {
                        name: reference.name.clone(),
                        error: err.report(),
                    });
                }
            }
        }

        let report = RefreshReport {
            day,
            instant,
            refreshed,
            failures,
            completed_at: Utc::now(),
        };
        info!(
            "Daily refresh for {} finished: {} refreshed, {} failed",
            day,
            report.refreshed.len(),
            report.failures.len()
        );
        *self.last_report.write().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        report
    }

    pub fn snapshot(&self, name: &str) -> Option<Snapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn snapshots(&self) -> BTreeMap<String, Snapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
