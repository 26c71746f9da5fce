pub mod coordinator;
pub mod schedule;

pub use coordinator::{
    ChartFailure, RefreshConfig, RefreshCoordinator, RefreshReport, ReferenceChart, Snapshot,
};
pub use schedule::{parse_utc_offset, DailySchedule};
