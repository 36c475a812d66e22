//! Analytics core for corporate health-insurance clients.
//!
//! Two halves:
//! - Scoring: the Intelligent Value Index (IVI) weighted from Health,
//!   Experience, and Utilization components, what-if projections with
//!   month-by-month trajectories ([`projection`]), and the action
//!   recommendation catalog keyed off the same adjustments
//!   ([`recommendations`]).
//! - Alerting: a background [`AlertScheduler`] that watches persisted
//!   risk-category transitions and dispatches at-most-once owner
//!   notifications on a day/time schedule, backed by SQLite ([`db`]) and a
//!   webhook notifier ([`notification`]).

pub mod db;
pub mod error;
pub mod notification;
pub mod projection;
pub mod recommendations;
pub mod scheduler;
pub mod types;

pub use db::{AlertDb, AlertStore, DbError, SqliteAlertStore};
pub use error::SchedulerError;
pub use notification::{Notifier, OwnerNotification, WebhookNotifier};
pub use projection::{
    calculate_projected_ivi, generate_monthly_projections, generate_monthly_projections_with_rng,
    MonthlyProjectionPoint, ProjectedResult,
};
pub use recommendations::{
    calculate_total_impact, generate_recommendations, implementation_roadmap, ActionItem,
    ImpactSummary, RoadmapPhase,
};
pub use scheduler::AlertScheduler;
pub use types::{
    DispatchSummary, NewRiskChangeAlert, RiskCategory, RiskChangeAlert, RunStatus,
    SchedulerSettings, SchedulerStatus, SettingsUpdate,
};
