//! IVI scenario projection.
//!
//! Pure scoring math: applies what-if percentage adjustments to the three
//! pillar scores (Health, Experience, Utilization), derives the composite
//! IVI and its risk bucket, and expands a base/target pair into a monthly
//! trajectory for charting. No I/O, no shared state.

use chrono::{Local, Months, NaiveDate};
use rand::{Rng, RngExt};
use serde::Serialize;

use crate::types::RiskCategory;

/// Component weights of the composite IVI score. Domain constants; they
/// must sum to 1.0 so the composite stays a convex combination.
pub const HEALTH_WEIGHT: f64 = 0.4;
pub const EXPERIENCE_WEIGHT: f64 = 0.3;
pub const UTILIZATION_WEIGHT: f64 = 0.3;

/// Risk bucket thresholds on the composite score: at or above
/// [`LOW_RISK_THRESHOLD`] is Low, below [`HIGH_RISK_THRESHOLD`] is High,
/// everything between is Medium.
pub const LOW_RISK_THRESHOLD: f64 = 70.0;
pub const HIGH_RISK_THRESHOLD: f64 = 35.0;

/// Projected pillar scores and composite after applying adjustments.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedResult {
    pub projected_h: f64,
    pub projected_e: f64,
    pub projected_u: f64,
    pub projected_ivi: f64,
    pub risk_category: RiskCategory,
}

/// One point of a monthly IVI trajectory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProjectionPoint {
    /// Months from today, starting at 0.
    pub month: u32,
    /// Calendar date of the point, `YYYY-MM-DD`.
    pub date: String,
    pub ivi: f64,
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Risk bucket for a composite IVI score.
pub fn risk_category_for(ivi: f64) -> RiskCategory {
    if ivi >= LOW_RISK_THRESHOLD {
        RiskCategory::Low
    } else if ivi < HIGH_RISK_THRESHOLD {
        RiskCategory::High
    } else {
        RiskCategory::Medium
    }
}

/// Apply percentage adjustments to the three pillar scores and derive the
/// projected composite IVI and risk bucket.
///
/// Each pillar moves multiplicatively (`x * (1 + delta/100)`) and is clamped
/// to [0, 100] before weighting, so the composite is also in [0, 100].
/// Never fails; out-of-range inputs clamp rather than error. Values are
/// returned unrounded.
pub fn calculate_projected_ivi(
    h: f64,
    e: f64,
    u: f64,
    delta_h: f64,
    delta_e: f64,
    delta_u: f64,
) -> ProjectedResult {
    let projected_h = clamp_score(h * (1.0 + delta_h / 100.0));
    let projected_e = clamp_score(e * (1.0 + delta_e / 100.0));
    let projected_u = clamp_score(u * (1.0 + delta_u / 100.0));
    let projected_ivi =
        HEALTH_WEIGHT * projected_h + EXPERIENCE_WEIGHT * projected_e + UTILIZATION_WEIGHT * projected_u;

    ProjectedResult {
        projected_h,
        projected_e,
        projected_u,
        projected_ivi,
        risk_category: risk_category_for(projected_ivi),
    }
}

/// Expand a base/target IVI pair into a monthly trajectory using ambient
/// entropy. See [`generate_monthly_projections_with_rng`].
pub fn generate_monthly_projections(
    base_ivi: f64,
    target_ivi: f64,
    horizon_months: u32,
) -> Vec<MonthlyProjectionPoint> {
    let mut rng = rand::rng();
    generate_monthly_projections_with_rng(base_ivi, target_ivi, horizon_months, &mut rng)
}

/// Expand a base/target IVI pair into `horizon_months + 1` monthly points.
///
/// The pre-noise value interpolates linearly from `base_ivi` at month 0 to
/// `target_ivi` at the horizon; each point then gets uniform noise in
/// [-1, 1] and is clamped to [0, 100]. A zero horizon yields a single point
/// at the base value. Dates step forward one calendar month per point from
/// today (local time), clamping to month end where needed.
///
/// The generator is injected so tests can seed it; production callers use
/// [`generate_monthly_projections`].
pub fn generate_monthly_projections_with_rng(
    base_ivi: f64,
    target_ivi: f64,
    horizon_months: u32,
    rng: &mut impl Rng,
) -> Vec<MonthlyProjectionPoint> {
    let today = Local::now().date_naive();
    let monthly_change = if horizon_months == 0 {
        0.0
    } else {
        (target_ivi - base_ivi) / horizon_months as f64
    };

    let mut points = Vec::with_capacity(horizon_months as usize + 1);
    for month in 0..=horizon_months {
        let variance = (rng.random::<f64>() - 0.5) * 2.0;
        let ivi = clamp_score(base_ivi + monthly_change * month as f64 + variance);
        points.push(MonthlyProjectionPoint {
            month,
            date: project_date(today, month).format("%Y-%m-%d").to_string(),
            ivi,
        });
    }
    points
}

fn project_date(today: NaiveDate, months_ahead: u32) -> NaiveDate {
    today
        .checked_add_months(Months::new(months_ahead))
        .unwrap_or(today)
}
