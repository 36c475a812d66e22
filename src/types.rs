//! Shared types for the IVI analytics core.
//!
//! Everything glue-facing serializes as camelCase JSON, matching the shapes
//! the dashboard and admin API exchange.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Risk bucket derived from a client's IVI score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(RiskCategory::Low),
            "Medium" => Some(RiskCategory::Medium),
            "High" => Some(RiskCategory::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome classification of one scheduled dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            "partial" => Some(RunStatus::Partial),
            _ => None,
        }
    }
}

/// A persisted risk-category transition for one corporate client.
///
/// Created by the detection process whenever a client's bucket changes
/// between two scoring snapshots; flipped to sent exactly once by the
/// scheduler (or a manual send), never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskChangeAlert {
    pub id: i64,
    /// Contract number identifying the client.
    pub cont_no: String,
    pub company_name: String,
    pub previous_risk: RiskCategory,
    pub new_risk: RiskCategory,
    pub previous_score: Option<String>,
    pub new_score: Option<String>,
    pub notification_sent: bool,
    /// RFC 3339; None while the alert is pending.
    pub sent_at: Option<String>,
    pub created_at: String,
}

/// Insert form for [`RiskChangeAlert`], used by the detection glue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRiskChangeAlert {
    pub cont_no: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub previous_risk: RiskCategory,
    pub new_risk: RiskCategory,
    #[serde(default)]
    pub previous_score: Option<String>,
    #[serde(default)]
    pub new_score: Option<String>,
}

/// Singleton scheduler configuration plus last/next-run bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    pub is_enabled: bool,
    /// "HH:MM", 24-hour local time.
    pub scheduled_time: String,
    /// Comma-separated day numbers, 0=Sunday .. 6=Saturday.
    pub days_of_week: String,
    pub last_run_at: Option<DateTime<Local>>,
    pub last_run_status: Option<RunStatus>,
    pub last_run_count: i64,
    pub last_run_error: Option<String>,
    pub next_run_at: Option<DateTime<Local>>,
    pub updated_at: String,
}

/// Validated mutation payload for scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub is_enabled: bool,
    pub scheduled_time: String,
    pub days_of_week: String,
}

/// Read-only scheduler snapshot for the admin surface.
///
/// Falls back to the stock schedule (09:00, Monday through Friday) when no
/// settings row exists yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_enabled: bool,
    pub is_running: bool,
    pub scheduled_time: String,
    pub days_of_week: String,
    pub last_run_at: Option<DateTime<Local>>,
    pub next_run_at: Option<DateTime<Local>>,
    pub last_run_status: Option<RunStatus>,
    pub last_run_count: i64,
}

/// One append-only record of a notification attempt for an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLogEntry {
    pub id: i64,
    pub notification_type: String,
    pub alert_id: Option<i64>,
    pub cont_no: Option<String>,
    pub company_name: Option<String>,
    pub title: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Insert form for [`NotificationLogEntry`].
#[derive(Debug, Clone)]
pub struct NewNotificationLog {
    pub notification_type: String,
    pub alert_id: i64,
    pub cont_no: String,
    pub company_name: String,
    pub title: String,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Per-run dispatch counts returned by the alert-processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl DispatchSummary {
    /// Run classification: all-clear is success, nothing-delivered-with-
    /// failures is failed, anything in between is partial.
    pub fn run_status(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Success
        } else if self.sent == 0 {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_category_round_trip() {
        for cat in [RiskCategory::Low, RiskCategory::Medium, RiskCategory::High] {
            assert_eq!(RiskCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(RiskCategory::parse("Severe"), None);
    }

    #[test]
    fn test_run_status_classification() {
        let all_sent = DispatchSummary { sent: 3, failed: 0, skipped: 1 };
        assert_eq!(all_sent.run_status(), RunStatus::Success);

        let none_sent = DispatchSummary { sent: 0, failed: 2, skipped: 0 };
        assert_eq!(none_sent.run_status(), RunStatus::Failed);

        let mixed = DispatchSummary { sent: 1, failed: 1, skipped: 0 };
        assert_eq!(mixed.run_status(), RunStatus::Partial);

        // A run that only skipped alerts still counts as success.
        let only_skips = DispatchSummary { sent: 0, failed: 0, skipped: 4 };
        assert_eq!(only_skips.run_status(), RunStatus::Success);
    }

    #[test]
    fn test_alert_serializes_camel_case() {
        let alert = RiskChangeAlert {
            id: 7,
            cont_no: "C-1001".to_string(),
            company_name: "Acme Industries".to_string(),
            previous_risk: RiskCategory::Medium,
            new_risk: RiskCategory::High,
            previous_score: Some("48.2".to_string()),
            new_score: Some("31.9".to_string()),
            notification_sent: false,
            sent_at: None,
            created_at: "2026-01-05T09:00:00+03:00".to_string(),
        };
        let json = serde_json::to_value(&alert).expect("serialize");
        assert_eq!(json["contNo"], "C-1001");
        assert_eq!(json["previousRisk"], "Medium");
        assert_eq!(json["newRisk"], "High");
        assert!(json["sentAt"].is_null());
    }
}
