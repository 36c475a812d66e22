//! Owner notification delivery.
//!
//! Builders render the alert messages; [`Notifier`] abstracts the delivery
//! channel so dispatch logic can be tested without network access. The
//! production channel POSTs the message as JSON to a configured webhook.

use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;

use crate::types::RiskChangeAlert;

/// A rendered message for the account owner.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerNotification {
    pub title: String,
    pub content: String,
}

/// Delivery channel for owner notifications.
///
/// Returns plain success/failure rather than a Result: a failed delivery is
/// an expected outcome the dispatch loop records and moves past, not a fault
/// that should abort the batch.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_owner(&self, note: &OwnerNotification) -> bool;
}

fn score_or_dash(score: Option<&str>) -> &str {
    match score {
        Some(s) if !s.is_empty() => s,
        _ => "-",
    }
}

/// Urgent message for a Medium to High escalation.
pub fn escalation_notification(alert: &RiskChangeAlert) -> OwnerNotification {
    let title = format!("⚠️ Urgent: risk level increased - {}", alert.company_name);
    let content = format!(
        "Risk level for \"{}\" rose from \"Medium\" to \"High\"\n\n\
         📋 Alert details:\n\
         ━━━━━━━━━━━━━━━━━━━━━━━━\n\
         🏢 Company: {}\n\
         📄 Contract no: {}\n\
         📊 Previous score: {}\n\
         📈 New score: {}\n\
         📅 Date: {}\n\
         ━━━━━━━━━━━━━━━━━━━━━━━━\n\n\
         ⚡ Action required:\n\
         Please review this client and take steps to reduce the risk level.\n\n\
         🔗 Open the dashboard for full details.",
        alert.company_name,
        alert.company_name,
        alert.cont_no,
        score_or_dash(alert.previous_score.as_deref()),
        score_or_dash(alert.new_score.as_deref()),
        Local::now().format("%Y-%m-%d"),
    );
    OwnerNotification { title, content }
}

/// Positive message for an improvement out of High.
pub fn improvement_notification(alert: &RiskChangeAlert) -> OwnerNotification {
    let title = format!("✅ Risk level improved - {}", alert.company_name);
    let content = format!(
        "Risk level for \"{}\" went down\n\n\
         📋 Improvement details:\n\
         ━━━━━━━━━━━━━━━━━━━━━━━━\n\
         🏢 Company: {}\n\
         📄 Contract no: {}\n\
         📉 Previous category: {}\n\
         ✨ New category: {}\n\
         📊 Previous score: {}\n\
         📈 New score: {}\n\
         ━━━━━━━━━━━━━━━━━━━━━━━━\n\n\
         🎉 A positive step in this client's performance!",
        alert.company_name,
        alert.company_name,
        alert.cont_no,
        alert.previous_risk,
        alert.new_risk,
        score_or_dash(alert.previous_score.as_deref()),
        score_or_dash(alert.new_score.as_deref()),
    );
    OwnerNotification { title, content }
}

/// Neutral message for a manually triggered single send, covering any
/// transition direction.
pub fn risk_change_notification(alert: &RiskChangeAlert) -> OwnerNotification {
    let title = format!("Risk category changed - {}", alert.company_name);
    let content = format!(
        "Risk category for \"{}\" (contract no: {}) changed\n\n\
         Previous category: {}\n\
         New category: {}\n\
         Previous score: {}\n\
         New score: {}\n\n\
         Open the dashboard for full details.",
        alert.company_name,
        alert.cont_no,
        alert.previous_risk,
        alert.new_risk,
        score_or_dash(alert.previous_score.as_deref()),
        score_or_dash(alert.new_score.as_deref()),
    );
    OwnerNotification { title, content }
}

/// [`Notifier`] that POSTs the message as JSON to a webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_owner(&self, note: &OwnerNotification) -> bool {
        let resp = self.client.post(&self.endpoint).json(note).send().await;

        match resp {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                log::warn!(
                    "Notification webhook returned {} for '{}'",
                    resp.status(),
                    note.title
                );
                false
            }
            Err(e) => {
                log::warn!("Notification webhook request failed: {}", e);
                false
            }
        }
    }
}
