//! Background scheduler for risk-change alert notifications.
//!
//! A poll task wakes once a minute and checks whether a dispatch run is due.
//! A run is due when the local day-of-week is allowed, today's scheduled
//! instant has passed, and no run has happened since that instant. A tick
//! that lands late (process stall, restart) still catches up, and a
//! completed run suppresses the slot until the next one.
//!
//! Dispatch is at-most-once per alert: an alert is marked sent only after
//! its notification is delivered, or immediately when its transition is one
//! that never notifies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};
use parking_lot::Mutex;
use regex::Regex;
use tokio::task::JoinHandle;

use crate::db::AlertStore;
use crate::error::SchedulerError;
use crate::notification::{
    escalation_notification, improvement_notification, risk_change_notification, Notifier,
};
use crate::types::{
    DispatchSummary, NewNotificationLog, RiskCategory, RiskChangeAlert, RunStatus, SchedulerStatus,
    SettingsUpdate,
};

/// Seconds between due-checks.
pub const POLL_INTERVAL_SECS: u64 = 60;

/// `notification_type` recorded on log rows written by the scheduled job.
pub const SCHEDULED_NOTIFICATION_TYPE: &str = "scheduled_daily";

const DEFAULT_SCHEDULED_TIME: &str = "09:00";
const DEFAULT_DAYS_OF_WEEK: &str = "1,2,3,4,5";

// -----------------------------------------------------------------------------
// Settings parsing
// -----------------------------------------------------------------------------

fn scheduled_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").unwrap())
}

fn days_of_week_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-6](,[0-6])*$").unwrap())
}

/// Parse "HH:MM" (24-hour) into hour and minute.
fn parse_scheduled_time(s: &str) -> Result<(u32, u32), SchedulerError> {
    let invalid = || SchedulerError::InvalidScheduledTime(s.to_string());
    if !scheduled_time_regex().is_match(s) {
        return Err(invalid());
    }
    let (h, m) = s.split_once(':').ok_or_else(invalid)?;
    Ok((
        h.parse().map_err(|_| invalid())?,
        m.parse().map_err(|_| invalid())?,
    ))
}

/// Parse a comma-separated day list (0=Sunday .. 6=Saturday).
fn parse_days_of_week(s: &str) -> Result<Vec<u32>, SchedulerError> {
    if !days_of_week_regex().is_match(s) {
        return Err(SchedulerError::InvalidDaysOfWeek(s.to_string()));
    }
    let mut days = Vec::new();
    for part in s.split(',') {
        days.push(
            part.parse()
                .map_err(|_| SchedulerError::InvalidDaysOfWeek(s.to_string()))?,
        );
    }
    Ok(days)
}

// -----------------------------------------------------------------------------
// Slot arithmetic
// -----------------------------------------------------------------------------

/// Local instant for `date` at the given wall-clock time. When a DST change
/// makes the wall time ambiguous the earlier instant wins; when it makes the
/// wall time nonexistent there is no slot that day.
fn local_at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Local>> {
    let ndt = date.and_hms_opt(hour, minute, 0)?;
    Local.from_local_datetime(&ndt).earliest()
}

/// Whether a scheduled run is due at `now`.
///
/// Due means: today is an allowed day, today's slot has passed, and the last
/// run predates that slot.
fn is_due(
    now: DateTime<Local>,
    scheduled_time: &str,
    days_of_week: &str,
    last_run_at: Option<DateTime<Local>>,
) -> Result<bool, SchedulerError> {
    let (hour, minute) = parse_scheduled_time(scheduled_time)?;
    let days = parse_days_of_week(days_of_week)?;

    if !days.contains(&now.weekday().num_days_from_sunday()) {
        return Ok(false);
    }

    let slot = match local_at(now.date_naive(), hour, minute) {
        Some(slot) => slot,
        None => return Ok(false),
    };

    if now < slot {
        return Ok(false);
    }

    Ok(last_run_at.map_or(true, |last| last < slot))
}

/// First slot strictly after `now`: today at the scheduled time if still
/// ahead, otherwise the next allowed day's slot.
fn calculate_next_run_time(
    now: DateTime<Local>,
    scheduled_time: &str,
    days_of_week: &str,
) -> Result<DateTime<Local>, SchedulerError> {
    let (hour, minute) = parse_scheduled_time(scheduled_time)?;
    let days = parse_days_of_week(days_of_week)?;

    let mut date = now.date_naive();
    if local_at(date, hour, minute).map_or(true, |slot| slot <= now) {
        date = date
            .succ_opt()
            .ok_or_else(|| SchedulerError::InvalidDaysOfWeek(days_of_week.to_string()))?;
    }

    // A non-empty day list always matches within a week; the extra step
    // covers a slot lost to a DST gap.
    for _ in 0..=7 {
        if days.contains(&date.weekday().num_days_from_sunday()) {
            if let Some(slot) = local_at(date, hour, minute) {
                return Ok(slot);
            }
        }
        date = match date.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }

    Err(SchedulerError::InvalidDaysOfWeek(days_of_week.to_string()))
}

// -----------------------------------------------------------------------------
// Scheduler handle
// -----------------------------------------------------------------------------

struct Inner {
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    /// Run guard: true while a dispatch job is executing.
    job_running: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to the background alert scheduler.
///
/// Built once by the composition root; every clone shares the poll task and
/// the run guard.
#[derive(Clone)]
pub struct AlertScheduler {
    inner: Arc<Inner>,
}

impl AlertScheduler {
    pub fn new(store: Arc<dyn AlertStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                notifier,
                job_running: AtomicBool::new(false),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Begin polling. Safe to call repeatedly; an active poll loop is kept.
    ///
    /// When the saved schedule is enabled the upcoming run time is computed
    /// and persisted right away, so status surfaces show it without waiting
    /// for the first tick. Must be called from within a tokio runtime.
    pub fn start(&self) {
        {
            let mut task = self.inner.poll_task.lock();
            if task.as_ref().map_or(false, |t| !t.is_finished()) {
                log::info!("Scheduler already running");
                return;
            }

            log::info!("Starting notification scheduler");
            let inner = Arc::clone(&self.inner);
            *task = Some(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
                    check_and_run(&inner).await;
                }
            }));
        }

        if let Err(e) = self.refresh_next_run() {
            log::error!("Failed to update next run time: {}", e);
        }
    }

    /// Stop polling. A dispatch already in flight runs to completion.
    pub fn stop(&self) {
        let mut task = self.inner.poll_task.lock();
        if let Some(handle) = task.take() {
            handle.abort();
            log::info!("Scheduler stopped");
        }
    }

    /// Run a dispatch pass immediately, regardless of the day/time gate.
    ///
    /// Shares the run guard with scheduled jobs; a pass already in progress
    /// yields [`SchedulerError::JobAlreadyRunning`]. Run bookkeeping and the
    /// next scheduled slot are left untouched.
    pub async fn trigger_now(&self) -> Result<DispatchSummary, SchedulerError> {
        if self.inner.job_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::JobAlreadyRunning);
        }

        log::info!("Manual dispatch trigger requested");
        let result = self.inner.send_pending_alerts().await;
        self.inner.job_running.store(false, Ordering::SeqCst);
        result
    }

    /// Send one pending alert's notification right away, whatever its
    /// transition. The alert is marked sent only when delivery succeeds;
    /// no log row is written.
    pub async fn send_alert_now(&self, alert_id: i64) -> Result<bool, SchedulerError> {
        let alert = self
            .inner
            .store
            .get_unsent_risk_alerts()?
            .into_iter()
            .find(|a| a.id == alert_id)
            .ok_or(SchedulerError::AlertNotFound(alert_id))?;

        let note = risk_change_notification(&alert);
        let success = self.inner.notifier.notify_owner(&note).await;

        if success {
            self.inner.store.mark_alert_sent(alert_id)?;
        }

        Ok(success)
    }

    /// Validate and persist new schedule settings, then apply them: polling
    /// starts when enabled and stops when disabled.
    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<(), SchedulerError> {
        parse_scheduled_time(&update.scheduled_time)?;
        parse_days_of_week(&update.days_of_week)?;

        self.inner.store.upsert_scheduler_settings(update)?;

        if update.is_enabled {
            self.start();
        } else {
            self.stop();
        }
        Ok(())
    }

    /// Snapshot for the admin surface. Falls back to the stock schedule
    /// (09:00, Monday through Friday, disabled) when nothing was ever saved.
    pub fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let is_running = self.inner.job_running.load(Ordering::SeqCst);

        Ok(match self.inner.store.get_scheduler_settings()? {
            Some(s) => SchedulerStatus {
                is_enabled: s.is_enabled,
                is_running,
                scheduled_time: s.scheduled_time,
                days_of_week: s.days_of_week,
                last_run_at: s.last_run_at,
                next_run_at: s.next_run_at,
                last_run_status: s.last_run_status,
                last_run_count: s.last_run_count,
            },
            None => SchedulerStatus {
                is_enabled: false,
                is_running,
                scheduled_time: DEFAULT_SCHEDULED_TIME.to_string(),
                days_of_week: DEFAULT_DAYS_OF_WEEK.to_string(),
                last_run_at: None,
                next_run_at: None,
                last_run_status: None,
                last_run_count: 0,
            },
        })
    }

    fn refresh_next_run(&self) -> Result<(), SchedulerError> {
        if let Some(settings) = self.inner.store.get_scheduler_settings()? {
            if settings.is_enabled {
                let next = calculate_next_run_time(
                    Local::now(),
                    &settings.scheduled_time,
                    &settings.days_of_week,
                )?;
                self.inner.store.update_scheduler_next_run(next)?;
                log::info!("Next scheduled run: {}", next.to_rfc3339());
            }
        }
        Ok(())
    }
}

/// One due-check tick. Spawns the job on its own task so stopping the poll
/// loop never cancels a dispatch in flight.
async fn check_and_run(inner: &Arc<Inner>) {
    let settings = match inner.store.get_scheduler_settings() {
        Ok(Some(s)) if s.is_enabled => s,
        Ok(_) => return,
        Err(e) => {
            log::error!("Scheduler due-check failed: {}", e);
            return;
        }
    };

    match is_due(
        Local::now(),
        &settings.scheduled_time,
        &settings.days_of_week,
        settings.last_run_at,
    ) {
        Ok(true) => {
            let job = Arc::clone(inner);
            tokio::spawn(async move {
                job.run_scheduled_job().await;
            });
        }
        Ok(false) => {}
        Err(e) => log::error!("Stored scheduler settings are invalid: {}", e),
    }
}

// -----------------------------------------------------------------------------
// Dispatch
// -----------------------------------------------------------------------------

enum Delivery {
    Sent,
    Failed,
    Skipped,
}

impl Inner {
    /// Guarded scheduled dispatch: runs the batch, records the run outcome,
    /// and persists the next slot. Every exit path releases the guard; a
    /// tick that finds the guard held leaves all schedule state alone.
    async fn run_scheduled_job(&self) {
        if self.job_running.swap(true, Ordering::SeqCst) {
            log::info!("Dispatch job already running, skipping");
            return;
        }

        log::info!("Starting scheduled notification job");

        if let Err(e) = self.run_scheduled_job_body().await {
            log::error!("Scheduled job failed: {}", e);
            if let Err(db_err) =
                self.store
                    .update_scheduler_last_run(RunStatus::Failed, 0, Some(&e.to_string()))
            {
                log::error!("Failed to record failed run: {}", db_err);
            }
        }

        self.job_running.store(false, Ordering::SeqCst);
    }

    async fn run_scheduled_job_body(&self) -> Result<(), SchedulerError> {
        let settings = match self.store.get_scheduler_settings()? {
            Some(s) if s.is_enabled => s,
            _ => {
                log::info!("Scheduler is disabled, skipping");
                return Ok(());
            }
        };

        let summary = self.send_pending_alerts().await?;
        self.store
            .update_scheduler_last_run(summary.run_status(), summary.sent as i64, None)?;

        let next =
            calculate_next_run_time(Local::now(), &settings.scheduled_time, &settings.days_of_week)?;
        self.store.update_scheduler_next_run(next)?;

        log::info!(
            "Job completed. Sent: {}, Failed: {}, Skipped: {}",
            summary.sent,
            summary.failed,
            summary.skipped
        );
        Ok(())
    }

    /// One dispatch pass over every pending alert. A failure never aborts
    /// the batch; an undelivered notification leaves its alert pending for
    /// the next run.
    async fn send_pending_alerts(&self) -> Result<DispatchSummary, SchedulerError> {
        let alerts = self.store.get_unsent_risk_alerts()?;
        log::info!("Found {} pending alerts", alerts.len());

        let mut summary = DispatchSummary::default();

        for alert in &alerts {
            match self.dispatch_alert(alert).await {
                Ok(Delivery::Sent) => summary.sent += 1,
                Ok(Delivery::Failed) => summary.failed += 1,
                Ok(Delivery::Skipped) => summary.skipped += 1,
                Err(e) => {
                    log::error!("Error processing alert {}: {}", alert.id, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn dispatch_alert(&self, alert: &RiskChangeAlert) -> Result<Delivery, SchedulerError> {
        let note = match (alert.previous_risk, alert.new_risk) {
            (RiskCategory::Medium, RiskCategory::High) => escalation_notification(alert),
            (RiskCategory::High, RiskCategory::Medium) | (RiskCategory::High, RiskCategory::Low) => {
                improvement_notification(alert)
            }
            _ => {
                // Transitions that never notify are still consumed so the
                // next run does not rescan them.
                self.store.mark_alert_sent(alert.id)?;
                return Ok(Delivery::Skipped);
            }
        };

        let success = self.notifier.notify_owner(&note).await;

        self.store.create_notification_log(&NewNotificationLog {
            notification_type: SCHEDULED_NOTIFICATION_TYPE.to_string(),
            alert_id: alert.id,
            cont_no: alert.cont_no.clone(),
            company_name: alert.company_name.clone(),
            title: note.title.clone(),
            success,
            error_message: if success {
                None
            } else {
                Some("Failed to send notification".to_string())
            },
        })?;

        if success {
            self.store.mark_alert_sent(alert.id)?;
            Ok(Delivery::Sent)
        } else {
            Ok(Delivery::Failed)
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
