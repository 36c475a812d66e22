//! SQLite persistence for risk alerts, scheduler settings, and the
//! notification audit log.
//!
//! The database lives at `~/.ivi/ivi.db` by default. Timestamps are stored
//! as RFC 3339 TEXT written from Rust; risk categories and run statuses are
//! stored as their canonical strings.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row, ToSql};
use thiserror::Error;

use crate::types::{
    NewNotificationLog, NewRiskChangeAlert, NotificationLogEntry, RiskCategory, RiskChangeAlert,
    RunStatus, SchedulerSettings, SettingsUpdate,
};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

impl ToSql for RiskCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RiskCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        RiskCategory::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown risk category: {s}").into()))
    }
}

impl ToSql for RunStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RunStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        RunStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown run status: {s}").into()))
    }
}

/// Stored timestamps are parsed leniently: a value that does not parse reads
/// back as None, which the scheduler treats as "never ran". Dispatch is
/// idempotent per alert, so the worst case is one redundant due-check.
fn parse_timestamp(value: Option<String>) -> Option<DateTime<Local>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Local))
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<RiskChangeAlert> {
    Ok(RiskChangeAlert {
        id: row.get(0)?,
        cont_no: row.get(1)?,
        company_name: row.get(2)?,
        previous_risk: row.get(3)?,
        new_risk: row.get(4)?,
        previous_score: row.get(5)?,
        new_score: row.get(6)?,
        notification_sent: row.get(7)?,
        sent_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const ALERT_COLUMNS: &str = "id, cont_no, company_name, previous_risk, new_risk,
             previous_score, new_score, notification_sent, sent_at, created_at";

/// SQLite connection wrapper for the alerting state.
///
/// Intentionally not `Clone` or `Sync`; production code holds it behind
/// [`SqliteAlertStore`]'s Mutex.
pub struct AlertDb {
    conn: Connection,
}

impl AlertDb {
    /// Open (or create) the database at `~/.ivi/ivi.db` and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Used by the daemon's
    /// `IVI_DB_PATH` override and by tests.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for concurrent reads while the scheduler writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        // Apply schema (all statements use IF NOT EXISTS, so this is idempotent)
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.ivi/ivi.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".ivi").join("ivi.db"))
    }

    // =========================================================================
    // Scheduler settings
    // =========================================================================

    /// Read the settings singleton, None when nothing was ever saved.
    pub fn get_scheduler_settings(&self) -> Result<Option<SchedulerSettings>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT is_enabled, scheduled_time, days_of_week, last_run_at, last_run_status,
                    last_run_count, last_run_error, next_run_at, updated_at
             FROM scheduler_settings
             WHERE id = 1",
        )?;

        let mut rows = stmt.query_map([], |row| {
            Ok(SchedulerSettings {
                is_enabled: row.get(0)?,
                scheduled_time: row.get(1)?,
                days_of_week: row.get(2)?,
                last_run_at: parse_timestamp(row.get(3)?),
                last_run_status: row.get(4)?,
                last_run_count: row.get(5)?,
                last_run_error: row.get(6)?,
                next_run_at: parse_timestamp(row.get(7)?),
                updated_at: row.get(8)?,
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Create or replace the schedule configuration. Run bookkeeping columns
    /// are left untouched.
    pub fn upsert_scheduler_settings(&self, update: &SettingsUpdate) -> Result<(), DbError> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO scheduler_settings (id, is_enabled, scheduled_time, days_of_week, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               is_enabled = excluded.is_enabled,
               scheduled_time = excluded.scheduled_time,
               days_of_week = excluded.days_of_week,
               updated_at = excluded.updated_at",
            params![update.is_enabled, update.scheduled_time, update.days_of_week, now],
        )?;
        Ok(())
    }

    /// Record the outcome of a dispatch run.
    pub fn update_scheduler_last_run(
        &self,
        status: RunStatus,
        sent_count: i64,
        error: Option<&str>,
    ) -> Result<(), DbError> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO scheduler_settings
               (id, last_run_at, last_run_status, last_run_count, last_run_error, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?1)
             ON CONFLICT(id) DO UPDATE SET
               last_run_at = excluded.last_run_at,
               last_run_status = excluded.last_run_status,
               last_run_count = excluded.last_run_count,
               last_run_error = excluded.last_run_error,
               updated_at = excluded.updated_at",
            params![now, status, sent_count, error],
        )?;
        Ok(())
    }

    /// Persist the next scheduled run instant.
    pub fn update_scheduler_next_run(&self, at: DateTime<Local>) -> Result<(), DbError> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO scheduler_settings (id, next_run_at, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               next_run_at = excluded.next_run_at,
               updated_at = excluded.updated_at",
            params![at.to_rfc3339(), now],
        )?;
        Ok(())
    }

    // =========================================================================
    // Risk change alerts
    // =========================================================================

    /// Insert a freshly detected risk transition; returns the new row id.
    pub fn create_risk_change_alert(&self, alert: &NewRiskChangeAlert) -> Result<i64, DbError> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO risk_change_alerts
               (cont_no, company_name, previous_risk, new_risk, previous_score, new_score,
                notification_sent, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7)",
            params![
                alert.cont_no,
                alert.company_name.as_deref().unwrap_or(""),
                alert.previous_risk,
                alert.new_risk,
                alert.previous_score,
                alert.new_score,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Pending alerts in detection order (oldest first), so batch dispatch
    /// order is deterministic.
    pub fn get_unsent_risk_alerts(&self) -> Result<Vec<RiskChangeAlert>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS}
             FROM risk_change_alerts
             WHERE notification_sent = 0
             ORDER BY id",
        ))?;

        let rows = stmt.query_map([], alert_from_row)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    /// All alerts, newest first, for the dashboard feed.
    pub fn get_risk_change_alerts(&self, limit: u32) -> Result<Vec<RiskChangeAlert>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS}
             FROM risk_change_alerts
             ORDER BY id DESC
             LIMIT ?1",
        ))?;

        let rows = stmt.query_map(params![limit], alert_from_row)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    /// Flip an alert to sent with the current timestamp.
    pub fn mark_alert_sent(&self, alert_id: i64) -> Result<(), DbError> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE risk_change_alerts
             SET notification_sent = 1, sent_at = ?1
             WHERE id = ?2",
            params![now, alert_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Notification log
    // =========================================================================

    /// Append one notification-attempt record; returns the new row id.
    pub fn create_notification_log(&self, entry: &NewNotificationLog) -> Result<i64, DbError> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO notification_log
               (notification_type, alert_id, cont_no, company_name, title, success,
                error_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.notification_type,
                entry.alert_id,
                entry.cont_no,
                entry.company_name,
                entry.title,
                entry.success,
                entry.error_message,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent log entries, newest first.
    pub fn get_notification_logs(&self, limit: u32) -> Result<Vec<NotificationLogEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, notification_type, alert_id, cont_no, company_name, title, success,
                    error_message, created_at
             FROM notification_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(NotificationLogEntry {
                id: row.get(0)?,
                notification_type: row.get(1)?,
                alert_id: row.get(2)?,
                cont_no: row.get(3)?,
                company_name: row.get(4)?,
                title: row.get(5)?,
                success: row.get(6)?,
                error_message: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

// =============================================================================
// Store trait
// =============================================================================

/// Persistence surface the scheduler depends on.
///
/// Implemented by [`SqliteAlertStore`] in production and by in-memory fakes
/// in scheduler tests.
pub trait AlertStore: Send + Sync {
    fn get_scheduler_settings(&self) -> Result<Option<SchedulerSettings>, DbError>;
    fn upsert_scheduler_settings(&self, update: &SettingsUpdate) -> Result<(), DbError>;
    fn update_scheduler_last_run(
        &self,
        status: RunStatus,
        sent_count: i64,
        error: Option<&str>,
    ) -> Result<(), DbError>;
    fn update_scheduler_next_run(&self, at: DateTime<Local>) -> Result<(), DbError>;
    fn get_unsent_risk_alerts(&self) -> Result<Vec<RiskChangeAlert>, DbError>;
    fn mark_alert_sent(&self, alert_id: i64) -> Result<(), DbError>;
    fn create_notification_log(&self, entry: &NewNotificationLog) -> Result<(), DbError>;
}

/// [`AlertStore`] over [`AlertDb`].
///
/// rusqlite connections are not Sync, so the handle lives behind a Mutex.
/// Every call is one short statement; contention is negligible at a
/// once-a-minute poll cadence.
pub struct SqliteAlertStore {
    db: Mutex<AlertDb>,
}

impl SqliteAlertStore {
    pub fn new(db: AlertDb) -> Self {
        Self { db: Mutex::new(db) }
    }
}

impl AlertStore for SqliteAlertStore {
    fn get_scheduler_settings(&self) -> Result<Option<SchedulerSettings>, DbError> {
        self.db.lock().get_scheduler_settings()
    }

    fn upsert_scheduler_settings(&self, update: &SettingsUpdate) -> Result<(), DbError> {
        self.db.lock().upsert_scheduler_settings(update)
    }

    fn update_scheduler_last_run(
        &self,
        status: RunStatus,
        sent_count: i64,
        error: Option<&str>,
    ) -> Result<(), DbError> {
        self.db.lock().update_scheduler_last_run(status, sent_count, error)
    }

    fn update_scheduler_next_run(&self, at: DateTime<Local>) -> Result<(), DbError> {
        self.db.lock().update_scheduler_next_run(at)
    }

    fn get_unsent_risk_alerts(&self) -> Result<Vec<RiskChangeAlert>, DbError> {
        self.db.lock().get_unsent_risk_alerts()
    }

    fn mark_alert_sent(&self, alert_id: i64) -> Result<(), DbError> {
        self.db.lock().mark_alert_sent(alert_id)
    }

    fn create_notification_log(&self, entry: &NewNotificationLog) -> Result<(), DbError> {
        self.db.lock().create_notification_log(entry).map(|_| ())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of
    /// the test. Test temp dirs are cleaned up by the OS.
    fn test_db() -> AlertDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test_ivi.db");
        std::mem::forget(dir);
        AlertDb::open_at(path).expect("Failed to open test database")
    }

    fn sample_alert(cont_no: &str, previous: RiskCategory, new: RiskCategory) -> NewRiskChangeAlert {
        NewRiskChangeAlert {
            cont_no: cont_no.to_string(),
            company_name: Some("Acme Industries".to_string()),
            previous_risk: previous,
            new_risk: new,
            previous_score: Some("48.2".to_string()),
            new_score: Some("31.9".to_string()),
        }
    }

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        for table in ["risk_change_alerts", "scheduler_settings", "notification_log"] {
            let count: i64 = db
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap_or_else(|_| panic!("{table} table should exist"));
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_settings_absent_by_default() {
        let db = test_db();
        assert!(db.get_scheduler_settings().expect("query").is_none());
    }

    #[test]
    fn test_upsert_and_get_settings() {
        let db = test_db();
        db.upsert_scheduler_settings(&SettingsUpdate {
            is_enabled: true,
            scheduled_time: "08:30".to_string(),
            days_of_week: "1,3,5".to_string(),
        })
        .expect("upsert");

        let settings = db.get_scheduler_settings().expect("query").expect("row");
        assert!(settings.is_enabled);
        assert_eq!(settings.scheduled_time, "08:30");
        assert_eq!(settings.days_of_week, "1,3,5");
        assert!(settings.last_run_at.is_none());
        assert!(settings.last_run_status.is_none());
        assert_eq!(settings.last_run_count, 0);
        assert!(settings.next_run_at.is_none());
    }

    #[test]
    fn test_upsert_preserves_run_bookkeeping() {
        let db = test_db();
        db.upsert_scheduler_settings(&SettingsUpdate {
            is_enabled: true,
            scheduled_time: "09:00".to_string(),
            days_of_week: "1,2,3,4,5".to_string(),
        })
        .expect("upsert");
        db.update_scheduler_last_run(RunStatus::Partial, 3, Some("one delivery failed"))
            .expect("last run");

        // Re-saving the schedule must not clear the run history.
        db.upsert_scheduler_settings(&SettingsUpdate {
            is_enabled: false,
            scheduled_time: "18:00".to_string(),
            days_of_week: "0,6".to_string(),
        })
        .expect("second upsert");

        let settings = db.get_scheduler_settings().expect("query").expect("row");
        assert!(!settings.is_enabled);
        assert_eq!(settings.scheduled_time, "18:00");
        assert_eq!(settings.last_run_status, Some(RunStatus::Partial));
        assert_eq!(settings.last_run_count, 3);
        assert_eq!(settings.last_run_error.as_deref(), Some("one delivery failed"));
        assert!(settings.last_run_at.is_some());
    }

    #[test]
    fn test_last_run_update_creates_singleton_when_missing() {
        let db = test_db();
        db.update_scheduler_last_run(RunStatus::Failed, 0, Some("store offline"))
            .expect("last run");

        let settings = db.get_scheduler_settings().expect("query").expect("row");
        // Schema defaults fill in the schedule columns.
        assert_eq!(settings.scheduled_time, "09:00");
        assert_eq!(settings.days_of_week, "1,2,3,4,5");
        assert!(!settings.is_enabled);
        assert_eq!(settings.last_run_status, Some(RunStatus::Failed));
    }

    #[test]
    fn test_next_run_round_trip() {
        let db = test_db();
        let at = Local::now() + chrono::Duration::hours(20);
        db.update_scheduler_next_run(at).expect("next run");

        let settings = db.get_scheduler_settings().expect("query").expect("row");
        assert_eq!(settings.next_run_at, Some(at));
    }

    #[test]
    fn test_create_and_list_alerts_newest_first() {
        let db = test_db();
        let first = db
            .create_risk_change_alert(&sample_alert("C-1001", RiskCategory::Medium, RiskCategory::High))
            .expect("create");
        let second = db
            .create_risk_change_alert(&sample_alert("C-1002", RiskCategory::High, RiskCategory::Low))
            .expect("create");
        assert!(second > first);

        let alerts = db.get_risk_change_alerts(10).expect("list");
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].id, second);
        assert_eq!(alerts[0].cont_no, "C-1002");
        assert_eq!(alerts[1].id, first);
        assert_eq!(alerts[1].previous_risk, RiskCategory::Medium);
        assert_eq!(alerts[1].new_risk, RiskCategory::High);
    }

    #[test]
    fn test_unsent_filtering_and_mark_sent() {
        let db = test_db();
        let first = db
            .create_risk_change_alert(&sample_alert("C-1001", RiskCategory::Medium, RiskCategory::High))
            .expect("create");
        let second = db
            .create_risk_change_alert(&sample_alert("C-1002", RiskCategory::Low, RiskCategory::Medium))
            .expect("create");

        // Pending alerts come back oldest first.
        let pending = db.get_unsent_risk_alerts().expect("unsent");
        assert_eq!(pending.iter().map(|a| a.id).collect::<Vec<_>>(), vec![first, second]);
        assert!(pending.iter().all(|a| !a.notification_sent && a.sent_at.is_none()));

        db.mark_alert_sent(first).expect("mark sent");

        let pending = db.get_unsent_risk_alerts().expect("unsent");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);

        let all = db.get_risk_change_alerts(10).expect("list");
        let sent = all.iter().find(|a| a.id == first).expect("row");
        assert!(sent.notification_sent);
        assert!(sent.sent_at.is_some());
    }

    #[test]
    fn test_notification_log_append_and_limit() {
        let db = test_db();
        let alert_id = db
            .create_risk_change_alert(&sample_alert("C-1001", RiskCategory::Medium, RiskCategory::High))
            .expect("create");

        for (i, success) in [(1, true), (2, false), (3, true)] {
            db.create_notification_log(&NewNotificationLog {
                notification_type: "scheduled_daily".to_string(),
                alert_id,
                cont_no: "C-1001".to_string(),
                company_name: "Acme Industries".to_string(),
                title: format!("attempt {i}"),
                success,
                error_message: if success { None } else { Some("Failed to send notification".to_string()) },
            })
            .expect("log");
        }

        let logs = db.get_notification_logs(2).expect("logs");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].title, "attempt 3");
        assert_eq!(logs[1].title, "attempt 2");
        assert!(!logs[1].success);
        assert_eq!(logs[1].error_message.as_deref(), Some("Failed to send notification"));
        assert_eq!(logs[0].alert_id, Some(alert_id));
        assert_eq!(logs[0].notification_type, "scheduled_daily");
    }
}
