//! ivid, the background alert daemon.
//!
//! Composition root for the scheduler: opens the SQLite store, wires the
//! webhook notifier, starts the poll loop, and runs until interrupted.
//!
//! Configuration comes from the environment:
//! - `IVI_WEBHOOK_URL` (required): endpoint owner notifications are POSTed to.
//! - `IVI_DB_PATH` (optional): database file, default `~/.ivi/ivi.db`.

use std::path::PathBuf;
use std::sync::Arc;

use ivi_core::db::{AlertDb, SqliteAlertStore};
use ivi_core::notification::WebhookNotifier;
use ivi_core::scheduler::AlertScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let webhook_url = std::env::var("IVI_WEBHOOK_URL")
        .map_err(|_| anyhow::anyhow!("IVI_WEBHOOK_URL is not set"))?;

    let db = match std::env::var_os("IVI_DB_PATH") {
        Some(path) => AlertDb::open_at(PathBuf::from(path)),
        None => AlertDb::open(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to open database: {e}"))?;

    let store = Arc::new(SqliteAlertStore::new(db));
    let notifier = Arc::new(WebhookNotifier::new(webhook_url));
    let scheduler = AlertScheduler::new(store, notifier);

    scheduler.start();
    log::info!("ivid running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to listen for shutdown signal: {e}"))?;

    scheduler.stop();
    log::info!("ivid stopped");
    Ok(())
}
