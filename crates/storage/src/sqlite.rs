//! SQLite Store
//!
//! Timestamps are stored as UTC milliseconds, statuses as their canonical
//! lowercase names.

use crate::records::{DeployReport, ManualAction, MonitoredService, StatusChangeEvent};
use crate::store::Store;
use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use status_normalizer::CanonicalStatus;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS services (
        service_id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        last_known_status TEXT,
        monitoring_enabled INTEGER NOT NULL DEFAULT 0,
        enabled_by TEXT,
        enabled_at INTEGER,
        notify_on_deploy_enabled INTEGER NOT NULL DEFAULT 0,
        last_our_action_at INTEGER,
        last_transient_status_at INTEGER,
        deploy_window_until INTEGER,
        last_status_check_at INTEGER,
        log_monitoring_enabled INTEGER NOT NULL DEFAULT 0,
        log_error_threshold INTEGER NOT NULL DEFAULT 5,
        last_log_error_count INTEGER NOT NULL DEFAULT 0,
        last_log_check_at INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS status_changes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        service_id TEXT NOT NULL,
        old_status TEXT NOT NULL,
        new_status TEXT NOT NULL,
        source TEXT NOT NULL,
        timestamp INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_status_changes_service
        ON status_changes (service_id, id)",
    "CREATE TABLE IF NOT EXISTS deploy_reports (
        service_id TEXT NOT NULL,
        deploy_id TEXT NOT NULL,
        status TEXT NOT NULL,
        reported_at INTEGER NOT NULL,
        seq INTEGER NOT NULL,
        PRIMARY KEY (service_id, deploy_id)
    )",
    "CREATE TABLE IF NOT EXISTS manual_actions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        service_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        timestamp INTEGER NOT NULL
    )",
];

const SERVICE_COLUMNS: &str = "service_id, name, last_known_status, monitoring_enabled, \
    enabled_by, enabled_at, notify_on_deploy_enabled, last_our_action_at, \
    last_transient_status_at, deploy_window_until, last_status_check_at, \
    log_monitoring_enabled, log_error_threshold, last_log_error_count, last_log_check_at";

/// Store backed by a SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`, e.g. `sqlite://monitor.db`
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        info!("Opening SQLite store at {}", url);
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database; a single connection keeps it alive
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("SQLite schema ready");
        Ok(Self { pool })
    }

    async fn ensure_service(&self, service_id: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO services (service_id, name) VALUES (?, ?)
             ON CONFLICT(service_id) DO NOTHING",
        )
        .bind(service_id)
        .bind(service_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp {}", ms)))
}

fn opt_from_millis(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StorageError> {
    ms.map(from_millis).transpose()
}

fn parse_status(raw: &str) -> Result<CanonicalStatus, StorageError> {
    CanonicalStatus::from_str(raw).map_err(|e| StorageError::Corrupt(e.to_string()))
}

fn count_from_row(row: &SqliteRow, column: &str) -> Result<u32, StorageError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| StorageError::Corrupt(format!("{} {}", column, raw)))
}

fn service_from_row(row: &SqliteRow) -> Result<MonitoredService, StorageError> {
    let status: Option<String> = row.try_get("last_known_status")?;
    Ok(MonitoredService {
        service_id: row.try_get("service_id")?,
        name: row.try_get("name")?,
        last_known_status: status.as_deref().map(parse_status).transpose()?,
        monitoring_enabled: row.try_get("monitoring_enabled")?,
        enabled_by: row.try_get("enabled_by")?,
        enabled_at: opt_from_millis(row.try_get("enabled_at")?)?,
        notify_on_deploy_enabled: row.try_get("notify_on_deploy_enabled")?,
        last_our_action_at: opt_from_millis(row.try_get("last_our_action_at")?)?,
        last_transient_status_at: opt_from_millis(row.try_get("last_transient_status_at")?)?,
        deploy_window_until: opt_from_millis(row.try_get("deploy_window_until")?)?,
        last_status_check_at: opt_from_millis(row.try_get("last_status_check_at")?)?,
        log_monitoring_enabled: row.try_get("log_monitoring_enabled")?,
        log_error_threshold: count_from_row(row, "log_error_threshold")?,
        last_log_error_count: count_from_row(row, "last_log_error_count")?,
        last_log_check_at: opt_from_millis(row.try_get("last_log_check_at")?)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_service(
        &self,
        service_id: &str,
    ) -> Result<Option<MonitoredService>, StorageError> {
        let sql = format!("SELECT {} FROM services WHERE service_id = ?", SERVICE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(service_from_row).transpose()
    }

    async fn list_services(&self) -> Result<Vec<MonitoredService>, StorageError> {
        let sql = format!("SELECT {} FROM services ORDER BY service_id", SERVICE_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(service_from_row).collect()
    }

    async fn get_monitored_services(&self) -> Result<Vec<MonitoredService>, StorageError> {
        let sql = format!(
            "SELECT {} FROM services
             WHERE monitoring_enabled = 1 OR notify_on_deploy_enabled = 1
                OR log_monitoring_enabled = 1
             ORDER BY service_id",
            SERVICE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(service_from_row).collect()
    }

    async fn enable_monitoring(
        &self,
        service_id: &str,
        name: Option<&str>,
        enabled_by: &str,
        baseline: Option<CanonicalStatus>,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.ensure_service(service_id).await?;
        sqlx::query(
            "UPDATE services SET
                monitoring_enabled = 1,
                enabled_by = ?,
                enabled_at = ?,
                name = COALESCE(?, name),
                last_known_status = COALESCE(?, last_known_status)
             WHERE service_id = ?",
        )
        .bind(enabled_by)
        .bind(to_millis(at))
        .bind(name)
        .bind(baseline.map(|s| s.as_str()))
        .bind(service_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn disable_monitoring(
        &self,
        service_id: &str,
        disabled_by: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE services SET monitoring_enabled = 0 WHERE service_id = ?")
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        debug!(service_id, disabled_by, "Monitoring disabled");
        Ok(result.rows_affected() > 0)
    }

    async fn set_deploy_notifications(
        &self,
        service_id: &str,
        enabled: bool,
    ) -> Result<(), StorageError> {
        self.ensure_service(service_id).await?;
        sqlx::query("UPDATE services SET notify_on_deploy_enabled = ? WHERE service_id = ?")
            .bind(enabled)
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_log_monitoring(
        &self,
        service_id: &str,
        enabled: bool,
        error_threshold: Option<u32>,
    ) -> Result<(), StorageError> {
        self.ensure_service(service_id).await?;
        sqlx::query(
            "UPDATE services SET
                log_monitoring_enabled = ?,
                log_error_threshold = COALESCE(?, log_error_threshold)
             WHERE service_id = ?",
        )
        .bind(enabled)
        .bind(error_threshold.map(i64::from))
        .bind(service_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_log_check(
        &self,
        service_id: &str,
        error_count: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.ensure_service(service_id).await?;
        sqlx::query(
            "UPDATE services SET last_log_error_count = ?, last_log_check_at = ?
             WHERE service_id = ?",
        )
        .bind(i64::from(error_count))
        .bind(to_millis(at))
        .bind(service_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_deploy_notifications_enabled(
        &self,
        service_id: &str,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT notify_on_deploy_enabled FROM services WHERE service_id = ?")
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("notify_on_deploy_enabled")?),
            None => Ok(false),
        }
    }

    async fn update_status(
        &self,
        service_id: &str,
        status: CanonicalStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.ensure_service(service_id).await?;
        sqlx::query(
            "UPDATE services SET last_known_status = ?, last_status_check_at = ?
             WHERE service_id = ?",
        )
        .bind(status.as_str())
        .bind(to_millis(at))
        .bind(service_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_status_change(&self, event: StatusChangeEvent) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO status_changes (service_id, old_status, new_status, source, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&event.service_id)
        .bind(event.old_status.as_str())
        .bind(event.new_status.as_str())
        .bind(&event.source)
        .bind(to_millis(event.timestamp))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn status_history(
        &self,
        service_id: &str,
        limit: usize,
    ) -> Result<Vec<StatusChangeEvent>, StorageError> {
        let rows = sqlx::query(
            "SELECT service_id, old_status, new_status, source, timestamp
             FROM status_changes WHERE service_id = ?
             ORDER BY id DESC LIMIT ?",
        )
        .bind(service_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let old: String = row.try_get("old_status")?;
                let new: String = row.try_get("new_status")?;
                Ok(StatusChangeEvent {
                    service_id: row.try_get("service_id")?,
                    old_status: parse_status(&old)?,
                    new_status: parse_status(&new)?,
                    source: row.try_get("source")?,
                    timestamp: from_millis(row.try_get("timestamp")?)?,
                })
            })
            .collect()
    }

    async fn record_transient_status(
        &self,
        service_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.ensure_service(service_id).await?;
        sqlx::query("UPDATE services SET last_transient_status_at = ? WHERE service_id = ?")
            .bind(to_millis(at))
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_deploy_window(
        &self,
        service_id: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.ensure_service(service_id).await?;
        sqlx::query("UPDATE services SET deploy_window_until = ? WHERE service_id = ?")
            .bind(until.map(to_millis))
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_last_reported_deploy_id(
        &self,
        service_id: &str,
    ) -> Result<Option<String>, StorageError> {
        let row = sqlx::query(
            "SELECT deploy_id FROM deploy_reports WHERE service_id = ?
             ORDER BY seq DESC LIMIT 1",
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("deploy_id")?)),
            None => Ok(None),
        }
    }

    async fn is_deploy_reported(
        &self,
        service_id: &str,
        deploy_id: &str,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 AS hit FROM deploy_reports WHERE service_id = ? AND deploy_id = ?",
        )
        .bind(service_id)
        .bind(deploy_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn record_reported_deploy(
        &self,
        service_id: &str,
        deploy_id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        // The primary key makes the second writer a no-op
        let result = sqlx::query(
            "INSERT OR IGNORE INTO deploy_reports (service_id, deploy_id, status, reported_at, seq)
             VALUES (?, ?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM deploy_reports))",
        )
        .bind(service_id)
        .bind(deploy_id)
        .bind(status)
        .bind(to_millis(at))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn deploy_reports(&self, service_id: &str) -> Result<Vec<DeployReport>, StorageError> {
        let rows = sqlx::query(
            "SELECT service_id, deploy_id, status, reported_at FROM deploy_reports
             WHERE service_id = ? ORDER BY seq DESC",
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DeployReport {
                    service_id: row.try_get("service_id")?,
                    deploy_id: row.try_get("deploy_id")?,
                    status: row.try_get("status")?,
                    reported_at: from_millis(row.try_get("reported_at")?)?,
                })
            })
            .collect()
    }

    async fn record_manual_action(&self, action: ManualAction) -> Result<(), StorageError> {
        self.ensure_service(&action.service_id).await?;
        let at = to_millis(action.timestamp);

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO manual_actions (service_id, kind, timestamp) VALUES (?, ?, ?)")
            .bind(&action.service_id)
            .bind(action.kind.as_str())
            .bind(at)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE services SET last_our_action_at = ? WHERE service_id = ?")
            .bind(at)
            .bind(&action.service_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_last_manual_action(
        &self,
        service_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row = sqlx::query(
            "SELECT MAX(timestamp) AS last FROM manual_actions WHERE service_id = ?",
        )
        .bind(service_id)
        .fetch_one(&self.pool)
        .await?;
        opt_from_millis(row.try_get("last")?)
    }

    async fn manual_actions(&self, service_id: &str) -> Result<Vec<ManualAction>, StorageError> {
        let rows = sqlx::query(
            "SELECT service_id, kind, timestamp FROM manual_actions
             WHERE service_id = ? ORDER BY id DESC",
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                Ok(ManualAction {
                    service_id: row.try_get("service_id")?,
                    kind: kind.parse()?,
                    timestamp: from_millis(row.try_get("timestamp")?)?,
                })
            })
            .collect()
    }
}
