//! SQLite metric store implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked while a monthly task writes
//! - **Connection pooling**: Shared by all concurrent monthly tasks
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! Replace operations run in a transaction (delete everything, then insert),
//! so a reader never observes a half-written collection.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, MetricStore};
use super::error::{StorageError, StorageResult};
use super::schema::{
    application_from_row, daily_sample_from_row, exception_from_row, monthly_summary_from_row,
    timestamp_to_millis,
};
use crate::{Application, DailySample, ExceptionRecord, MonthlySummary};

/// SQLite metric store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use player_count::storage::sqlite::SqliteStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteStore::new("./player-count.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("opening SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("SQLite store ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    async fn ensure_known(&self, app_id: &str) -> StorageResult<()> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM applications WHERE id = ?")
            .bind(app_id)
            .fetch_optional(&self.pool)
            .await?;

        match found {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(app_id.to_string())),
        }
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    #[instrument(skip(self, application), fields(app_id = %application.id))]
    async fn add_application(&self, application: Application) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (id, name, domain, domain_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                domain = excluded.domain,
                domain_id = excluded.domain_id
            "#,
        )
        .bind(&application.id)
        .bind(&application.name)
        .bind(&application.domain)
        .bind(application.domain_id as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_application_list(&self) -> StorageResult<Vec<Application>> {
        let rows = sqlx::query("SELECT id, name, domain, domain_id FROM applications ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        debug!("loaded {} applications", rows.len());
        Ok(rows.iter().map(application_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn get_daily_samples(&self, app_id: &str) -> StorageResult<Vec<DailySample>> {
        self.ensure_known(app_id).await?;

        let rows = sqlx::query(
            "SELECT date, player_count FROM daily_samples WHERE app_id = ? ORDER BY seq",
        )
        .bind(app_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(daily_sample_from_row).collect())
    }

    #[instrument(skip(self, samples), fields(count = samples.len()))]
    async fn replace_daily_samples(
        &self,
        app_id: &str,
        samples: Vec<DailySample>,
    ) -> StorageResult<()> {
        self.ensure_known(app_id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM daily_samples WHERE app_id = ?")
            .bind(app_id)
            .execute(&mut *tx)
            .await?;

        for sample in &samples {
            sqlx::query("INSERT INTO daily_samples (app_id, date, player_count) VALUES (?, ?, ?)")
                .bind(app_id)
                .bind(timestamp_to_millis(&sample.date))
                .bind(sample.player_count as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, sample))]
    async fn push_daily_sample(&self, app_id: &str, sample: DailySample) -> StorageResult<()> {
        self.ensure_known(app_id).await?;

        sqlx::query("INSERT INTO daily_samples (app_id, date, player_count) VALUES (?, ?, ?)")
            .bind(app_id)
            .bind(timestamp_to_millis(&sample.date))
            .bind(sample.player_count as i64)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_monthly_summaries(&self, app_id: &str) -> StorageResult<Vec<MonthlySummary>> {
        self.ensure_known(app_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT date, average_players, peak_players, gain, gain_percent
            FROM monthly_summaries
            WHERE app_id = ?
            ORDER BY seq
            "#,
        )
        .bind(app_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(monthly_summary_from_row).collect())
    }

    #[instrument(skip(self, summaries), fields(count = summaries.len()))]
    async fn replace_monthly_summaries(
        &self,
        app_id: &str,
        summaries: Vec<MonthlySummary>,
    ) -> StorageResult<()> {
        self.ensure_known(app_id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM monthly_summaries WHERE app_id = ?")
            .bind(app_id)
            .execute(&mut *tx)
            .await?;

        for summary in &summaries {
            sqlx::query(
                r#"
                INSERT INTO monthly_summaries (
                    app_id, date, average_players, peak_players, gain, gain_percent
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(app_id)
            .bind(timestamp_to_millis(&summary.date))
            .bind(summary.average_players as i64)
            .bind(summary.peak_players as i64)
            .bind(&summary.gain)
            .bind(&summary.gain_percent)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, application), fields(app_id = %application.id))]
    async fn push_exception(
        &self,
        application: &Application,
        date: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.ensure_known(&application.id).await?;

        sqlx::query("INSERT INTO exceptions (app_id, date) VALUES (?, ?)")
            .bind(&application.id)
            .bind(timestamp_to_millis(&date))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn drain_exceptions(&self) -> StorageResult<Vec<ExceptionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT e.date, a.id, a.name, a.domain, a.domain_id
            FROM exceptions e
            JOIN applications a ON a.id = e.app_id
            ORDER BY e.seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(exception_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn clear_exceptions(&self) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM exceptions")
            .execute(&self.pool)
            .await?;

        debug!("cleared {} exception records", result.rows_affected());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite store operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}
