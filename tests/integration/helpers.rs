//! Helper types for integration tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use player_count::{
    Application, DailySample, ExceptionRecord, MonthlySummary,
    provider::StatsProvider,
    storage::{HealthStatus, MemoryStore, MetricStore, StorageError, StorageResult},
};

pub fn create_test_app(id: &str, domain_id: u64) -> Application {
    Application {
        id: id.to_string(),
        name: format!("Test App {id}"),
        domain: "steam".to_string(),
        domain_id,
    }
}

pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// One sample per day of `month`, all with the same player count
pub fn month_of_samples(year: i32, month: u32, days: u32, player_count: u64) -> Vec<DailySample> {
    (1..=days)
        .map(|day| DailySample {
            date: utc(year, month, day),
            player_count,
        })
        .collect()
}

/// Memory store that can be told to fail or stall for specific applications
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    failing: HashSet<String>,
    failing_push: HashSet<String>,
    slow: HashMap<String, Duration>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads of this application's daily samples fail
    pub fn fail_for(mut self, app_id: &str) -> Self {
        self.failing.insert(app_id.to_string());
        self
    }

    /// Appending a daily sample for this application fails
    pub fn fail_push_for(mut self, app_id: &str) -> Self {
        self.failing_push.insert(app_id.to_string());
        self
    }

    /// Reads of this application's daily samples take `delay`
    pub fn slow_for(mut self, app_id: &str, delay: Duration) -> Self {
        self.slow.insert(app_id.to_string(), delay);
        self
    }
}

#[async_trait]
impl MetricStore for ScriptedStore {
    async fn add_application(&self, application: Application) -> StorageResult<()> {
        self.inner.add_application(application).await
    }

    async fn get_application_list(&self) -> StorageResult<Vec<Application>> {
        self.inner.get_application_list().await
    }

    async fn get_daily_samples(&self, app_id: &str) -> StorageResult<Vec<DailySample>> {
        if let Some(delay) = self.slow.get(app_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(app_id) {
            return Err(StorageError::QueryFailed(format!("scripted failure for {app_id}")));
        }
        self.inner.get_daily_samples(app_id).await
    }

    async fn replace_daily_samples(
        &self,
        app_id: &str,
        samples: Vec<DailySample>,
    ) -> StorageResult<()> {
        self.inner.replace_daily_samples(app_id, samples).await
    }

    async fn push_daily_sample(&self, app_id: &str, sample: DailySample) -> StorageResult<()> {
        if self.failing_push.contains(app_id) {
            return Err(StorageError::QueryFailed(format!("scripted write failure for {app_id}")));
        }
        self.inner.push_daily_sample(app_id, sample).await
    }

    async fn get_monthly_summaries(&self, app_id: &str) -> StorageResult<Vec<MonthlySummary>> {
        self.inner.get_monthly_summaries(app_id).await
    }

    async fn replace_monthly_summaries(
        &self,
        app_id: &str,
        summaries: Vec<MonthlySummary>,
    ) -> StorageResult<()> {
        self.inner.replace_monthly_summaries(app_id, summaries).await
    }

    async fn push_exception(
        &self,
        application: &Application,
        date: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner.push_exception(application, date).await
    }

    async fn drain_exceptions(&self) -> StorageResult<Vec<ExceptionRecord>> {
        self.inner.drain_exceptions().await
    }

    async fn clear_exceptions(&self) -> StorageResult<()> {
        self.inner.clear_exceptions().await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Provider returning a fixed count, except for domain ids marked as failing
#[derive(Default)]
pub struct ScriptedProvider {
    pub player_count: u64,
    pub failing: HashSet<u64>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(player_count: u64) -> Self {
        Self {
            player_count,
            ..Default::default()
        }
    }

    pub fn fail_for(mut self, domain_id: u64) -> Self {
        self.failing.insert(domain_id);
        self
    }
}

#[async_trait]
impl StatsProvider for ScriptedProvider {
    async fn fetch_daily(
        &self,
        date: DateTime<Utc>,
        _domain: &str,
        domain_id: u64,
    ) -> Result<DailySample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&domain_id) {
            anyhow::bail!("provider unavailable for {domain_id}");
        }
        Ok(DailySample {
            date,
            player_count: self.player_count,
        })
    }
}
