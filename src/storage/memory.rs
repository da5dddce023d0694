//! In-memory metric store (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Dry runs (`"backend": "none"` in the config)
//!
//! All data is lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, MetricStore};
use super::error::{StorageError, StorageResult};
use crate::{Application, DailySample, ExceptionRecord, MonthlySummary};

#[derive(Default)]
struct State {
    applications: Vec<Application>,
    daily: HashMap<String, Vec<DailySample>>,
    monthly: HashMap<String, Vec<MonthlySummary>>,
    exceptions: Vec<ExceptionRecord>,
}

impl State {
    fn ensure_known(&self, app_id: &str) -> StorageResult<()> {
        if self.applications.iter().any(|app| app.id == app_id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(app_id.to_string()))
        }
    }
}

/// In-memory metric store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn add_application(&self, application: Application) -> StorageResult<()> {
        let mut state = self.state.write().await;
        debug!("registering application {}", application.id);
        state.applications.retain(|app| app.id != application.id);
        state.applications.push(application);
        Ok(())
    }

    async fn get_application_list(&self) -> StorageResult<Vec<Application>> {
        Ok(self.state.read().await.applications.clone())
    }

    async fn get_daily_samples(&self, app_id: &str) -> StorageResult<Vec<DailySample>> {
        let state = self.state.read().await;
        state.ensure_known(app_id)?;
        Ok(state.daily.get(app_id).cloned().unwrap_or_default())
    }

    async fn replace_daily_samples(
        &self,
        app_id: &str,
        samples: Vec<DailySample>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.ensure_known(app_id)?;
        state.daily.insert(app_id.to_string(), samples);
        Ok(())
    }

    async fn push_daily_sample(&self, app_id: &str, sample: DailySample) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.ensure_known(app_id)?;
        state.daily.entry(app_id.to_string()).or_default().push(sample);
        Ok(())
    }

    async fn get_monthly_summaries(&self, app_id: &str) -> StorageResult<Vec<MonthlySummary>> {
        let state = self.state.read().await;
        state.ensure_known(app_id)?;
        Ok(state.monthly.get(app_id).cloned().unwrap_or_default())
    }

    async fn replace_monthly_summaries(
        &self,
        app_id: &str,
        summaries: Vec<MonthlySummary>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.ensure_known(app_id)?;
        state.monthly.insert(app_id.to_string(), summaries);
        Ok(())
    }

    async fn push_exception(
        &self,
        application: &Application,
        date: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.ensure_known(&application.id)?;
        state.exceptions.push(ExceptionRecord {
            application: application.clone(),
            date,
        });
        Ok(())
    }

    async fn drain_exceptions(&self) -> StorageResult<Vec<ExceptionRecord>> {
        Ok(self.state.read().await.exceptions.clone())
    }

    async fn clear_exceptions(&self) -> StorageResult<()> {
        self.state.write().await.exceptions.clear();
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory store operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                (
                    "applications".to_string(),
                    state.applications.len().to_string(),
                ),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
