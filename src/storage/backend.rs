//! Metric store trait definition
//!
//! This module defines the `MetricStore` trait that the aggregation engine
//! reads from and writes to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use crate::{Application, DailySample, ExceptionRecord, MonthlySummary};

/// Health status of the metric store
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the store operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Persistent storage for tracked applications and their statistics
///
/// Per application the store holds two collections, daily samples and
/// monthly summaries. The engine reads a collection, transforms it and writes
/// it back wholesale through the `replace_*` methods. There is no optimistic
/// concurrency: the last writer wins. Callers must make sure that a single
/// application is never processed by two batches at once.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as one store is shared by every
/// task of a monthly run.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Register a tracked application
    async fn add_application(&self, application: Application) -> StorageResult<()>;

    /// All tracked applications
    async fn get_application_list(&self) -> StorageResult<Vec<Application>>;

    /// Daily samples of an application, in no particular order
    async fn get_daily_samples(&self, app_id: &str) -> StorageResult<Vec<DailySample>>;

    /// Replace all daily samples of an application
    async fn replace_daily_samples(
        &self,
        app_id: &str,
        samples: Vec<DailySample>,
    ) -> StorageResult<()>;

    /// Append a single daily sample
    async fn push_daily_sample(&self, app_id: &str, sample: DailySample) -> StorageResult<()>;

    /// Monthly summaries of an application, in no particular order
    async fn get_monthly_summaries(&self, app_id: &str) -> StorageResult<Vec<MonthlySummary>>;

    /// Replace all monthly summaries of an application
    async fn replace_monthly_summaries(
        &self,
        app_id: &str,
        summaries: Vec<MonthlySummary>,
    ) -> StorageResult<()>;

    /// Queue an application for a daily retry
    async fn push_exception(&self, application: &Application, date: DateTime<Utc>)
    -> StorageResult<()>;

    /// Every queued exception, oldest first. Does not remove anything.
    async fn drain_exceptions(&self) -> StorageResult<Vec<ExceptionRecord>>;

    /// Remove every queued exception
    async fn clear_exceptions(&self) -> StorageResult<()>;

    /// Check store health
    ///
    /// Performs a lightweight operation to verify the store is operational.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the store and release resources
    async fn close(&self) -> StorageResult<()>;
}
