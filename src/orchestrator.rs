//! Batch orchestration for the daily, monthly and recovery runs
//!
//! ## Monthly run
//!
//! ```text
//!  application list ──► spawn one task per application (no limit)
//!                             │
//!                             ▼
//!        read daily ─► sanitize ─► replace daily ─► read monthly
//!                             ─► append summary ─► replace monthly
//!                             │
//!                             ▼  exactly one bool per task
//!                      outcome channel ──► tally until all reported
//!                                          or the deadline fires
//! ```
//!
//! When the deadline fires the run returns with what it has. Tasks still in
//! flight are not aborted: they finish their store writes in the background
//! and their outcome is dropped. The gap shows up as
//! [`RunReport::abandoned`].
//!
//! ## Daily and recovery runs
//!
//! Sequential. A failing application is pushed onto the exception queue and
//! the run moves on to the next one.
//!
//! Runs must not overlap. Nothing here prevents two batches from doing a
//! read-modify-write on the same application at the same time; the caller's
//! scheduler has to.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::Application;
use crate::aggregate::append_monthly_summary;
use crate::exceptions::ExceptionQueue;
use crate::provider::StatsProvider;
use crate::sanitize::{RETENTION_LIMIT_DAYS, TargetPeriod, sanitize};
use crate::storage::MetricStore;

/// Wall-clock budget of a monthly run
pub const MONTHLY_DEADLINE: Duration = Duration::from_secs(8 * 60);

#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// Daily samples at least this many days old are purged
    pub retention_days: i64,

    /// Global budget for one monthly run
    pub deadline: Duration,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            retention_days: RETENTION_LIMIT_DAYS,
            deadline: MONTHLY_DEADLINE,
        }
    }
}

/// Outcome tally of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Applications the run started work for
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunReport {
    /// Tasks that had not reported when the run returned
    pub fn abandoned(&self) -> usize {
        self.total.saturating_sub(self.succeeded + self.failed)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success: {}, errors: {}, unreported: {} (of {})",
            self.succeeded,
            self.failed,
            self.abandoned(),
            self.total
        )
    }
}

/// Sends the task's outcome when dropped
///
/// A task reports `false` unless it reaches [`OutcomeGuard::succeed`], which
/// covers early returns and panics alike.
struct OutcomeGuard {
    tx: mpsc::UnboundedSender<bool>,
    success: bool,
}

impl OutcomeGuard {
    fn new(tx: mpsc::UnboundedSender<bool>) -> Self {
        Self { tx, success: false }
    }

    fn succeed(mut self) {
        self.success = true;
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        // the receiver is gone once the run has timed out
        let _ = self.tx.send(self.success);
    }
}

pub struct Orchestrator {
    store: Arc<dyn MetricStore>,
    provider: Arc<dyn StatsProvider>,
    exceptions: ExceptionQueue,
    settings: AggregationSettings,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn MetricStore>,
        provider: Arc<dyn StatsProvider>,
        settings: AggregationSettings,
    ) -> Self {
        Self {
            exceptions: ExceptionQueue::new(store.clone()),
            store,
            provider,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops monthly tasks before their next store access.
    ///
    /// The run deadline never triggers it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn exceptions(&self) -> &ExceptionQueue {
        &self.exceptions
    }

    /// Fetch and store today's sample for every tracked application.
    #[instrument(skip(self))]
    pub async fn run_daily(&self, date: DateTime<Utc>) -> RunReport {
        debug!("initiate daily execution");

        let applications = match self.store.get_application_list().await {
            Ok(applications) => applications,
            Err(e) => {
                error!("failed to retrieve app list: {e}");
                return RunReport::default();
            }
        };

        let mut report = RunReport {
            total: applications.len(),
            ..Default::default()
        };

        for (processed, application) in applications.iter().enumerate() {
            trace!("daily progress: {}/{}", processed + 1, report.total);

            match self.process_daily(application, date).await {
                Ok(()) => report.succeeded += 1,
                Err(_) => report.failed += 1,
            }
        }

        info!("conclude daily execution: {report}");
        report
    }

    /// Aggregate the month before `reference` for every tracked application.
    #[instrument(skip(self))]
    pub async fn run_monthly(&self, reference: DateTime<Utc>) -> RunReport {
        debug!("initiate monthly execution");

        let applications = match self.store.get_application_list().await {
            Ok(applications) => applications,
            Err(e) => {
                error!("failed to retrieve app list: {e}");
                return RunReport::default();
            }
        };

        self.run_monthly_for(applications, TargetPeriod::preceding(reference), reference)
            .await
    }

    /// Fan out one aggregation task per application and tally their outcomes
    /// until all have reported or the deadline passes.
    ///
    /// An invalid `target` runs nothing and returns an empty report.
    pub async fn run_monthly_for(
        &self,
        applications: Vec<Application>,
        target: TargetPeriod,
        reference: DateTime<Utc>,
    ) -> RunReport {
        if !target.is_valid() {
            error!(
                "invalid monthly target period {}-{:02}, skipping {} applications",
                target.year,
                target.month,
                applications.len()
            );
            return RunReport::default();
        }

        let mut report = RunReport {
            total: applications.len(),
            ..Default::default()
        };

        let (tx, mut rx) = mpsc::unbounded_channel();

        for application in applications {
            let task = MonthlyTask {
                store: self.store.clone(),
                application,
                target,
                reference,
                retention_days: self.settings.retention_days,
                cancel: self.shutdown.child_token(),
            };
            let guard = OutcomeGuard::new(tx.clone());
            tokio::spawn(task.run(guard));
        }
        drop(tx);

        let deadline = tokio::time::sleep(self.settings.deadline);
        tokio::pin!(deadline);

        for received in 1..=report.total {
            tokio::select! {
                outcome = rx.recv() => match outcome {
                    Some(true) => report.succeeded += 1,
                    Some(false) => report.failed += 1,
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        "monthly process runtime exceeded {:?}, returning early",
                        self.settings.deadline
                    );
                    break;
                }
            }
            trace!("monthly progress: {received}/{}", report.total);
        }

        if report.abandoned() > 0 {
            warn!("{} monthly tasks did not report in time", report.abandoned());
        }

        info!(
            "conclude monthly execution for {}-{:02}: {report}",
            target.year, target.month
        );
        report
    }

    /// Retry every queued exception once.
    #[instrument(skip(self))]
    pub async fn run_recovery(&self) -> RunReport {
        let records = match self.exceptions.drain_and_clear().await {
            Ok(records) => records,
            Err(e) => {
                error!("failed to retrieve exceptions: {e}");
                return RunReport::default();
            }
        };

        info!("retrying {} failed daily updates", records.len());

        let mut report = RunReport {
            total: records.len(),
            ..Default::default()
        };

        for record in &records {
            match self.process_daily(&record.application, record.date).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    error!(
                        "daily retry ({}) failed for app {}: {e:#}",
                        record.date.date_naive(),
                        record.application.id
                    );
                    report.failed += 1;
                }
            }
        }

        info!("recovery process complete: {report}");
        report
    }

    /// Fetch and persist one daily sample, queueing the application for
    /// retry on failure.
    async fn process_daily(&self, application: &Application, date: DateTime<Utc>) -> Result<()> {
        debug!("daily process on app: {} - id: {}", application.name, application.id);

        let result = self.fetch_and_store(application, date).await;

        if let Err(e) = &result {
            error!("daily process failed for {}: {e:#}", application.id);
            if let Err(queue_err) = self.exceptions.push(application, date).await {
                error!(
                    "error inserting app {} into exception queue: {queue_err}",
                    application.domain_id
                );
            }
        }

        result
    }

    async fn fetch_and_store(&self, application: &Application, date: DateTime<Utc>) -> Result<()> {
        let sample = self
            .provider
            .fetch_daily(date, &application.domain, application.domain_id)
            .await
            .context("failed to fetch daily stats")?;

        self.store
            .push_daily_sample(&application.id, sample)
            .await
            .context("failed to store daily sample")?;

        Ok(())
    }
}

/// Everything one monthly aggregation task owns
struct MonthlyTask {
    store: Arc<dyn MetricStore>,
    application: Application,
    target: TargetPeriod,
    reference: DateTime<Utc>,
    retention_days: i64,
    cancel: CancellationToken,
}

impl MonthlyTask {
    async fn run(self, guard: OutcomeGuard) {
        match self.aggregate().await {
            Ok(()) => {
                debug!(
                    "monthly process success for app: {} - id: {}",
                    self.application.name, self.application.id
                );
                guard.succeed();
            }
            Err(e) => error!(
                "monthly process failed for app {}: {e:#}",
                self.application.id
            ),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            anyhow::bail!("monthly task cancelled");
        }
        Ok(())
    }

    async fn aggregate(&self) -> Result<()> {
        let app_id = self.application.id.as_str();
        debug!(
            "monthly process on app: {} - id: {}",
            self.application.name, app_id
        );

        self.target
            .start()
            .context("invalid monthly target period")?;
        self.check_cancelled()?;

        let samples = self
            .store
            .get_daily_samples(app_id)
            .await
            .context("failed to retrieve daily samples")?;

        let sanitized = sanitize(&samples, self.target, self.reference, self.retention_days);

        debug!(
            "computed average player count of {} for {}-{:02} using {} dates",
            sanitized.average, self.target.year, self.target.month, sanitized.counted
        );

        self.check_cancelled()?;

        self.store
            .replace_daily_samples(app_id, sanitized.retained)
            .await
            .context("failed to update daily samples")?;

        let mut history = self
            .store
            .get_monthly_summaries(app_id)
            .await
            .context("failed to retrieve monthly summaries")?;

        append_monthly_summary(&mut history, sanitized.peak, sanitized.average, self.target)
            .context("invalid monthly target period")?;

        self.check_cancelled()?;

        self.store
            .replace_monthly_summaries(app_id, history)
            .await
            .context("failed to update monthly summaries")?;

        Ok(())
    }
}
