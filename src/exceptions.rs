//! Exception queue policy
//!
//! Failed daily fetches are queued as `(application, date)` pairs and retried
//! by the recovery run. Draining is destructive and happens before any retry
//! is attempted: a record that fails again only comes back if the retry's own
//! failure path re-queues it. Single writer per process is assumed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};

use crate::storage::{MetricStore, StorageResult};
use crate::{Application, ExceptionRecord};

#[derive(Clone)]
pub struct ExceptionQueue {
    store: Arc<dyn MetricStore>,
}

impl ExceptionQueue {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, application), fields(app_id = %application.id))]
    pub async fn push(&self, application: &Application, date: DateTime<Utc>) -> StorageResult<()> {
        debug!("queueing {} for retry on {}", application.name, date.date_naive());
        self.store.push_exception(application, date).await
    }

    /// Take every queued record and empty the queue.
    ///
    /// If clearing fails the records are still returned; they will be seen
    /// again by the next recovery run.
    #[instrument(skip(self))]
    pub async fn drain_and_clear(&self) -> StorageResult<Vec<ExceptionRecord>> {
        let records = self.store.drain_exceptions().await?;

        if let Err(e) = self.store.clear_exceptions().await {
            error!("failed to clear exception queue: {e}");
        }

        debug!("drained {} exception records", records.len());
        Ok(records)
    }
}
