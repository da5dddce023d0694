pub mod aggregate;
pub mod config;
pub mod exceptions;
pub mod orchestrator;
pub mod provider;
pub mod sanitize;
pub mod storage;
pub mod util;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A tracked application whose player counts are aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    /// External stats provider domain (e.g. "steam")
    pub domain: String,
    /// Identifier of the application within `domain`
    pub domain_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySample {
    pub date: DateTime<Utc>,
    pub player_count: u64,
}

/// Aggregated statistics for one calendar month.
///
/// `gain` and `gain_percent` are kept in their rendered form, with
/// [`aggregate::NO_DATA`] standing in when there is nothing to compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySummary {
    /// Always the first day of the month, midnight UTC
    pub date: DateTime<Utc>,
    pub average_players: u64,
    pub peak_players: u64,
    pub gain: String,
    pub gain_percent: String,
}

/// An application whose daily processing failed on `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    pub application: Application,
    pub date: DateTime<Utc>,
}

/// Records that can be ordered chronologically.
pub trait Dated {
    fn date(&self) -> DateTime<Utc>;
}

impl Dated for DailySample {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

impl Dated for MonthlySummary {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}
