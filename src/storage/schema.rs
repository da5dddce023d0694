//! Row mapping between SQLite and the domain records
//!
//! Timestamps are stored as Unix milliseconds (UTC). Counts are stored as
//! `INTEGER` (i64) and converted back to `u64`, clamping corrupt negative
//! values to zero. Rendered gain strings are stored verbatim.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::{Application, DailySample, ExceptionRecord, MonthlySummary};

/// Convert a timestamp to Unix milliseconds for SQLite
pub fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert Unix milliseconds from SQLite to a timestamp
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn count(value: i64) -> u64 {
    value.max(0) as u64
}

pub fn application_from_row(row: &SqliteRow) -> Application {
    Application {
        id: row.get("id"),
        name: row.get("name"),
        domain: row.get("domain"),
        domain_id: count(row.get("domain_id")),
    }
}

pub fn daily_sample_from_row(row: &SqliteRow) -> DailySample {
    DailySample {
        date: millis_to_timestamp(row.get("date")),
        player_count: count(row.get("player_count")),
    }
}

pub fn monthly_summary_from_row(row: &SqliteRow) -> MonthlySummary {
    MonthlySummary {
        date: millis_to_timestamp(row.get("date")),
        average_players: count(row.get("average_players")),
        peak_players: count(row.get("peak_players")),
        gain: row.get("gain"),
        gain_percent: row.get("gain_percent"),
    }
}

/// Expects the application columns joined onto the exception row.
pub fn exception_from_row(row: &SqliteRow) -> ExceptionRecord {
    ExceptionRecord {
        application: application_from_row(row),
        date: millis_to_timestamp(row.get("date")),
    }
}
