//! Daily sample sanitization for the monthly run
//!
//! A sample survives sanitization only if it passes two filters:
//!
//! 1. **Retention window**: strictly younger than `retention_days` whole days,
//!    counted from the reference date.
//! 2. **Month window**: its month lies within the last three calendar months
//!    of the target month. Samples from a later month number must belong to
//!    the year before the target year.
//!
//! The filters overlap on purpose. The month window keeps stale samples out
//! of the stored history even if an earlier purge was skipped.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::{DailySample, Dated};

/// Default retention horizon in days
pub const RETENTION_LIMIT_DAYS: i64 = 90;

const HOURS_PER_DAY: i64 = 24;
const SECONDS_PER_HOUR: i64 = 3600;
const MONTHS: i32 = 12;
const MONTH_WINDOW: i32 = 3;

/// The calendar month a monthly run aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPeriod {
    /// 1-based month
    pub month: u32,
    pub year: i32,
}

impl TargetPeriod {
    /// `None` unless `month` is in `1..=12` and the year is representable.
    pub fn new(month: u32, year: i32) -> Option<Self> {
        let period = Self { month, year };
        period.is_valid().then_some(period)
    }

    /// The month before `reference`, rolling back a year in January.
    pub fn preceding(reference: DateTime<Utc>) -> Self {
        match reference.month() {
            1 => Self {
                month: 12,
                year: reference.year() - 1,
            },
            month => Self {
                month: month - 1,
                year: reference.year(),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start().is_some()
    }

    /// Midnight UTC on the first day of the period.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0).single()
    }
}

/// Result of sanitizing one application's daily history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    /// Samples to keep, date ascending
    pub retained: Vec<DailySample>,
    pub peak: u64,
    /// Integer mean of the target month's samples, 0 if there were none
    pub average: u64,
    /// Number of samples that fell in the target month
    pub counted: usize,
}

/// Sort chronologically, leaving already ordered input untouched.
pub fn sort_by_date<T: Dated>(items: &mut [T]) {
    if items.is_sorted_by_key(|item| item.date()) {
        return;
    }
    items.sort_by_key(|item| item.date());
}

/// Whole days from `b` to `a`.
///
/// Both timestamps are bucketed as `floor(hours since epoch) / 24` before
/// subtracting, so the result only depends on which day bucket each falls in.
pub fn day_diff(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    day_bucket(a) - day_bucket(b)
}

fn day_bucket(t: DateTime<Utc>) -> i64 {
    t.timestamp()
        .div_euclid(SECONDS_PER_HOUR)
        .div_euclid(HOURS_PER_DAY)
}

pub fn within_retention(sample: DateTime<Utc>, reference: DateTime<Utc>, retention_days: i64) -> bool {
    day_diff(reference, sample) < retention_days
}

pub fn within_month_window(sample: DateTime<Utc>, target: TargetPeriod) -> bool {
    let month_diff = target.month as i32 - sample.month() as i32;

    if (month_diff + MONTHS) % MONTHS >= MONTH_WINDOW {
        return false;
    }

    // a later month number can only be from the year before
    !(month_diff < 0 && sample.year() != target.year - 1)
}

/// Filter an application's daily history and compute the target month's
/// peak and average.
pub fn sanitize(
    samples: &[DailySample],
    target: TargetPeriod,
    reference: DateTime<Utc>,
    retention_days: i64,
) -> Sanitized {
    let mut retained = Vec::with_capacity(samples.len());
    let mut total: u64 = 0;
    let mut counted: usize = 0;
    let mut peak: u64 = 0;

    for sample in samples {
        if !within_retention(sample.date, reference, retention_days) {
            continue;
        }

        if !within_month_window(sample.date, target) {
            continue;
        }

        if sample.date.month() == target.month {
            peak = peak.max(sample.player_count);
            total = total.saturating_add(sample.player_count);
            counted += 1;
        }

        retained.push(*sample);
    }

    sort_by_date(&mut retained);

    let average = if counted > 0 { total / counted as u64 } else { 0 };

    Sanitized {
        retained,
        peak,
        average,
        counted,
    }
}
