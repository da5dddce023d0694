//! Monthly summary construction
//!
//! Gain figures compare the new month's average with the chronologically
//! last existing summary. They are stored rendered:
//!
//! - `gain`: signed integer delta, or [`NO_DATA`] without a previous summary
//! - `gain_percent`: `gain / previous.average` in integer arithmetic, rendered
//!   with two decimals and a `%` suffix, or [`NO_DATA`] when the previous
//!   average is absent or zero
//!
//! The percentage is intentionally computed on the truncated integer ratio
//! (a 50 player gain on a 100 player average renders as `0.00%`). Stored
//! histories already contain values computed this way.
//!
//! Appending is not idempotent. Aggregating the same month twice stores a
//! second summary for it, with its gain computed against the first one.

use tracing::debug;

use crate::MonthlySummary;
use crate::sanitize::{TargetPeriod, sort_by_date};

/// Placeholder for gain figures that have nothing to compare against
pub const NO_DATA: &str = "-";

/// `None` if `target` does not name a calendar month.
pub fn build_monthly_summary(
    previous: Option<&MonthlySummary>,
    peak: u64,
    average: u64,
    target: TargetPeriod,
) -> Option<MonthlySummary> {
    let date = target.start()?;

    let (gain, gain_percent) = match previous {
        Some(previous) => {
            let gain = average as i64 - previous.average_players as i64;
            let gain_percent = if previous.average_players > 0 {
                format_percent(gain / previous.average_players as i64)
            } else {
                NO_DATA.to_string()
            };
            (gain.to_string(), gain_percent)
        }
        None => (NO_DATA.to_string(), NO_DATA.to_string()),
    };

    Some(MonthlySummary {
        date,
        average_players: average,
        peak_players: peak,
        gain,
        gain_percent,
    })
}

fn format_percent(ratio: i64) -> String {
    format!("{:.2}%", ratio as f32)
}

/// Sort `history`, build the summary for `target` against its last entry and
/// append it. Nothing is appended for an invalid `target`.
pub fn append_monthly_summary(
    history: &mut Vec<MonthlySummary>,
    peak: u64,
    average: u64,
    target: TargetPeriod,
) -> Option<&MonthlySummary> {
    sort_by_date(history);

    let summary = build_monthly_summary(history.last(), peak, average, target)?;
    debug!(
        "built summary for {}-{:02}: avg {} peak {} gain {} ({})",
        target.year,
        target.month,
        summary.average_players,
        summary.peak_players,
        summary.gain,
        summary.gain_percent
    );

    history.push(summary);
    history.last()
}
