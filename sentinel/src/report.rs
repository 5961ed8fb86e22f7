use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sentinel_core::types::{Snapshot, SnapshotRow};

const TIME_FORMAT: &str = "%H:%M:%S UTC";
const OVERFLOW: &str = "overflow";

fn format_time(millis: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .map(|time| time.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_amount(amount: Option<Decimal>) -> String {
    amount
        .map(|amount| amount.normalize().to_string())
        .unwrap_or_else(|| OVERFLOW.to_string())
}

fn format_diff(diff: Decimal) -> String {
    let diff = diff.normalize();
    if diff.is_sign_positive() {
        format!("+{}", diff)
    } else {
        diff.to_string()
    }
}

fn status(row: &SnapshotRow) -> &'static str {
    if row.record.stale {
        "Stale"
    } else if row.record.changed {
        "Changed"
    } else {
        "Stable"
    }
}

/// Plain-text table of a snapshot, one line per address in configured order.
pub fn render(snapshot: &Snapshot) -> Result<String, fmt::Error> {
    let mut out = String::new();

    let last_checked = snapshot
        .last_checked_at_millis
        .map(format_time)
        .unwrap_or_else(|| "never".to_string());
    writeln!(
        out,
        "{} | cycle {} | last checked {}",
        snapshot.token, snapshot.cycle, last_checked
    )?;

    if snapshot.is_cycle_failure() {
        writeln!(
            out,
            "Unable to refresh: all {} balance fetches failed",
            snapshot.failed_fetches
        )?;
    } else if snapshot.failed_fetches > 0 {
        writeln!(
            out,
            "{} of {} balance fetches failed",
            snapshot.failed_fetches,
            snapshot.len()
        )?;
    }

    writeln!(
        out,
        "{:<68} {:>24} {:>24} {:>8} {:>24} {:>14}",
        "ADDRESS", "CURRENT", "PREVIOUS", "STATUS", "DIFF", "LAST CHANGE"
    )?;

    for row in &snapshot.rows {
        let diff = match row.record.delta() {
            Some(_) => snapshot
                .scaled_delta(&row.record)
                .map(format_diff)
                .unwrap_or_else(|| OVERFLOW.to_string()),
            None => String::new(),
        };
        let last_change = row
            .record
            .observed_at_millis
            .map(format_time)
            .unwrap_or_else(|| "-".to_string());

        writeln!(
            out,
            "{:<68} {:>24} {:>24} {:>8} {:>24} {:>14}",
            row.address,
            format_amount(snapshot.scaled_current(&row.record)),
            format_amount(snapshot.scaled_previous(&row.record)),
            status(row),
            diff,
            last_change
        )?;
    }

    Ok(out)
}
