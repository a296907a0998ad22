//! Enhanced logging utilities for formatted output.
//!
//! This module provides consistent, user-friendly logging utilities for counts,
//! rates, timings, and transcode summaries.

use std::time::{Duration, Instant};

use crate::sort::TranscodeStats;

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use mgtranscode_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(999), "999");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a percentage with specified decimal places.
///
/// # Arguments
///
/// * `value` - The fraction (0.0-1.0) to format as percentage
/// * `decimals` - Number of decimal places to include
///
/// # Examples
///
/// ```
/// use mgtranscode_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form (e.g. "2m 15s", "1h 30m", "45s").
///
/// # Examples
///
/// ```
/// use mgtranscode_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a rate of records per second, falling back to records per minute for
/// slow rates.
///
/// # Examples
///
/// ```
/// use mgtranscode_lib::logging::format_rate;
/// use std::time::Duration;
///
/// assert_eq!(format_rate(1000, Duration::from_secs(1)), "1,000 records/s");
/// assert_eq!(format_rate(30, Duration::from_secs(60)), "30.0 records/min");
/// ```
#[must_use]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} records/s", format_count(rate as u64))
    } else {
        let per_min = count as f64 / (secs / 60.0);
        format!("{per_min:.1} records/min")
    }
}

/// Logs a summary of a SAM to mgrec transcode.
pub fn log_transcode_summary(stats: &TranscodeStats) {
    log::info!("Transcode Summary:");
    log::info!("  SAM records read: {}", format_count(stats.sam_records));
    log::info!("  Read groups: {}", format_count(stats.read_groups));
    log::info!("  mgrec records written: {}", format_count(stats.output_records));
    log::info!("  Mapped records: {}", format_count(stats.mapped_records));
    log::info!("  Unmapped records: {}", format_count(stats.unmapped_records));

    if stats.output_records > 0 {
        let mapped = stats.mapped_records as f64 / stats.output_records as f64;
        log::info!("  Mapped fraction: {}", format_percent(mapped, 2));
    }

    log::info!(
        "  Sub-chunks merged: {} across {} references",
        format_count(stats.sub_chunks_written),
        stats.references
    );
    stats.clean.log_warnings();
}

/// Operation timing and summary helper.
///
/// # Examples
///
/// ```no_run
/// use mgtranscode_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Transcoding records");
///
/// // ... do work ...
///
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time since the timer was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with record count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
