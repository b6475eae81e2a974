//! Job lifecycle metrics.
//!
//! Recording is a no-op until the binary installs a recorder.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vpress_jobs_submitted_total";
    pub const JOBS_DELIVERED_TOTAL: &str = "vpress_jobs_delivered_total";
    pub const JOBS_CONFIRMED_TOTAL: &str = "vpress_jobs_confirmed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vpress_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "vpress_jobs_in_flight";
    pub const DELIVERY_ATTEMPTS_TOTAL: &str = "vpress_delivery_attempts_total";
    pub const COMPRESSION_DURATION_SECONDS: &str = "vpress_compression_duration_seconds";
    pub const REAPED_FILES_TOTAL: &str = "vpress_reaped_files_total";
    pub const REAPED_RECORDS_TOTAL: &str = "vpress_reaped_records_total";
}

pub fn record_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_delivered(attempts: u32) {
    counter!(names::JOBS_DELIVERED_TOTAL).increment(1);
    histogram!("vpress_delivery_attempts_per_job").record(attempts as f64);
}

pub fn record_confirmed() {
    counter!(names::JOBS_CONFIRMED_TOTAL).increment(1);
}

/// Record a job entering `failed`, labelled with the stage that failed.
pub fn record_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn set_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

pub fn record_delivery_attempt() {
    counter!(names::DELIVERY_ATTEMPTS_TOTAL).increment(1);
}

pub fn record_compression_duration(duration_secs: f64) {
    histogram!(names::COMPRESSION_DURATION_SECONDS).record(duration_secs);
}

/// Record one reap pass. `reason` is "orphan", "unconfirmed" or "expired".
pub fn record_reaped(reason: &str, files: usize, records: usize) {
    let labels = [("reason", reason.to_string())];
    if files > 0 {
        counter!(names::REAPED_FILES_TOTAL, &labels).increment(files as u64);
    }
    if records > 0 {
        counter!(names::REAPED_RECORDS_TOTAL, &labels).increment(records as u64);
    }
}
