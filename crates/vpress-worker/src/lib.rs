//! Job orchestration core.
//!
//! This crate provides:
//! - The [`Orchestrator`] operations: submit, confirm, query, purge, health
//! - The [`Dispatcher`] that compresses and delivers one job
//! - Exponential-backoff retry for delivery
//! - The [`Reaper`] that reclaims orphaned files and unconfirmed jobs

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod reaper;
pub mod retry;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WorkerConfig;
pub use dispatcher::Dispatcher;
pub use error::{OrchestratorError, OrchestratorResult};
pub use logging::JobLogger;
pub use orchestrator::{ConfirmOutcome, HealthReport, Orchestrator, SubmitReceipt};
pub use reaper::{ReapReport, Reaper, ReaperConfig};
pub use retry::{retry_async, RetryOutcome, RetryPolicy};
