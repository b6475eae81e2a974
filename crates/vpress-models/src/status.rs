//! Job status machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Lifecycle state of a job.
///
/// Transitions are monotonic:
/// `queued -> processing -> {awaiting_confirmation -> completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a dispatcher slot
    #[default]
    Queued,
    /// Compression or delivery in progress
    Processing,
    /// Delivered; local files kept until the consumer confirms
    AwaitingConfirmation,
    /// Consumer confirmed receipt, local files released
    Completed,
    /// Compression failed or delivery retries were exhausted
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::AwaitingConfirmation,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::AwaitingConfirmation => "awaiting_confirmation",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// No further store mutation is allowed once reached, except deletion.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Files referenced by a record in an active state must not be deleted.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, AwaitingConfirmation)
                | (Processing, Failed)
                | (AwaitingConfirmation, Completed)
        )
    }

    /// Position along the lifecycle, used to check that observed
    /// sequences never move backwards.
    pub fn stage(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::AwaitingConfirmation | JobStatus::Failed => 2,
            JobStatus::Completed => 3,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ModelError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::AwaitingConfirmation));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::AwaitingConfirmation.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_no_skips_or_reversals() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::AwaitingConfirmation));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::AwaitingConfirmation.can_transition_to(JobStatus::Failed));
        for next in JobStatus::ALL {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_terminal_and_active() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::AwaitingConfirmation.is_active());
        assert!(JobStatus::Queued.is_active());
    }

    #[test]
    fn test_serde_and_parse() {
        let json = serde_json::to_string(&JobStatus::AwaitingConfirmation).unwrap();
        assert_eq!(json, "\"awaiting_confirmation\"");

        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("stale".parse::<JobStatus>().is_err());
    }
}
