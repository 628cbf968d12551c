/// Job status definitions and the allowed transitions between them
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of an extraction job
///
/// ```text
/// pending ──► processing ──► completed
///    │             ├───────► failed
///    └─────────────┴───────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    // ===== Active States =====
    /// Job has been accepted and is waiting for a free worker
    Pending,

    /// Job is crawling pages
    Processing,

    // ===== Terminal States =====
    /// Extraction finished and the result is stored
    Completed,

    /// Extraction failed; the job record carries the error
    Failed,

    /// Job was cancelled by a caller
    Cancelled,
}

impl JobStatus {
    /// Returns true if this is a terminal state (no further transitions)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the job may still make progress
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Cancelled)
        )
    }

    /// Lowercase name, as used in serialized records and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
