//! Job module: the extraction job data model and its orchestrator
//!
//! # Components
//!
//! - `JobId`: opaque identifier shared by a job's status record and its result
//! - `JobStatus`: the job state machine (pending → processing → completed/failed/cancelled)
//! - `ExtractionRequest`: the validated, immutable snapshot of what to extract
//! - `JobRecord` / `ExtractionResult`: what the status store and result store hold
//! - `JobOrchestrator`: creates jobs, runs them in the background, and answers polls

mod orchestrator;
mod record;
mod request;
mod state;

pub use orchestrator::{JobOrchestrator, OrchestratorConfig};
pub use record::{ExtractionResult, JobProgress, JobRecord, StatusView};
pub use request::{ExtractionRequest, MAX_PAGES_LIMIT, MAX_WAIT_TIME_SECS};
pub use state::JobStatus;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of an extraction job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random job id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
