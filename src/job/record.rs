//! What the job record store and the result store hold, plus the read views
//! handed back to pollers.

use super::{ExtractionRequest, JobId, JobStatus};
use crate::crawler::Link;
use crate::JobError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mutable counters of a job, updated as pages are extracted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub pages_extracted: u32,
    pub total_characters: u64,
    pub total_links: u64,
    pub message: String,
}

/// One job as stored in the job record store
///
/// Records are only mutated by the orchestrator, and every mutation goes through
/// one of the helpers below so the state machine and the `completed_at` /
/// `error` invariants are enforced in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub request: ExtractionRequest,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl JobRecord {
    /// Creates a fresh pending record
    pub fn new(id: JobId, request: ExtractionRequest) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            request,
            progress: JobProgress {
                message: "Job created, waiting to start".to_string(),
                ..JobProgress::default()
            },
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Moves the record to `next`, updating the message
    ///
    /// Entering a terminal state stamps `completed_at` the first and only time.
    pub fn transition(&mut self, next: JobStatus, message: impl Into<String>) -> Result<(), JobError> {
        self.transition_at(next, message, Utc::now())
    }

    fn transition_at(
        &mut self,
        next: JobStatus,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.progress.message = message.into();
        if next.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Processing, "Starting extraction...")
    }

    /// Records the running totals after a page has been extracted
    pub fn record_page(&mut self, pages_extracted: u32, total_characters: u64, total_links: u64) {
        self.progress.pages_extracted = pages_extracted;
        self.progress.total_characters = total_characters;
        self.progress.total_links = total_links;
        self.progress.message = format!("Extracted page {}", pages_extracted);
    }

    /// Marks the job completed with the summary counts of its stored result
    pub fn complete(&mut self, result: &ExtractionResult) -> Result<(), JobError> {
        let message = format!(
            "Successfully extracted {} page(s)",
            result.pages_extracted
        );
        self.transition_at(JobStatus::Completed, message, result.completed_at)?;
        self.progress.pages_extracted = result.pages_extracted;
        self.progress.total_characters = result.total_characters;
        self.progress.total_links = result.total_links;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        self.transition(JobStatus::Failed, format!("Extraction failed: {}", error))?;
        self.error = Some(error);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Cancelled, "Extraction cancelled")
    }

    /// Integer percentage shown to pollers
    ///
    /// Never reports 100 before the job has actually completed, since a paginated
    /// crawl can stop early and the last page may still be in flight.
    pub fn progress_percent(&self) -> u8 {
        match self.status {
            JobStatus::Pending => 0,
            JobStatus::Completed => 100,
            _ => {
                let budget = u64::from(self.request.page_budget().max(1));
                let pct = u64::from(self.progress.pages_extracted) * 100 / budget;
                pct.min(99) as u8
            }
        }
    }

    pub fn status_view(&self) -> StatusView {
        StatusView {
            job_id: self.id,
            status: self.status,
            pages_extracted: self.progress.pages_extracted,
            total_characters: self.progress.total_characters,
            total_links: self.progress.total_links,
            progress: self.progress_percent(),
            message: self.progress.message.clone(),
            error: if self.status == JobStatus::Failed {
                self.error.clone()
            } else {
                None
            },
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Status read output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub pages_extracted: u32,
    pub total_characters: u64,
    pub total_links: u64,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// The durable payload of a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub job_id: JobId,
    pub url: String,
    pub selector: Option<String>,
    pub pages_extracted: u32,
    pub total_characters: u64,
    pub total_links: u64,
    pub content: String,
    pub links: Vec<Link>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExtractionResult {
    /// Builds the result for `record`, deriving the summary counts from the payload
    pub fn new(record: &JobRecord, content: String, links: Vec<Link>, pages_extracted: u32) -> Self {
        Self {
            job_id: record.id,
            url: record.request.url.clone(),
            selector: record.request.selector.clone(),
            pages_extracted,
            total_characters: content.chars().count() as u64,
            total_links: links.len() as u64,
            content,
            links,
            created_at: record.created_at,
            completed_at: Utc::now(),
        }
    }
}
