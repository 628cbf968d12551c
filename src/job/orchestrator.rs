//! Job orchestrator: the composition root of every extraction job
//!
//! ## Architecture
//!
//! The orchestrator owns the two stores, the pagination crawler, a semaphore that
//! bounds concurrently executing crawls, and a table of running executions. Each
//! entry in that table holds:
//! - a cancel signal (`watch` channel) checked by the crawler between pages
//! - a per-job write guard serializing every store write for that job
//! - the Tokio task handle
//!
//! ## Completion ordering
//!
//! The result is written before the status flips to `completed`, and both happen
//! under the job's write guard. `cancel` takes the same guard, so a poller never
//! observes `completed` without a result, nor `cancelled` with one. If the
//! `completed` write itself fails, the result is evicted and the job is failed.
//!
//! ## Expiry
//!
//! A background sweeper purges expired job records every `purge_interval`, so
//! records nobody polls again do not accumulate. It stops on `shutdown` or once
//! every orchestrator handle is dropped.

use crate::config::Config;
use crate::crawler::{
    ContentMatcher, CrawlOutcome, CrawlProgress, CssMatcher, HttpRenderer, PageRenderer,
    PaginationCrawler, ProgressSink,
};
use crate::job::{ExtractionRequest, ExtractionResult, JobId, JobRecord, JobStatus, StatusView};
use crate::storage::{self, FailureRecord, JobStore, ResultStore};
use crate::{ExtractionError, HarvestError, JobError, JobResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Tunables of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Crawls allowed to execute at once; further jobs wait as `pending`
    pub max_concurrent_jobs: usize,
    /// Deadline for a whole crawl, if any
    pub job_timeout: Option<Duration>,
    /// Politeness delay between page fetches of one job
    pub page_delay: Duration,
    /// Period of the expired job record sweep
    pub purge_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_timeout: None,
            page_delay: Duration::ZERO,
            purge_interval: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_jobs: config.service.max_concurrent_jobs as usize,
            job_timeout: config.service.job_timeout(),
            page_delay: config.crawler.page_delay(),
            purge_interval: config.service.purge_interval(),
        }
    }
}

/// An execution that has been spawned and not yet reaped
struct RunningJob {
    cancel: watch::Sender<bool>,
    guard: Arc<Mutex<()>>,
    handle: JoinHandle<()>,
}

struct Inner {
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    crawler: PaginationCrawler,
    permits: Arc<Semaphore>,
    running: Mutex<HashMap<JobId, RunningJob>>,
    job_timeout: Option<Duration>,
    stop_sweeper: watch::Sender<bool>,
}

/// Creates extraction jobs, runs them in the background and answers polls
///
/// Cloning is cheap and every clone drives the same set of jobs.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

/// Locks a mutex whose protected state cannot be left inconsistent by a panic
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        renderer: Arc<dyn PageRenderer>,
        matcher: Arc<dyn ContentMatcher>,
        config: OrchestratorConfig,
    ) -> Self {
        let (stop_sweeper, stop_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            jobs,
            results,
            crawler: PaginationCrawler::new(renderer, matcher, config.page_delay),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            running: Mutex::new(HashMap::new()),
            job_timeout: config.job_timeout,
            stop_sweeper,
        });

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(sweep_expired(
                    Arc::downgrade(&inner),
                    config.purge_interval,
                    stop_rx,
                ));
            }
            Err(_) => warn!("No Tokio runtime, expired job records are only purged on read"),
        }

        Self { inner }
    }

    /// Builds an orchestrator with the HTTP renderer, the CSS matcher and the
    /// stores selected in `config`
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let (jobs, results) = storage::open_stores(&config.storage, config.service.job_ttl())?;
        let renderer = Arc::new(HttpRenderer::new(&config.renderer)?);

        Ok(Self::new(
            jobs,
            results,
            renderer,
            Arc::new(CssMatcher::new()),
            OrchestratorConfig::from(config),
        ))
    }

    /// Validates `request`, records a pending job and launches its extraction
    ///
    /// Returns as soon as the pending record is stored; no page is fetched before
    /// this returns. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// * `JobError::InvalidRequest` - The request breaks an invariant; nothing is stored
    /// * `JobError::Store` - The pending record could not be written
    pub fn create(&self, request: ExtractionRequest) -> JobResult<JobId> {
        request.validate()?;

        let id = JobId::new();
        let record = JobRecord::new(id, request);
        self.inner.jobs.put(&record)?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let guard = Arc::new(Mutex::new(()));
        let url = record.request.url.clone();

        let mut running = lock(&self.inner.running);
        running.retain(|_, job| !job.handle.is_finished());

        let execution = Arc::clone(&self.inner)
            .execute(record, cancel_rx, Arc::clone(&guard))
            .instrument(info_span!("job", job_id = %id));
        running.insert(
            id,
            RunningJob {
                cancel: cancel_tx,
                guard,
                handle: tokio::spawn(execution),
            },
        );

        info!(job_id = %id, url = %url, "Job created");
        Ok(id)
    }

    /// Gets the current status of a job
    ///
    /// # Errors
    ///
    /// * `JobError::NotFound` - Unknown or expired job id
    pub fn get_status(&self, id: JobId) -> JobResult<StatusView> {
        self.record(id).map(|record| record.status_view())
    }

    /// Gets the result of a completed job
    ///
    /// # Errors
    ///
    /// * `JobError::NotFound` - Unknown or expired job id
    /// * `JobError::NotReady` - The job has not completed; carries its status and message
    pub fn get_result(&self, id: JobId) -> JobResult<ExtractionResult> {
        let record = self.record(id)?;
        if record.status != JobStatus::Completed {
            return Err(JobError::NotReady {
                job_id: id,
                status: record.status,
                message: record.progress.message,
            });
        }

        self.inner.results.get(id)?.ok_or(JobError::NotFound(id))
    }

    /// Cancels a pending or processing job
    ///
    /// A processing crawl stops at its next checkpoint, after the page currently
    /// being fetched. Cancelling a job that already reached a terminal state is a
    /// no-op and returns its unchanged status.
    ///
    /// # Errors
    ///
    /// * `JobError::NotFound` - Unknown or expired job id
    pub fn cancel(&self, id: JobId) -> JobResult<StatusView> {
        let record = self.record(id)?;
        if record.status.is_terminal() {
            return Ok(record.status_view());
        }

        let guard = lock(&self.inner.running)
            .get(&id)
            .map(|job| Arc::clone(&job.guard));
        let _held = guard.as_deref().map(lock);

        if let Some(job) = lock(&self.inner.running).get(&id) {
            job.cancel.send_replace(true);
        }

        // The execution may have finished while we waited for the guard
        let mut record = self.record(id)?;
        if record.status.is_terminal() {
            return Ok(record.status_view());
        }

        record.cancel()?;
        self.inner.jobs.put(&record)?;
        info!(job_id = %id, pages = record.progress.pages_extracted, "Job cancelled");

        Ok(record.status_view())
    }

    /// Removes a stored result, returning whether one existed
    pub fn evict_result(&self, id: JobId) -> JobResult<bool> {
        Ok(self.inner.results.evict(id)?)
    }

    /// Logged failures of a job, oldest first
    pub fn failures(&self, id: JobId) -> JobResult<Vec<FailureRecord>> {
        Ok(self.inner.results.failures(id)?)
    }

    /// Drops expired job records, returning how many were removed
    pub fn purge_expired(&self) -> JobResult<usize> {
        Ok(self.inner.jobs.purge_expired()?)
    }

    /// Number of executions that have been spawned and not yet finished
    pub fn active_jobs(&self) -> usize {
        lock(&self.inner.running)
            .values()
            .filter(|job| !job.handle.is_finished())
            .count()
    }

    /// Cancels every running job, stops the sweeper and waits for all executions to exit
    pub async fn shutdown(&self) {
        self.inner.stop_sweeper.send_replace(true);

        let ids: Vec<JobId> = lock(&self.inner.running).keys().copied().collect();
        for id in ids {
            if let Err(e) = self.cancel(id) {
                warn!(job_id = %id, error = %e, "Failed to cancel job during shutdown");
            }
        }

        let handles: Vec<(JobId, JoinHandle<()>)> =
            lock(&self.inner.running).drain().map(|(id, job)| (id, job.handle)).collect();
        for (id, handle) in handles {
            if let Err(e) = handle.await {
                warn!(job_id = %id, error = %e, "Job execution ended abnormally");
            }
        }

        info!("Orchestrator shut down");
    }

    fn record(&self, id: JobId) -> JobResult<JobRecord> {
        self.inner.jobs.get(id)?.ok_or(JobError::NotFound(id))
    }
}

impl Inner {
    /// Body of one job's background task
    async fn execute(
        self: Arc<Self>,
        record: JobRecord,
        mut cancel: watch::Receiver<bool>,
        guard: Arc<Mutex<()>>,
    ) {
        let mut ctx = ExecutionContext {
            jobs: Arc::clone(&self.jobs),
            record,
            guard,
            cancel: cancel.clone(),
        };

        let _permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                ctx.update(|record| {
                    record.progress.message = "Queued, waiting for a free worker".to_string();
                });
                tokio::select! {
                    permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                    _ = cancel.wait_for(|cancelled| *cancelled) => {
                        debug!("Cancelled while queued");
                        return;
                    }
                }
            }
        };

        let started = ctx.update(|record| {
            if let Err(e) = record.start() {
                warn!(error = %e, "Could not start job");
            }
        });
        if !started {
            debug!("Cancelled before start");
            return;
        }

        let request = ctx.record.request.clone();
        let crawl = self.crawler.crawl(&request, &mut ctx);
        let outcome = match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, crawl).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ExtractionError::Timeout(limit.as_secs())),
            },
            None => crawl.await,
        };

        self.finish(ctx, outcome);
    }

    /// Records the terminal state of a crawl under the job's write guard
    fn finish(&self, ctx: ExecutionContext, outcome: Result<CrawlOutcome, ExtractionError>) {
        let ExecutionContext {
            mut record,
            guard,
            cancel,
            ..
        } = ctx;
        let _held = lock(&guard);

        if *cancel.borrow() {
            debug!("Discarding outcome of cancelled job");
            return;
        }

        match outcome {
            Ok(CrawlOutcome::Cancelled { .. }) => {}
            Ok(CrawlOutcome::Finished(output)) if output.content.is_empty() => {
                self.fail(&mut record, ExtractionError::NoContent);
            }
            Ok(CrawlOutcome::Finished(output)) => {
                let result = ExtractionResult::new(
                    &record,
                    output.content,
                    output.links,
                    output.pages_extracted,
                );
                if let Err(e) = self.results.put(&result) {
                    self.fail(&mut record, ExtractionError::Store(e));
                    return;
                }

                let mut processing = record.clone();
                if let Err(e) = record.complete(&result) {
                    warn!(error = %e, "Could not complete job");
                    return;
                }
                if let Err(e) = self.jobs.put(&record) {
                    // Never leave a result behind a status that does not say completed
                    error!(error = %e, "Failed to store completed status, evicting result");
                    if let Err(e) = self.results.evict(record.id) {
                        warn!(error = %e, "Failed to evict orphaned result");
                    }
                    self.fail(&mut processing, ExtractionError::StatusStore(e));
                    return;
                }

                info!(
                    pages = result.pages_extracted,
                    characters = result.total_characters,
                    links = result.total_links,
                    "Job completed"
                );
            }
            Err(e) => self.fail(&mut record, e),
        }
    }

    fn fail(&self, record: &mut JobRecord, error: ExtractionError) {
        let message = error.to_string();
        error!(error = %message, "Extraction failed");

        if let Err(e) = record.fail(&message) {
            warn!(error = %e, "Could not mark job failed");
            return;
        }
        if let Err(e) = self.jobs.put(record) {
            warn!(error = %e, "Failed to store failed status, retrying once");
            if let Err(e) = self.jobs.put(record) {
                error!(error = %e, "Failed to store failed status");
            }
        }

        let failure = FailureRecord {
            job_id: record.id,
            url: record.request.url.clone(),
            selector: record.request.selector.clone(),
            error: message,
            failed_at: Utc::now(),
        };
        if let Err(e) = self.results.record_failure(&failure) {
            warn!(error = %e, "Failed to log extraction failure");
        }
    }
}

/// Purges expired job records until stopped or until the orchestrator is dropped
async fn sweep_expired(inner: Weak<Inner>, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticks = tokio::time::interval(period.max(Duration::from_secs(1)));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticks.tick().await;

    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = stop.wait_for(|stopped| *stopped) => break,
        }

        let Some(orchestrator) = inner.upgrade() else {
            break;
        };
        match orchestrator.jobs.purge_expired() {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Purged expired job records"),
            Err(e) => warn!(error = %e, "Failed to purge expired job records"),
        }
    }
}

/// Per-execution state handed to the crawler as its progress sink
struct ExecutionContext {
    jobs: Arc<dyn JobStore>,
    record: JobRecord,
    guard: Arc<Mutex<()>>,
    cancel: watch::Receiver<bool>,
}

impl ExecutionContext {
    /// Applies `change` and stores the record, unless the job was cancelled
    ///
    /// Returns false when the job was cancelled and nothing was written.
    fn update(&mut self, change: impl FnOnce(&mut JobRecord)) -> bool {
        let _held = lock(&self.guard);
        if *self.cancel.borrow() {
            return false;
        }

        change(&mut self.record);
        if let Err(e) = self.jobs.put(&self.record) {
            warn!(error = %e, "Failed to store job progress");
        }
        true
    }
}

impl ProgressSink for ExecutionContext {
    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn report(&mut self, progress: &CrawlProgress) {
        debug!(
            pages = progress.pages_extracted,
            characters = progress.total_characters,
            url = %progress.current_url,
            "Page extracted"
        );
        self.update(|record| {
            record.record_page(
                progress.pages_extracted,
                progress.total_characters,
                progress.total_links,
            );
        });
    }
}
