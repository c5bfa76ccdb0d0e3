//! Job definitions and execution plumbing.
//!
//! - **Job trait**: the interface every maintenance job implements
//! - **JobContext**: Data Service handle, sink and run counters passed to jobs
//! - **JobRun**: the per-invocation record, finalized and flushed at job end
//! - **execute_job**: the executor wrapper owning the run lifecycle

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::dataservice::DataService;
use crate::error::CrmError;
use crate::sink::LogSink;

// ═══════════════════════════════════════════════════════════════════════════════
// Job Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Final state of one job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Invocation in progress
    Running,
    /// Finished and did what it set out to do
    Completed,
    /// Finished, but a non-fatal part of the work failed (e.g. health probe)
    Degraded,
    /// Aborted by a fatal error; nothing further was attempted
    Failed,
}

impl JobStatus {
    /// Process exit code for a manual invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Running | Self::Completed | Self::Degraded => 0,
            Self::Failed => 1,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Error / Outcome
// ═══════════════════════════════════════════════════════════════════════════════

/// A fatal-for-this-run job failure.
///
/// Per-item failures never become a `JobError`; they are counted on the run
/// and logged at item scope. Only errors that abort the whole invocation
/// (Data Service unreachable, batch rollback) surface here.
#[derive(Debug, Clone)]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JobError {}

impl From<CrmError> for JobError {
    fn from(error: CrmError) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

/// Successful outcome of a job invocation.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// True when a tolerated, non-fatal part failed
    pub degraded: bool,
    /// One-line human summary for the run record
    pub summary: String,
}

impl JobOutcome {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            degraded: false,
            summary: summary.into(),
        }
    }

    pub fn degraded(summary: impl Into<String>) -> Self {
        Self {
            degraded: true,
            summary: summary.into(),
        }
    }
}

/// Result type for job execution.
pub type JobResult = std::result::Result<JobOutcome, JobError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Job Run
// ═══════════════════════════════════════════════════════════════════════════════

/// One invocation's record: constructed at job start, finalized and flushed
/// to the sink at job end, never retained between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    /// Job name
    pub job: String,
    /// When the invocation started
    pub started_at: DateTime<Utc>,
    /// Items the job looked at
    pub examined: u64,
    /// Items the job changed (or emitted, for read-only jobs)
    pub affected: u64,
    /// Items that failed at item scope
    pub failed: u64,
    /// Final state
    pub status: JobStatus,
    /// One-line outcome summary
    pub summary: String,
}

impl JobRun {
    pub fn start(job: &str) -> Self {
        Self {
            job: job.to_string(),
            started_at: Utc::now(),
            examined: 0,
            affected: 0,
            failed: 0,
            status: JobStatus::Running,
            summary: String::new(),
        }
    }

    fn finish(&mut self, status: JobStatus, summary: String) {
        self.status = status;
        self.summary = summary;
    }

    /// Whether the invocation counts as a success for the caller.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Degraded)
    }
}

impl fmt::Display for JobRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: examined={} affected={} failed={} - {}",
            self.job, self.status, self.examined, self.affected, self.failed, self.summary
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Context passed to jobs during execution.
///
/// Owns the invocation-scoped counters; jobs hold no state of their own
/// between invocations.
pub struct JobContext {
    data: Arc<dyn DataService>,
    sink: LogSink,
    run: Mutex<JobRun>,
}

impl JobContext {
    pub fn new(job_name: &str, data: Arc<dyn DataService>, sink: LogSink) -> Self {
        Self {
            data,
            sink,
            run: Mutex::new(JobRun::start(job_name)),
        }
    }

    /// The Data Service this invocation works against.
    pub fn data(&self) -> &dyn DataService {
        self.data.as_ref()
    }

    /// The job-category sink.
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// When this invocation started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.run.lock().started_at
    }

    /// Count items the job looked at.
    pub fn record_examined(&self, n: u64) {
        self.run.lock().examined += n;
    }

    /// Count items the job changed or emitted.
    pub fn record_affected(&self, n: u64) {
        self.run.lock().affected += n;
    }

    /// Count an item-scope failure.
    pub fn record_failed(&self, n: u64) {
        self.run.lock().failed += n;
    }

    /// Log a message associated with this invocation.
    pub fn log_info(&self, message: &str) {
        tracing::info!(job = %self.run.lock().job, message);
    }

    /// Log a warning associated with this invocation.
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(job = %self.run.lock().job, message);
    }

    /// Log an error associated with this invocation.
    pub fn log_error(&self, message: &str) {
        tracing::error!(job = %self.run.lock().job, message);
    }

    fn into_run(self, status: JobStatus, summary: String) -> JobRun {
        let mut run = self.run.into_inner();
        run.finish(status, summary);
        run
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// The trait every maintenance job implements.
#[async_trait]
pub trait Job: Send + Sync {
    /// Unique job name, also used for the scheduler's overlap guard.
    fn name(&self) -> &'static str;

    /// Sink category; decides which log file the job appends to.
    fn category(&self) -> &'static str;

    /// Execute one invocation.
    ///
    /// Item-scope failures are counted through the context and must not
    /// abort siblings, except where the job's policy is whole-batch
    /// atomicity. Return `JobError` only for failures that end the run.
    async fn execute(&self, ctx: &JobContext) -> JobResult;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Executor
// ═══════════════════════════════════════════════════════════════════════════════

/// Run one job to completion and flush its run record to the sink.
///
/// This is the single entry point both the scheduler and the CLI go through,
/// so a manual invocation produces the same log output as a scheduled one.
pub async fn execute_job(job: &dyn Job, data: Arc<dyn DataService>, sink: LogSink) -> JobRun {
    let ctx = JobContext::new(job.name(), data, sink.clone());
    tracing::info!(job = job.name(), "Job started");

    let result = job.execute(&ctx).await;
    let run = match result {
        Ok(outcome) => {
            let status = if outcome.degraded {
                JobStatus::Degraded
            } else {
                JobStatus::Completed
            };
            ctx.into_run(status, outcome.summary)
        }
        Err(error) => ctx.into_run(JobStatus::Failed, error.message),
    };

    // Flush the finalized record; a sink write failure at this point is
    // reported through tracing only, the run itself is already decided.
    let flush = match run.status {
        JobStatus::Failed => sink.error(&run.to_string()).await,
        _ => sink.info(&run.to_string()).await,
    };
    if let Err(e) = flush {
        tracing::error!(job = %run.job, error = %e, "Failed to flush run record to sink");
    }

    match run.status {
        JobStatus::Failed => tracing::error!(job = %run.job, summary = %run.summary, "Job failed"),
        JobStatus::Degraded => {
            tracing::warn!(job = %run.job, summary = %run.summary, "Job completed degraded")
        }
        _ => tracing::info!(
            job = %run.job,
            examined = run.examined,
            affected = run.affected,
            failed = run.failed,
            "Job completed"
        ),
    }

    run
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataservice::InMemoryDataService;

    struct NoopJob;

    #[async_trait]
    impl Job for NoopJob {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn category(&self) -> &'static str {
            "noop"
        }

        async fn execute(&self, ctx: &JobContext) -> JobResult {
            ctx.record_examined(3);
            ctx.record_affected(2);
            ctx.record_failed(1);
            Ok(JobOutcome::success("did nothing"))
        }
    }

    struct FailingJob;

    #[async_trait]
    impl Job for FailingJob {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn category(&self) -> &'static str {
            "failing"
        }

        async fn execute(&self, _ctx: &JobContext) -> JobResult {
            Err(JobError::new("Data Service unreachable"))
        }
    }

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(JobStatus::Completed.exit_code(), 0);
        assert_eq!(JobStatus::Degraded.exit_code(), 0);
        assert_eq!(JobStatus::Failed.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_execute_job_finalizes_run() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path(), "noop");
        let data = Arc::new(InMemoryDataService::new());

        let run = execute_job(&NoopJob, data, sink.clone()).await;
        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(run.examined, 3);
        assert_eq!(run.affected, 2);
        assert_eq!(run.failed, 1);
        assert!(run.succeeded());

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert!(contents.contains("noop completed: examined=3 affected=2 failed=1 - did nothing"));
    }

    #[tokio::test]
    async fn test_execute_job_records_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path(), "failing");
        let data = Arc::new(InMemoryDataService::new());

        let run = execute_job(&FailingJob, data, sink.clone()).await;
        assert_eq!(run.status, JobStatus::Failed);
        assert!(!run.succeeded());
        assert_eq!(run.status.exit_code(), 1);

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert!(contents.contains("ERROR"));
        assert!(contents.contains("Data Service unreachable"));
    }
}
