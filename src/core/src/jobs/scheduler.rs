//! Cron-based job trigger.
//!
//! Associates a five-field cron expression with each registered job and
//! invokes it at matching ticks. Delivery is at-most-once: a tick that
//! arrives while the same job's previous invocation is still running is
//! skipped, and ticks missed across a process restart are lost. Distinct
//! jobs may run concurrently with each other.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::job::{execute_job, Job};
use crate::dataservice::DataService;
use crate::error::{CrmError, ErrorCode, Result};
use crate::sink::LogSink;

// ═══════════════════════════════════════════════════════════════════════════════
// Cron specification
// ═══════════════════════════════════════════════════════════════════════════════

/// A parsed five-field cron expression.
///
/// The `cron` crate wants a leading seconds field; schedule configuration
/// uses the standard five-field form, so parsing pins seconds to zero.
#[derive(Debug, Clone)]
pub struct CronSpec {
    expression: String,
    schedule: Schedule,
}

impl CronSpec {
    /// Parse a standard five-field expression (minute, hour, day-of-month,
    /// month, day-of-week with 0 or 7 as Sunday).
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CrmError::new(
                ErrorCode::InvalidSchedule,
                format!(
                    "cron expression must have five fields, got {}: {:?}",
                    fields.len(),
                    expression
                ),
            ));
        }
        let normalized = format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            translate_dow(fields[4])
        );
        let schedule: Schedule = normalized.parse().map_err(|e: cron::error::Error| {
            CrmError::new(
                ErrorCode::InvalidSchedule,
                format!("invalid cron expression {:?}: {}", expression, e),
            )
        })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// The original five-field expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next fire instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Rewrite the day-of-week field for the `cron` crate, which numbers days
/// 1=Sunday..7=Saturday while standard five-field syntax uses 0=Sunday..
/// 6=Saturday (with 7 also accepted as Sunday). Numeric tokens in values,
/// lists and range bounds are shifted; names, wildcards and step counts
/// pass through. Tokens outside 0..=7 are left alone so the parser rejects
/// them with its own message.
fn translate_dow(field: &str) -> String {
    fn shift(token: &str) -> String {
        match token.parse::<u8>() {
            Ok(n) if n <= 7 => ((n % 7) + 1).to_string(),
            _ => token.to_string(),
        }
    }

    field
        .split(',')
        .map(|part| {
            let (value, step) = match part.split_once('/') {
                Some((value, step)) => (value, Some(step)),
                None => (part, None),
            };
            let value = match value.split_once('-') {
                Some((lo, hi)) => format!("{}-{}", shift(lo), shift(hi)),
                None => shift(value),
            };
            match step {
                Some(step) => format!("{}/{}", value, step),
                None => value,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scheduled entries
// ═══════════════════════════════════════════════════════════════════════════════

/// One registered job with its schedule and overlap guard.
pub struct ScheduledJob {
    /// The job name (from `Job::name`)
    pub name: &'static str,
    /// The parsed schedule
    pub spec: CronSpec,
    job: Arc<dyn Job>,
    sink: LogSink,
    /// True while an invocation is in flight
    running: AtomicBool,
    /// Ticks that actually started an invocation
    run_count: AtomicU64,
    /// Ticks skipped because the previous invocation was still running
    skipped_count: AtomicU64,
}

impl ScheduledJob {
    /// Number of invocations started so far.
    pub fn run_count(&self) -> u64 {
        self.run_count.load(Ordering::Relaxed)
    }

    /// Number of ticks skipped by the overlap guard.
    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    /// Try to claim the overlap guard for a new invocation.
    fn try_begin(&self) -> bool {
        !self.running.swap(true, Ordering::AcqRel)
    }

    fn end(&self) {
        self.running.store(false, Ordering::Release);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scheduler
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle for stopping a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Signal the scheduler to stop after the current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// The job trigger: fires registered jobs on their cron schedules.
pub struct JobScheduler {
    data: Arc<dyn DataService>,
    entries: Vec<Arc<ScheduledJob>>,
    shutdown: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl JobScheduler {
    /// Create a scheduler over the given Data Service.
    pub fn new(data: Arc<dyn DataService>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            data,
            entries: Vec::new(),
            shutdown,
            shutdown_rx,
        }
    }

    /// Register a job under a five-field cron expression.
    pub fn register(&mut self, expression: &str, job: Arc<dyn Job>, sink: LogSink) -> Result<()> {
        let spec = CronSpec::parse(expression)?;
        tracing::info!(
            job = job.name(),
            schedule = spec.expression(),
            "Registered scheduled job"
        );
        self.entries.push(Arc::new(ScheduledJob {
            name: job.name(),
            spec,
            job,
            sink,
            running: AtomicBool::new(false),
            run_count: AtomicU64::new(0),
            skipped_count: AtomicU64::new(0),
        }));
        Ok(())
    }

    /// The registered entries, for introspection.
    pub fn entries(&self) -> &[Arc<ScheduledJob>] {
        &self.entries
    }

    /// Get a handle for stopping the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Run the tick loop until shutdown is signalled.
    ///
    /// Each loop pass recomputes every entry's next fire instant from the
    /// current clock, so ticks that fell into a pause (suspend, restart)
    /// are dropped rather than caught up.
    pub async fn run(mut self) {
        tracing::info!(jobs = self.entries.len(), "Scheduler started");

        loop {
            let now = Utc::now();
            let next = self
                .entries
                .iter()
                .filter_map(|e| e.spec.next_after(now).map(|at| (at, Arc::clone(e))))
                .min_by_key(|(at, _)| *at);

            let Some((fire_at, _)) = next else {
                // No entry has an upcoming fire; wait for shutdown
                let _ = self.shutdown_rx.changed().await;
                if *self.shutdown_rx.borrow() {
                    break;
                }
                continue;
            };

            let wait = (fire_at - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(wait) => {
                    let tick = Utc::now();
                    for entry in &self.entries {
                        // Fire every entry whose instant has arrived, not
                        // just the one that set the sleep
                        let due = entry
                            .spec
                            .next_after(now)
                            .is_some_and(|at| at <= tick);
                        if due {
                            Self::fire(entry, Arc::clone(&self.data));
                        }
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Invoke one entry, unless its previous invocation is still running.
    fn fire(entry: &Arc<ScheduledJob>, data: Arc<dyn DataService>) {
        if !entry.try_begin() {
            entry.skipped_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                job = entry.name,
                "Previous invocation still running, tick skipped"
            );
            return;
        }
        entry.run_count.fetch_add(1, Ordering::Relaxed);

        let entry = Arc::clone(entry);
        tokio::spawn(async move {
            let run = execute_job(entry.job.as_ref(), data, entry.sink.clone()).await;
            if !run.succeeded() {
                tracing::error!(job = entry.name, summary = %run.summary, "Scheduled run failed");
            }
            entry.end();
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataservice::InMemoryDataService;
    use crate::jobs::builtin::HeartbeatJob;
    use chrono::TimeZone;

    #[test]
    fn test_parse_five_field() {
        let spec = CronSpec::parse("*/5 * * * *").unwrap();
        assert_eq!(spec.expression(), "*/5 * * * *");

        let after = Utc.with_ymd_and_hms(2026, 8, 25, 14, 2, 30).unwrap();
        let next = spec.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 25, 14, 5, 0).unwrap());
    }

    #[test]
    fn test_parse_weekly() {
        // Sunday 02:00
        let spec = CronSpec::parse("0 2 * * 0").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap(); // Tuesday
        let next = spec.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 30, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_numeric_weekdays_follow_standard_numbering() {
        // Monday 06:00; standard numbering, 1 = Monday
        let spec = CronSpec::parse("0 6 * * 1").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap(); // Tuesday
        let next = spec.next_after(after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 31, 6, 0, 0).unwrap());

        // 7 is Sunday, same as 0
        let seven = CronSpec::parse("0 2 * * 7").unwrap();
        let zero = CronSpec::parse("0 2 * * 0").unwrap();
        assert_eq!(seven.next_after(after), zero.next_after(after));
    }

    #[test]
    fn test_parse_weekday_ranges_and_names() {
        // Weekday range: Thursday Aug 27 2026 fires, Saturday Aug 29 does not
        let spec = CronSpec::parse("0 9 * * 1-5").unwrap();
        let wednesday = Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap();
        assert_eq!(
            spec.next_after(wednesday),
            Some(Utc.with_ymd_and_hms(2026, 8, 27, 9, 0, 0).unwrap())
        );
        let friday = Utc.with_ymd_and_hms(2026, 8, 28, 12, 0, 0).unwrap();
        assert_eq!(
            spec.next_after(friday),
            Some(Utc.with_ymd_and_hms(2026, 8, 31, 9, 0, 0).unwrap())
        );

        // Day names are passed through untouched
        let named = CronSpec::parse("0 6 * * MON").unwrap();
        let numeric = CronSpec::parse("0 6 * * 1").unwrap();
        assert_eq!(named.next_after(friday), numeric.next_after(friday));
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!(CronSpec::parse("0 * * * * *").is_err()); // six fields
        assert!(CronSpec::parse("* * *").is_err());
        assert!(CronSpec::parse("not a cron line").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage_fields() {
        assert!(CronSpec::parse("61 * * * *").is_err());
    }

    #[tokio::test]
    async fn test_register_and_introspect() {
        let data = Arc::new(InMemoryDataService::new());
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = JobScheduler::new(data);
        scheduler
            .register(
                "*/5 * * * *",
                Arc::new(HeartbeatJob::new()),
                LogSink::new(dir.path(), "crm_heartbeat"),
            )
            .unwrap();

        assert_eq!(scheduler.entries().len(), 1);
        let entry = &scheduler.entries()[0];
        assert_eq!(entry.name, "heartbeat");
        assert_eq!(entry.run_count(), 0);
        assert_eq!(entry.skipped_count(), 0);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_expression() {
        let data = Arc::new(InMemoryDataService::new());
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = JobScheduler::new(data);
        let err = scheduler
            .register(
                "whenever",
                Arc::new(HeartbeatJob::new()),
                LogSink::new(dir.path(), "crm_heartbeat"),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSchedule);
    }

    #[tokio::test]
    async fn test_overlap_guard_is_per_job() {
        let data = Arc::new(InMemoryDataService::new());
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = JobScheduler::new(data);
        scheduler
            .register(
                "* * * * *",
                Arc::new(HeartbeatJob::new()),
                LogSink::new(dir.path(), "crm_heartbeat"),
            )
            .unwrap();
        let entry = Arc::clone(&scheduler.entries()[0]);

        assert!(entry.try_begin());
        // A second tick while running must be refused
        assert!(!entry.try_begin());
        entry.end();
        assert!(entry.try_begin());
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let data = Arc::new(InMemoryDataService::new());
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = JobScheduler::new(data);
        scheduler
            .register(
                "0 2 * * 0",
                Arc::new(HeartbeatJob::new()),
                LogSink::new(dir.path(), "crm_heartbeat"),
            )
            .unwrap();
        let handle = scheduler.handle();

        let task = tokio::spawn(scheduler.run());
        handle.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("scheduler must stop promptly after shutdown")
            .unwrap();
    }
}
