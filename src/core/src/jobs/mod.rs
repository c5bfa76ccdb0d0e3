//! Background maintenance jobs.
//!
//! This module provides the periodic maintenance pipeline:
//!
//! - **Job Definitions**: Trait-based jobs with a shared run context and
//!   per-run counters
//! - **Scheduler**: Cron-based triggering with a per-job overlap guard
//! - **Built-in Jobs**: The five maintenance and reporting jobs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Maintenance Job Pipeline                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐    ┌────────────┐    ┌──────────────────────┐ │
//! │  │ Scheduler │───▶│ execute_job│───▶│ Data Service + Sink  │ │
//! │  │  (cron)   │    │ (executor) │    │ (GraphQL / log file) │ │
//! │  └───────────┘    └────────────┘    └──────────────────────┘ │
//! │        │                                                      │
//! │        ▼                                                      │
//! │  ┌──────────────────────────────────────────────────────────┐│
//! │  │                     Built-in Jobs                         ││
//! │  │  • Customer Sweep   • Restock      • Order Reminders     ││
//! │  │  • Heartbeat        • Weekly Report                      ││
//! │  └──────────────────────────────────────────────────────────┘│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use crmrund_core::jobs::{JobScheduler, CustomerSweepJob, execute_job};
//!
//! let mut scheduler = JobScheduler::new(data.clone());
//! scheduler.register("0 2 * * 0", Arc::new(CustomerSweepJob::new(&defaults)), sink)?;
//! scheduler.run().await;
//! ```

pub mod job;
pub mod scheduler;

pub use job::{
    execute_job, Job, JobContext, JobError, JobOutcome, JobResult, JobRun, JobStatus,
};
pub use scheduler::{CronSpec, JobScheduler, ScheduledJob, SchedulerHandle};

// Built-in jobs
pub mod builtin;
pub use builtin::{
    CustomerSweepJob, HeartbeatJob, OrderRemindersJob, RestockJob, WeeklyReportJob,
};
