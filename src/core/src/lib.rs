#![allow(clippy::result_large_err)]
//! # crmrund Core
//!
//! Periodic maintenance and reporting pipeline for a CRM Data Service.
//!
//! ## Architecture
//!
//! - **Data Service**: GraphQL-over-HTTP client for customers, products,
//!   and orders, behind a trait so tests can swap in an in-memory store
//! - **Jobs**: The five built-in maintenance jobs, a shared executor, and
//!   a cron scheduler with per-job overlap guarding
//! - **Sink**: Append-only per-category log files, the durable record of
//!   every job run
//! - **Telemetry**: Structured operational logging, separate from the sink

pub mod config;
pub mod dataservice;
pub mod error;
pub mod jobs;
pub mod model;
pub mod sink;
pub mod telemetry;

pub use error::{CrmError, ErrorCode, ErrorContext, FieldError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, JobDefaults, ScheduleConfig, SinkConfig};
    pub use crate::dataservice::{
        BulkResult, CustomerFilter, DataService, HttpDataService, InMemoryDataService,
        OrderFilter, ProductFilter, Range, SortDirection, SortKey,
    };
    pub use crate::error::{CrmError, ErrorCode, ErrorContext, FieldError, Result};
    pub use crate::jobs::{
        execute_job, CustomerSweepJob, HeartbeatJob, Job, JobContext, JobOutcome, JobResult,
        JobRun, JobScheduler, JobStatus, OrderRemindersJob, RestockJob, WeeklyReportJob,
    };
    pub use crate::model::{
        Customer, NewCustomer, NewOrder, NewOrderLine, NewProduct, Order, OrderItem, Product,
    };
    pub use crate::sink::LogSink;
}
