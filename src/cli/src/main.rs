//! crm-jobs - run CRM maintenance jobs on demand.
//!
//! Each subcommand runs one of the scheduled jobs immediately against the
//! configured Data Service, writing to the same per-job log files the
//! daemon uses. The process exit code reflects the run outcome.

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crmrund_core::{
    config::Config,
    dataservice::{DataService, HttpDataService},
    jobs::{
        execute_job, CustomerSweepJob, HeartbeatJob, Job, OrderRemindersJob, RestockJob,
        WeeklyReportJob,
    },
    sink::LogSink,
    telemetry,
};

/// CRM maintenance job runner
#[derive(Parser)]
#[command(
    name = "crm-jobs",
    version = "0.1.0",
    about = "Run CRM maintenance and reporting jobs on demand",
    long_about = "Runs one of the scheduled CRM maintenance jobs immediately, \
                  outside its cron schedule, against the configured Data Service.",
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CRMRUND_CONFIG")]
    config: Option<String>,

    /// Data Service endpoint override
    #[arg(long, global = true, env = "CRMRUND_ENDPOINT")]
    endpoint: Option<String>,

    /// Directory for the per-job log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete customers with no order inside the inactivity window
    SweepInactive {
        /// Inactivity cutoff in days
        #[arg(long)]
        cutoff_days: Option<i64>,
    },

    /// Top up products whose stock fell below the threshold
    Restock {
        /// Stock level below which a product is topped up
        #[arg(long)]
        threshold: Option<u32>,

        /// Units added per restocked product
        #[arg(long)]
        amount: Option<u32>,
    },

    /// Write reminder lines for recently placed orders
    OrderReminders {
        /// Look-back window in days
        #[arg(long)]
        days: Option<i64>,
    },

    /// Record a liveness line and probe the Data Service
    Heartbeat,

    /// Compile the customer/order/revenue summary report
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.data_service.endpoint = endpoint.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.sink.log_dir = log_dir.clone();
    }

    telemetry::init_logging(&config.logging)?;

    let data: Arc<dyn DataService> = Arc::new(HttpDataService::new(
        &config.data_service.endpoint,
        config.data_service.timeout,
    )?);

    let defaults = &config.jobs;
    let job: Arc<dyn Job> = match cli.command {
        Commands::SweepInactive { cutoff_days } => Arc::new(match cutoff_days {
            Some(days) => CustomerSweepJob::with_cutoff_days(days),
            None => CustomerSweepJob::new(defaults),
        }),
        Commands::Restock { threshold, amount } => Arc::new(RestockJob::with_settings(
            threshold.unwrap_or(defaults.low_stock_threshold),
            amount.unwrap_or(defaults.restock_amount),
        )),
        Commands::OrderReminders { days } => Arc::new(match days {
            Some(days) => OrderRemindersJob::with_window_days(days),
            None => OrderRemindersJob::new(defaults),
        }),
        Commands::Heartbeat => Arc::new(HeartbeatJob::new()),
        Commands::Report => Arc::new(WeeklyReportJob::new()),
    };

    let sink = LogSink::new(&config.sink.log_dir, job.category());
    let run = execute_job(job.as_ref(), data, sink).await;

    output::print_run(&run);

    let code = run.status.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
