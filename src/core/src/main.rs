//! crmrund - CRM maintenance daemon entry point.
//!
//! Loads configuration, registers the five built-in jobs with the cron
//! scheduler, and runs until a shutdown signal arrives.

use std::sync::Arc;

use crmrund_core::{
    config::Config,
    dataservice::{DataService, HttpDataService},
    jobs::{
        CustomerSweepJob, HeartbeatJob, Job, JobScheduler, OrderRemindersJob, RestockJob,
        WeeklyReportJob,
    },
    sink::LogSink,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        Config::default()
    });

    // Initialize logging
    telemetry::init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %config.data_service.endpoint,
        "Starting crmrund"
    );

    let data: Arc<dyn DataService> = Arc::new(HttpDataService::new(
        &config.data_service.endpoint,
        config.data_service.timeout,
    )?);

    let mut scheduler = JobScheduler::new(data);

    let jobs: [(&str, Arc<dyn Job>); 5] = [
        (
            config.schedules.heartbeat.as_str(),
            Arc::new(HeartbeatJob::new()),
        ),
        (
            config.schedules.customer_sweep.as_str(),
            Arc::new(CustomerSweepJob::new(&config.jobs)),
        ),
        (
            config.schedules.restock.as_str(),
            Arc::new(RestockJob::new(&config.jobs)),
        ),
        (
            config.schedules.order_reminders.as_str(),
            Arc::new(OrderRemindersJob::new(&config.jobs)),
        ),
        (
            config.schedules.weekly_report.as_str(),
            Arc::new(WeeklyReportJob::new()),
        ),
    ];
    for (expression, job) in jobs {
        let sink = LogSink::new(&config.sink.log_dir, job.category());
        scheduler.register(expression, job, sink)?;
    }

    let handle = scheduler.handle();
    let run = tokio::spawn(scheduler.run());

    shutdown_signal().await;
    handle.shutdown();
    run.await?;

    tracing::info!("crmrund shutdown complete");
    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
