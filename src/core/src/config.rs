//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Data Service endpoint configuration
    #[serde(default)]
    pub data_service: DataServiceConfig,

    /// Process logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Job log sink configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Cron schedule expression per job name
    #[serde(default)]
    pub schedules: ScheduleConfig,

    /// Default thresholds and windows for the built-in jobs
    #[serde(default)]
    pub jobs: JobDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataServiceConfig {
    /// GraphQL endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty or compact)
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Process log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    Json,
    /// Pretty format for development
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Directory holding one append-only log file per job category
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

/// Five-field cron expression per job, fixed at process start.
///
/// Defaults mirror the production deployment: heartbeat every five minutes,
/// inactive-customer sweep Sunday 02:00, restock twice a day, order reminders
/// daily at 08:00, weekly report Monday 06:00.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_heartbeat_schedule")]
    pub heartbeat: String,

    #[serde(default = "default_sweep_schedule")]
    pub customer_sweep: String,

    #[serde(default = "default_restock_schedule")]
    pub restock: String,

    #[serde(default = "default_reminders_schedule")]
    pub order_reminders: String,

    #[serde(default = "default_report_schedule")]
    pub weekly_report: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            heartbeat: default_heartbeat_schedule(),
            customer_sweep: default_sweep_schedule(),
            restock: default_restock_schedule(),
            order_reminders: default_reminders_schedule(),
            weekly_report: default_report_schedule(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobDefaults {
    /// Customers with no order newer than this many days are swept
    #[serde(default = "default_cutoff_days")]
    pub inactive_cutoff_days: i64,

    /// Products below this stock level are restocked
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: u32,

    /// Units added to each low-stock product
    #[serde(default = "default_restock_amount")]
    pub restock_amount: u32,

    /// Orders newer than this many days get a reminder
    #[serde(default = "default_reminder_window_days")]
    pub reminder_window_days: i64,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            inactive_cutoff_days: default_cutoff_days(),
            low_stock_threshold: default_low_stock_threshold(),
            restock_amount: default_restock_amount(),
            reminder_window_days: default_reminder_window_days(),
        }
    }
}

// Default value functions
fn default_endpoint() -> String { "http://localhost:8000/graphql".to_string() }
fn default_timeout() -> Duration { Duration::from_secs(30) }
fn default_log_level() -> String { "info".to_string() }
fn default_log_dir() -> PathBuf { PathBuf::from("/tmp") }
fn default_heartbeat_schedule() -> String { "*/5 * * * *".to_string() }
fn default_sweep_schedule() -> String { "0 2 * * 0".to_string() }
fn default_restock_schedule() -> String { "0 */12 * * *".to_string() }
fn default_reminders_schedule() -> String { "0 8 * * *".to_string() }
fn default_report_schedule() -> String { "0 6 * * 1".to_string() }
fn default_cutoff_days() -> i64 { 365 }
fn default_low_stock_threshold() -> u32 { 10 }
fn default_restock_amount() -> u32 { 10 }
fn default_reminder_window_days() -> i64 { 7 }

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CRMRUND").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with the environment layered on top.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CRMRUND").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.data_service.endpoint, "http://localhost:8000/graphql");
        assert_eq!(cfg.jobs.inactive_cutoff_days, 365);
        assert_eq!(cfg.jobs.low_stock_threshold, 10);
        assert_eq!(cfg.jobs.restock_amount, 10);
        assert_eq!(cfg.jobs.reminder_window_days, 7);
        assert_eq!(cfg.schedules.heartbeat, "*/5 * * * *");
        assert_eq!(cfg.schedules.customer_sweep, "0 2 * * 0");
    }

    #[test]
    fn test_log_format_default_is_pretty() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
