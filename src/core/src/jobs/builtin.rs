//! The built-in maintenance jobs.
//!
//! Five jobs run against the Data Service on their own cadences:
//!
//! - **CustomerSweepJob**: delete customers with no recent orders
//! - **RestockJob**: top up low-stock products (all-or-nothing batch)
//! - **OrderRemindersJob**: emit reminder lines for recent orders
//! - **HeartbeatJob**: liveness line plus a Data Service health probe
//! - **WeeklyReportJob**: aggregate counts and revenue into one report line
//!
//! Transactional policy differs per job and is deliberate: the sweep issues
//! N independent single-item deletions and tolerates per-item failure, while
//! the restock is one atomic batch that either fully applies or rolls back.

use async_trait::async_trait;
use chrono::{Duration, Local};

use super::job::{Job, JobContext, JobOutcome, JobResult};
use crate::config::JobDefaults;
use crate::dataservice::{CustomerFilter, OrderFilter, ProductFilter, Range};
use crate::error::ErrorCode;

/// Timestamp format for the heartbeat's liveness lines.
const HEARTBEAT_TIMESTAMP: &str = "%d/%m/%Y-%H:%M:%S";

// ═══════════════════════════════════════════════════════════════════════════════
// Inactive-customer sweep
// ═══════════════════════════════════════════════════════════════════════════════

/// Job: delete customers with no order inside the cutoff window.
///
/// Each deletion is its own single-item transaction; one failed deletion is
/// caught, logged with the offending customer, and never aborts its siblings.
#[derive(Debug, Clone)]
pub struct CustomerSweepJob {
    /// Customers with no order newer than this many days are deleted
    pub cutoff_days: i64,
}

impl CustomerSweepJob {
    pub fn new(defaults: &JobDefaults) -> Self {
        Self {
            cutoff_days: defaults.inactive_cutoff_days,
        }
    }

    pub fn with_cutoff_days(cutoff_days: i64) -> Self {
        Self { cutoff_days }
    }
}

#[async_trait]
impl Job for CustomerSweepJob {
    fn name(&self) -> &'static str {
        "customer_sweep"
    }

    fn category(&self) -> &'static str {
        "customer_cleanup"
    }

    async fn execute(&self, ctx: &JobContext) -> JobResult {
        let cutoff = ctx.started_at() - Duration::days(self.cutoff_days);
        ctx.log_info(&format!(
            "Sweeping customers inactive since {}",
            cutoff.format("%Y-%m-%d")
        ));
        let sink = ctx.sink();
        sink.info(&format!(
            "Starting inactive customer sweep (cutoff: {})",
            cutoff.format("%Y-%m-%d")
        ))
        .await?;

        let before_total = ctx.data().customer_count().await?;
        let customers = ctx.data().customers(CustomerFilter::default()).await?;
        ctx.record_examined(customers.len() as u64);

        // Collect the deletion set first; deletions happen after the scan so
        // a delete cannot shift the candidate list under us.
        let mut candidates = Vec::new();
        for customer in &customers {
            let filter = OrderFilter::for_customer_since(&customer.id, cutoff);
            match ctx.data().orders(filter).await {
                Ok(orders) if orders.is_empty() => candidates.push(customer),
                Ok(_) => {}
                Err(e) if e.code() == ErrorCode::DataServiceUnreachable => return Err(e.into()),
                Err(e) => {
                    ctx.record_failed(1);
                    e.log();
                    sink.error(&format!(
                        "Could not check orders for customer {}: {}",
                        customer.id, e
                    ))
                    .await?;
                }
            }
        }

        for customer in candidates {
            match ctx.data().delete_customer(&customer.id).await {
                Ok(()) => {
                    ctx.record_affected(1);
                    sink.info(&format!(
                        "Deleted customer {}: {} ({})",
                        customer.id, customer.name, customer.email
                    ))
                    .await?;
                }
                Err(e) if e.code() == ErrorCode::DataServiceUnreachable => return Err(e.into()),
                Err(e) => {
                    ctx.record_failed(1);
                    e.log();
                    sink.error(&format!(
                        "Failed to delete customer {}: {}",
                        customer.id, e
                    ))
                    .await?;
                }
            }
        }

        let after_total = ctx.data().customer_count().await.unwrap_or(before_total);
        Ok(JobOutcome::success(format!(
            "cutoff {}, customers {} -> {}",
            cutoff.format("%Y-%m-%d"),
            before_total,
            after_total
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Low-stock restock
// ═══════════════════════════════════════════════════════════════════════════════

/// Job: add stock to every product below the threshold.
///
/// The whole update is one atomic batch. A rollback fails the run; there is
/// no per-item tolerance here.
#[derive(Debug, Clone)]
pub struct RestockJob {
    /// Products with stock strictly below this are restocked
    pub threshold: u32,
    /// Units added per product
    pub amount: u32,
}

impl RestockJob {
    pub fn new(defaults: &JobDefaults) -> Self {
        Self {
            threshold: defaults.low_stock_threshold,
            amount: defaults.restock_amount,
        }
    }

    pub fn with_settings(threshold: u32, amount: u32) -> Self {
        Self { threshold, amount }
    }
}

#[async_trait]
impl Job for RestockJob {
    fn name(&self) -> &'static str {
        "restock"
    }

    fn category(&self) -> &'static str {
        "low_stock_updates"
    }

    async fn execute(&self, ctx: &JobContext) -> JobResult {
        let Some(max_stock) = self.threshold.checked_sub(1) else {
            return Ok(JobOutcome::success("threshold 0, nothing to restock"));
        };
        let filter = ProductFilter {
            stock: Range::at_most(max_stock),
            ..Default::default()
        };
        let low = ctx.data().products(filter).await?;
        ctx.record_examined(low.len() as u64);
        if low.is_empty() {
            return Ok(JobOutcome::success(format!(
                "no products below stock threshold {}",
                self.threshold
            )));
        }

        let ids: Vec<String> = low.iter().map(|p| p.id.clone()).collect();
        let updated = match ctx.data().restock_products(&ids, self.amount).await {
            Ok(updated) => updated,
            Err(e) => {
                ctx.log_error(&format!("Restock batch rolled back: {}", e));
                ctx.sink()
                    .error(&format!("Restock batch rolled back: {}", e))
                    .await?;
                return Err(e.into());
            }
        };

        for product in &updated {
            ctx.record_affected(1);
            let old = product.stock.saturating_sub(self.amount);
            ctx.sink()
                .info(&format!(
                    "Restocked {} ({}): stock {} -> {}",
                    product.name, product.id, old, product.stock
                ))
                .await?;
        }

        Ok(JobOutcome::success(format!(
            "restocked {} products (+{} units each)",
            updated.len(),
            self.amount
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Order reminders
// ═══════════════════════════════════════════════════════════════════════════════

/// Job: one reminder line per order inside the lookback window.
///
/// Read-only. Reminders are not de-duplicated across runs; two runs with no
/// new orders produce two identical reminder sets.
#[derive(Debug, Clone)]
pub struct OrderRemindersJob {
    /// Orders newer than this many days get a reminder
    pub window_days: i64,
}

impl OrderRemindersJob {
    pub fn new(defaults: &JobDefaults) -> Self {
        Self {
            window_days: defaults.reminder_window_days,
        }
    }

    pub fn with_window_days(window_days: i64) -> Self {
        Self { window_days }
    }
}

#[async_trait]
impl Job for OrderRemindersJob {
    fn name(&self) -> &'static str {
        "order_reminders"
    }

    fn category(&self) -> &'static str {
        "order_reminders"
    }

    async fn execute(&self, ctx: &JobContext) -> JobResult {
        let cutoff = ctx.started_at() - Duration::days(self.window_days);
        let orders = ctx.data().orders(OrderFilter::since(cutoff)).await?;
        ctx.record_examined(orders.len() as u64);

        if orders.is_empty() {
            ctx.sink()
                .info("No recent orders found to process")
                .await?;
            return Ok(JobOutcome::success(format!(
                "no orders since {}",
                cutoff.format("%Y-%m-%d")
            )));
        }

        for order in &orders {
            ctx.sink()
                .info(&format!(
                    "ORDER REMINDER - Order ID: {}, Customer: {} ({}), Date: {}, Total: ${:.2}, Products: {}",
                    order.id,
                    order.customer_name,
                    order.customer_email,
                    order.order_date.format("%Y-%m-%d"),
                    order.total_amount,
                    order.product_names().join(", ")
                ))
                .await?;
            ctx.record_affected(1);
        }

        Ok(JobOutcome::success(format!(
            "{} reminders for orders since {}",
            orders.len(),
            cutoff.format("%Y-%m-%d")
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Heartbeat
// ═══════════════════════════════════════════════════════════════════════════════

/// Job: unconditional liveness line, then a lightweight Data Service probe.
///
/// The probe failing degrades the run but never fails it; the liveness line
/// is written first so it survives a dead Data Service.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatJob;

impl HeartbeatJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Job for HeartbeatJob {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn category(&self) -> &'static str {
        "crm_heartbeat"
    }

    async fn execute(&self, ctx: &JobContext) -> JobResult {
        // Local time, matching the sink's other timestamps
        let ts = Local::now().format(HEARTBEAT_TIMESTAMP);
        ctx.sink().raw(&format!("{} CRM is alive", ts)).await?;
        ctx.record_affected(1);

        match ctx.data().customer_count().await {
            Ok(count) => {
                ctx.sink()
                    .raw(&format!(
                        "{} Data Service responsive: {} customers found",
                        ts, count
                    ))
                    .await?;
                Ok(JobOutcome::success("alive, Data Service responsive"))
            }
            Err(e) => {
                ctx.record_failed(1);
                ctx.log_warn(&format!("Health probe failed: {}", e));
                ctx.sink()
                    .raw(&format!("{} Data Service health check failed: {}", ts, e))
                    .await?;
                Ok(JobOutcome::degraded("alive, health probe failed"))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Weekly report
// ═══════════════════════════════════════════════════════════════════════════════

/// Job: compile customer/order counts and total revenue into one line.
///
/// Read-only; the numbers reflect the Data Service at the instant of the run.
#[derive(Debug, Clone, Default)]
pub struct WeeklyReportJob;

impl WeeklyReportJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Job for WeeklyReportJob {
    fn name(&self) -> &'static str {
        "weekly_report"
    }

    fn category(&self) -> &'static str {
        "crm_report"
    }

    async fn execute(&self, ctx: &JobContext) -> JobResult {
        let customers = ctx.data().customer_count().await?;
        let orders = ctx.data().order_count().await?;
        let revenue = ctx.data().total_revenue().await?;
        ctx.record_examined(customers + orders);

        ctx.sink()
            .info(&format!(
                "Report: {} customers, {} orders, ${:.2} revenue",
                customers, orders, revenue
            ))
            .await?;
        ctx.sink().rule().await?;
        ctx.record_affected(1);

        Ok(JobOutcome::success(format!(
            "{} customers, {} orders, ${:.2} revenue",
            customers, orders, revenue
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataservice::{DataService, InMemoryDataService, ProductFilter};
    use crate::jobs::job::{execute_job, JobStatus};
    use crate::sink::LogSink;
    use chrono::Utc;
    use std::sync::Arc;

    fn defaults() -> JobDefaults {
        JobDefaults::default()
    }

    fn sink(dir: &tempfile::TempDir, category: &str) -> LogSink {
        LogSink::new(dir.path(), category)
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_inactive_customers() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        let product = svc.seed_product("Widget", 10.0, 50);

        let active = svc.seed_customer("Active", "active@example.com");
        svc.seed_order(&active, &[(&product, 1)], Utc::now() - Duration::days(10));

        let stale = svc.seed_customer("Stale", "stale@example.com");
        svc.seed_order(&stale, &[(&product, 1)], Utc::now() - Duration::days(400));

        svc.seed_customer("Silent", "silent@example.com");

        let job = CustomerSweepJob::new(&defaults());
        let run = execute_job(&job, svc.clone(), sink(&dir, job.category())).await;

        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(run.examined, 3);
        assert_eq!(run.affected, 2); // Stale and Silent
        assert_eq!(run.failed, 0);

        let remaining = svc.customers(CustomerFilter::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].email, "active@example.com");
    }

    #[tokio::test]
    async fn test_sweep_partial_failure_continues() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        let a = svc.seed_customer("A", "a@example.com");
        svc.seed_customer("B", "b@example.com");
        svc.seed_customer("C", "c@example.com");
        svc.fail_next_delete(&a.id);

        let job = CustomerSweepJob::new(&defaults());
        let s = sink(&dir, job.category());
        let run = execute_job(&job, svc.clone(), s.clone()).await;

        // One error line plus two deletion lines; the run still completes
        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(run.affected, 2);
        assert_eq!(run.failed, 1);
        assert_eq!(svc.customer_count().await.unwrap(), 1);

        let contents = std::fs::read_to_string(s.path()).unwrap();
        assert_eq!(contents.matches("Deleted customer").count(), 2);
        assert_eq!(contents.matches("Failed to delete customer").count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_unreachable_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        svc.set_offline(true);

        let job = CustomerSweepJob::new(&defaults());
        let run = execute_job(&job, svc, sink(&dir, job.category())).await;
        assert_eq!(run.status, JobStatus::Failed);
        assert_eq!(run.status.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_restock_tops_up_low_stock_only() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        svc.seed_product("Low", 5.0, 3);
        svc.seed_product("Boundary", 5.0, 10);
        svc.seed_product("High", 5.0, 40);

        let job = RestockJob::new(&defaults());
        let run = execute_job(&job, svc.clone(), sink(&dir, job.category())).await;

        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(run.affected, 1);

        let products = svc.products(ProductFilter::default()).await.unwrap();
        let stock: Vec<(String, u32)> = products
            .iter()
            .map(|p| (p.name.clone(), p.stock))
            .collect();
        assert!(stock.contains(&("Low".to_string(), 13)));
        assert!(stock.contains(&("Boundary".to_string(), 10)));
        assert!(stock.contains(&("High".to_string(), 40)));
    }

    #[tokio::test]
    async fn test_restock_nothing_low() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        svc.seed_product("Plenty", 5.0, 100);

        let job = RestockJob::new(&defaults());
        let run = execute_job(&job, svc, sink(&dir, job.category())).await;
        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(run.affected, 0);
        assert!(run.summary.contains("no products below stock threshold"));
    }

    #[tokio::test]
    async fn test_reminders_window() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        let customer = svc.seed_customer("Dana", "dana@example.com");
        let product = svc.seed_product("Monitor", 300.0, 20);
        svc.seed_order(&customer, &[(&product, 1)], Utc::now() - Duration::days(2));
        svc.seed_order(&customer, &[(&product, 2)], Utc::now() - Duration::days(30));

        let job = OrderRemindersJob::new(&defaults());
        let s = sink(&dir, job.category());
        let run = execute_job(&job, svc, s.clone()).await;

        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(run.affected, 1);

        let contents = std::fs::read_to_string(s.path()).unwrap();
        assert_eq!(contents.matches("ORDER REMINDER").count(), 1);
        assert!(contents.contains("dana@example.com"));
        assert!(contents.contains("Monitor"));
    }

    #[tokio::test]
    async fn test_reminders_not_deduplicated_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        let customer = svc.seed_customer("Eve", "eve@example.com");
        let product = svc.seed_product("Desk", 150.0, 5);
        svc.seed_order(&customer, &[(&product, 1)], Utc::now() - Duration::days(1));

        let job = OrderRemindersJob::new(&defaults());
        let s = sink(&dir, job.category());
        execute_job(&job, svc.clone(), s.clone()).await;
        execute_job(&job, svc, s.clone()).await;

        let contents = std::fs::read_to_string(s.path()).unwrap();
        assert_eq!(contents.matches("ORDER REMINDER").count(), 2);
    }

    #[tokio::test]
    async fn test_heartbeat_probe_failure_is_degraded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        svc.set_offline(true);

        let job = HeartbeatJob::new();
        let s = sink(&dir, job.category());
        let run = execute_job(&job, svc, s.clone()).await;

        assert_eq!(run.status, JobStatus::Degraded);
        assert_eq!(run.status.exit_code(), 0);

        let contents = std::fs::read_to_string(s.path()).unwrap();
        assert!(contents.contains("CRM is alive"));
        assert!(contents.contains("health check failed"));
    }

    #[tokio::test]
    async fn test_heartbeat_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        svc.seed_customer("F", "f@example.com");

        let job = HeartbeatJob::new();
        let s = sink(&dir, job.category());
        let run = execute_job(&job, svc, s.clone()).await;

        assert_eq!(run.status, JobStatus::Completed);
        let contents = std::fs::read_to_string(s.path()).unwrap();
        assert!(contents.contains("CRM is alive"));
        assert!(contents.contains("Data Service responsive: 1 customers found"));

        // Liveness line is stamped with the local date, day first
        let today = Local::now().format("%d/%m/%Y").to_string();
        assert!(contents.lines().next().unwrap().starts_with(&today));
    }

    #[tokio::test]
    async fn test_report_matches_store_at_run_time() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(InMemoryDataService::new());
        let customer = svc.seed_customer("Gia", "gia@example.com");
        let product = svc.seed_product("Chair", 80.0, 12);
        svc.seed_order(&customer, &[(&product, 2)], Utc::now());
        svc.seed_order(&customer, &[(&product, 1)], Utc::now());

        let job = WeeklyReportJob::new();
        let s = sink(&dir, job.category());
        let run = execute_job(&job, svc, s.clone()).await;

        assert_eq!(run.status, JobStatus::Completed);
        let contents = std::fs::read_to_string(s.path()).unwrap();
        assert!(contents.contains("Report: 1 customers, 2 orders, $240.00 revenue"));
        assert!(contents.contains("------"));
    }
}
