//! The Data Service seam.
//!
//! The Data Service is an external collaborator owning persistent entity
//! storage; the job runner talks to it exclusively through the [`DataService`]
//! trait. Two implementations are provided:
//!
//! - [`HttpDataService`]: GraphQL-over-HTTP client for the production endpoint
//! - [`InMemoryDataService`]: in-process store for tests and local runs
//!
//! Mutations that batch several rows come in two transactional flavors,
//! mirroring the jobs that call them: `delete_customer` is a single-item
//! transaction (the inactive sweep issues N of them independently), while
//! `restock_products` is one atomic all-or-nothing batch.

pub mod filter;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result};
use crate::model::{Customer, NewCustomer, NewOrder, NewProduct, Order, Product};

pub use filter::{CustomerFilter, OrderFilter, ProductFilter, Range, SortDirection, SortKey};
pub use http::HttpDataService;
pub use memory::InMemoryDataService;

/// Outcome of one item in a bulk mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemOutcome<T> {
    /// Index of the input record this outcome belongs to
    pub index: usize,
    /// The persisted entity on success, or the rejection reasons
    pub result: std::result::Result<T, Vec<FieldError>>,
}

/// Aggregate result of a bulk creation: per-item outcomes, never
/// whole-batch failure on one bad record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResult<T> {
    pub outcomes: Vec<BulkItemOutcome<T>>,
    pub success_count: usize,
    pub error_count: usize,
}

impl<T> BulkResult<T> {
    pub fn from_outcomes(outcomes: Vec<BulkItemOutcome<T>>) -> Self {
        let success_count = outcomes.iter().filter(|o| o.result.is_ok()).count();
        let error_count = outcomes.len() - success_count;
        Self {
            outcomes,
            success_count,
            error_count,
        }
    }

    /// Iterate over the successfully persisted entities.
    pub fn created(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }
}

/// Query and mutation interface over the CRM entity collections.
#[async_trait]
pub trait DataService: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Customers matching the filter, ordered per its sort key if any.
    async fn customers(&self, filter: CustomerFilter) -> Result<Vec<Customer>>;

    /// Products matching the filter.
    async fn products(&self, filter: ProductFilter) -> Result<Vec<Product>>;

    /// Orders matching the filter.
    async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;

    /// Total number of customers.
    async fn customer_count(&self) -> Result<u64>;

    /// Total number of orders.
    async fn order_count(&self) -> Result<u64>;

    /// Sum of all order totals at this instant.
    async fn total_revenue(&self) -> Result<f64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create one customer; field-level validation errors are returned as
    /// `ErrorCode::ValidationFailed`.
    async fn create_customer(&self, input: NewCustomer) -> Result<Customer>;

    /// Create many customers; one bad record never fails the batch.
    async fn bulk_create_customers(&self, inputs: Vec<NewCustomer>) -> Result<BulkResult<Customer>>;

    /// Create one product; negative prices are rejected at field scope.
    async fn create_product(&self, input: NewProduct) -> Result<Product>;

    /// Create one order; the service resolves prices-at-time and computes the
    /// total from line subtotals.
    async fn create_order(&self, input: NewOrder) -> Result<Order>;

    /// Delete one customer in its own transaction.
    async fn delete_customer(&self, id: &str) -> Result<()>;

    /// Increment stock by `amount` for every listed product, atomically:
    /// either every product is updated or none is. Returns the updated rows.
    async fn restock_products(&self, ids: &[String], amount: u32) -> Result<Vec<Product>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use crate::model::Customer;
    use chrono::Utc;

    fn customer(id: &str) -> Customer {
        Customer {
            id: id.into(),
            name: format!("c{}", id),
            email: format!("c{}@example.com", id),
            phone: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_bulk_result_counts() {
        let outcomes = vec![
            BulkItemOutcome {
                index: 0,
                result: Ok(customer("1")),
            },
            BulkItemOutcome {
                index: 1,
                result: Err(vec![FieldError::new("email", "already exists")]),
            },
            BulkItemOutcome {
                index: 2,
                result: Ok(customer("2")),
            },
        ];
        let bulk = BulkResult::from_outcomes(outcomes);
        assert_eq!(bulk.success_count, 2);
        assert_eq!(bulk.error_count, 1);
        assert_eq!(bulk.created().count(), 2);
    }
}
