//! In-memory Data Service backend.
//!
//! Backs the test suite and local runs without a live endpoint. Enforces the
//! same invariants the production service does: unique emails, positive
//! prices, phone format, and order totals computed once from line subtotals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashSet;

use super::filter::{CustomerFilter, OrderFilter, ProductFilter, SortDirection};
use super::{BulkItemOutcome, BulkResult, DataService};
use crate::error::{CrmError, FieldError, Result};
use crate::model::{Customer, NewCustomer, NewOrder, NewProduct, Order, OrderItem, Product};

#[derive(Default)]
struct Store {
    customers: Vec<Customer>,
    products: Vec<Product>,
    orders: Vec<Order>,
    next_id: u64,
    /// Customer ids whose next deletion fails (fault injection for tests)
    failing_deletes: HashSet<String>,
    /// When set, every call fails as if the service were down
    offline: bool,
}

impl Store {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// In-process [`DataService`] implementation.
#[derive(Default)]
pub struct InMemoryDataService {
    store: RwLock<Store>,
}

/// Stock level below which a product counts as low-stock.
const LOW_STOCK_THRESHOLD: u32 = 10;

impl InMemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding and fault injection
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a product directly, bypassing validation.
    pub fn seed_product(&self, name: &str, price: f64, stock: u32) -> Product {
        let mut store = self.store.write();
        let product = Product {
            id: store.allocate_id(),
            name: name.to_string(),
            price,
            stock,
        };
        store.products.push(product.clone());
        product
    }

    /// Insert a customer directly, bypassing validation.
    pub fn seed_customer(&self, name: &str, email: &str) -> Customer {
        let mut store = self.store.write();
        let customer = Customer {
            id: store.allocate_id(),
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            created_at: Utc::now(),
        };
        store.customers.push(customer.clone());
        customer
    }

    /// Insert an order with an explicit order date.
    pub fn seed_order(
        &self,
        customer: &Customer,
        lines: &[(&Product, u32)],
        order_date: DateTime<Utc>,
    ) -> Order {
        let mut store = self.store.write();
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|(product, quantity)| OrderItem {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: *quantity,
                price_at_time: product.price,
            })
            .collect();
        let total_amount = items.iter().map(OrderItem::subtotal).sum();
        let order = Order {
            id: store.allocate_id(),
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            items,
            total_amount,
            order_date,
        };
        store.orders.push(order.clone());
        order
    }

    /// Make the next deletion of the given customer fail.
    pub fn fail_next_delete(&self, customer_id: &str) {
        self.store
            .write()
            .failing_deletes
            .insert(customer_id.to_string());
    }

    /// Toggle simulated connectivity loss.
    pub fn set_offline(&self, offline: bool) {
        self.store.write().offline = offline;
    }

    fn check_online(store: &Store) -> Result<()> {
        if store.offline {
            Err(CrmError::unreachable("simulated outage"))
        } else {
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    fn validate_customer(store: &Store, input: &NewCustomer) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if input.name.trim().is_empty() {
            errors.push(FieldError::new("name", "must not be empty"));
        }
        if !input.email.contains('@') {
            errors.push(FieldError::new("email", "invalid email address"));
        }
        if store
            .customers
            .iter()
            .any(|c| c.email.eq_ignore_ascii_case(&input.email))
        {
            errors.push(FieldError::new("email", "already exists"));
        }
        if let Some(phone) = &input.phone {
            if !valid_phone(phone) {
                errors.push(FieldError::new(
                    "phone",
                    "must contain only digits and optionally start with +",
                ));
            }
        }
        errors
    }

    fn validate_product(input: &NewProduct) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if input.name.trim().is_empty() {
            errors.push(FieldError::new("name", "must not be empty"));
        }
        if !input.price.is_finite() || input.price < 0.0 {
            errors.push(FieldError::new("price", "must be non-negative"));
        }
        errors
    }
}

/// Digits only, optionally prefixed with `+`, first digit nonzero.
fn valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    !digits.is_empty()
        && digits.len() <= 16
        && !digits.starts_with('0')
        && digits.chars().all(|c| c.is_ascii_digit())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn customers(&self, filter: CustomerFilter) -> Result<Vec<Customer>> {
        let store = self.store.read();
        Self::check_online(&store)?;
        let mut matched: Vec<Customer> = store
            .customers
            .iter()
            .filter(|c| {
                filter
                    .name_contains
                    .as_deref()
                    .map_or(true, |n| contains_ci(&c.name, n))
                    && filter
                        .email_contains
                        .as_deref()
                        .map_or(true, |e| contains_ci(&c.email, e))
                    && filter.phone_starts_with.as_deref().map_or(true, |p| {
                        c.phone.as_deref().is_some_and(|phone| phone.starts_with(p))
                    })
                    && filter.created_at.matches(&c.created_at)
            })
            .cloned()
            .collect();
        if let Some(sort) = &filter.sort {
            if sort.field == "createdAt" {
                matched.sort_by_key(|c| c.created_at);
                if sort.direction == SortDirection::Desc {
                    matched.reverse();
                }
            }
        }
        Ok(matched)
    }

    async fn products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let store = self.store.read();
        Self::check_online(&store)?;
        let mut matched: Vec<Product> = store
            .products
            .iter()
            .filter(|p| {
                filter
                    .name_contains
                    .as_deref()
                    .map_or(true, |n| contains_ci(&p.name, n))
                    && filter.price.matches(&p.price)
                    && filter.stock.matches(&p.stock)
                    && (!filter.low_stock || p.stock < LOW_STOCK_THRESHOLD)
            })
            .cloned()
            .collect();
        if let Some(sort) = &filter.sort {
            match sort.field.as_str() {
                "stock" => matched.sort_by_key(|p| p.stock),
                "price" => matched.sort_by(|a, b| a.price.total_cmp(&b.price)),
                _ => {}
            }
            if sort.direction == SortDirection::Desc {
                matched.reverse();
            }
        }
        Ok(matched)
    }

    async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let store = self.store.read();
        Self::check_online(&store)?;
        let mut matched: Vec<Order> = store
            .orders
            .iter()
            .filter(|o| {
                filter.customer_id.as_deref().map_or(true, |id| o.customer_id == id)
                    && filter
                        .customer_name_contains
                        .as_deref()
                        .map_or(true, |n| contains_ci(&o.customer_name, n))
                    && filter.product_name_contains.as_deref().map_or(true, |n| {
                        o.items.iter().any(|i| contains_ci(&i.product_name, n))
                    })
                    && filter
                        .product_id
                        .as_deref()
                        .map_or(true, |id| o.items.iter().any(|i| i.product_id == id))
                    && filter.order_date.matches(&o.order_date)
                    && filter.total_amount.matches(&o.total_amount)
            })
            .cloned()
            .collect();
        if let Some(sort) = &filter.sort {
            if sort.field == "orderDate" {
                matched.sort_by_key(|o| o.order_date);
                if sort.direction == SortDirection::Desc {
                    matched.reverse();
                }
            }
        }
        Ok(matched)
    }

    async fn customer_count(&self) -> Result<u64> {
        let store = self.store.read();
        Self::check_online(&store)?;
        Ok(store.customers.len() as u64)
    }

    async fn order_count(&self) -> Result<u64> {
        let store = self.store.read();
        Self::check_online(&store)?;
        Ok(store.orders.len() as u64)
    }

    async fn total_revenue(&self) -> Result<f64> {
        let store = self.store.read();
        Self::check_online(&store)?;
        Ok(store.orders.iter().map(|o| o.total_amount).sum())
    }

    async fn create_customer(&self, input: NewCustomer) -> Result<Customer> {
        let mut store = self.store.write();
        Self::check_online(&store)?;
        let errors = Self::validate_customer(&store, &input);
        if !errors.is_empty() {
            return Err(CrmError::validation("Customer rejected", errors));
        }
        let customer = Customer {
            id: store.allocate_id(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            created_at: Utc::now(),
        };
        store.customers.push(customer.clone());
        Ok(customer)
    }

    async fn bulk_create_customers(&self, inputs: Vec<NewCustomer>) -> Result<BulkResult<Customer>> {
        let mut store = self.store.write();
        Self::check_online(&store)?;
        let mut outcomes = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let errors = Self::validate_customer(&store, &input);
            if errors.is_empty() {
                let customer = Customer {
                    id: store.allocate_id(),
                    name: input.name,
                    email: input.email,
                    phone: input.phone,
                    created_at: Utc::now(),
                };
                store.customers.push(customer.clone());
                outcomes.push(BulkItemOutcome {
                    index,
                    result: Ok(customer),
                });
            } else {
                outcomes.push(BulkItemOutcome {
                    index,
                    result: Err(errors),
                });
            }
        }
        Ok(BulkResult::from_outcomes(outcomes))
    }

    async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let mut store = self.store.write();
        Self::check_online(&store)?;
        let errors = Self::validate_product(&input);
        if !errors.is_empty() {
            return Err(CrmError::validation("Product rejected", errors));
        }
        let product = Product {
            id: store.allocate_id(),
            name: input.name,
            price: input.price,
            stock: input.stock,
        };
        store.products.push(product.clone());
        Ok(product)
    }

    async fn create_order(&self, input: NewOrder) -> Result<Order> {
        let mut store = self.store.write();
        Self::check_online(&store)?;
        if input.lines.is_empty() {
            return Err(CrmError::validation(
                "Order rejected",
                vec![FieldError::new("lines", "at least one product required")],
            ));
        }
        let customer = store
            .customers
            .iter()
            .find(|c| c.id == input.customer_id)
            .cloned()
            .ok_or_else(|| CrmError::not_found("customer", &input.customer_id))?;

        let mut items = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = store
                .products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or_else(|| CrmError::not_found("product", &line.product_id))?;
            items.push(OrderItem {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: line.quantity.max(1),
                price_at_time: product.price,
            });
        }
        // Total is fixed here and never recomputed
        let total_amount = items.iter().map(OrderItem::subtotal).sum();
        let order = Order {
            id: store.allocate_id(),
            customer_id: customer.id,
            customer_name: customer.name,
            customer_email: customer.email,
            items,
            total_amount,
            order_date: Utc::now(),
        };
        store.orders.push(order.clone());
        Ok(order)
    }

    async fn delete_customer(&self, id: &str) -> Result<()> {
        let mut store = self.store.write();
        Self::check_online(&store)?;
        if store.failing_deletes.remove(id) {
            return Err(CrmError::with_internal(
                crate::error::ErrorCode::MutationFailed,
                format!("customer {} could not be deleted", id),
                "injected referential constraint failure",
            ));
        }
        let before = store.customers.len();
        store.customers.retain(|c| c.id != id);
        if store.customers.len() == before {
            return Err(CrmError::not_found("customer", id));
        }
        store.orders.retain(|o| o.customer_id != id);
        Ok(())
    }

    async fn restock_products(&self, ids: &[String], amount: u32) -> Result<Vec<Product>> {
        let mut store = self.store.write();
        Self::check_online(&store)?;
        // All-or-nothing: verify every id exists before touching any row
        for id in ids {
            if !store.products.iter().any(|p| &p.id == id) {
                return Err(CrmError::not_found("product", id));
            }
        }
        let mut updated = Vec::with_capacity(ids.len());
        for product in store.products.iter_mut() {
            if ids.contains(&product.id) {
                product.stock += amount;
                updated.push(product.clone());
            }
        }
        Ok(updated)
    }
}
