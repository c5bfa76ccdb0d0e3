//! CRM entities as seen through the Data Service wire format.
//!
//! The Data Service owns these records; the job runner only holds
//! invocation-scoped copies obtained from queries. Field names follow the
//! endpoint's camelCase convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Unique; uniqueness is enforced by the Data Service, not the runner.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Non-negative.
    pub price: f64,
    /// Non-negative.
    pub stock: u32,
}

/// One line of an order: a product at the price it had when ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub price_at_time: f64,
}

impl OrderItem {
    pub fn subtotal(&self) -> f64 {
        self.quantity as f64 * self.price_at_time
    }
}

/// An order record.
///
/// `total_amount` equals the sum of line subtotals at creation time and is
/// never recomputed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub order_date: DateTime<Utc>,
}

impl Order {
    /// Names of the products on this order, in line order.
    pub fn product_names(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.product_name.as_str()).collect()
    }
}

/// Input record for creating a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Input record for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub stock: u32,
}

/// Input record for creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_id: String,
    /// (product id, quantity) pairs; price-at-time is resolved by the service.
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub product_id: String,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_item_subtotal() {
        let item = OrderItem {
            product_id: "1".into(),
            product_name: "Laptop".into(),
            quantity: 3,
            price_at_time: 999.99,
        };
        assert!((item.subtotal() - 2999.97).abs() < 1e-9);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let customer = Customer {
            id: "7".into(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            phone: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&customer).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
        // Absent phone is omitted, not null
        assert!(json.get("phone").is_none());
    }

    #[test]
    fn test_product_names() {
        let order = Order {
            id: "1".into(),
            customer_id: "2".into(),
            customer_name: "Bob".into(),
            customer_email: "bob@example.com".into(),
            items: vec![
                OrderItem {
                    product_id: "10".into(),
                    product_name: "Mouse".into(),
                    quantity: 1,
                    price_at_time: 25.0,
                },
                OrderItem {
                    product_id: "11".into(),
                    product_name: "Keyboard".into(),
                    quantity: 2,
                    price_at_time: 40.0,
                },
            ],
            total_amount: 105.0,
            order_date: Utc::now(),
        };
        assert_eq!(order.product_names(), vec!["Mouse", "Keyboard"]);
    }
}
