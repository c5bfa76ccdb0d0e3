//! Structured filter predicates for Data Service queries.
//!
//! Filters are explicit values with enumerated optional fields rather than
//! string-keyed lookups: substring match on text fields, range match on
//! numeric and date fields, and boolean flags such as low-stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive range predicate over an ordered field.
///
/// Either end may be open. `matches` is true when the value falls inside
/// every bound that is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Range<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<T>,
}

impl<T: PartialOrd> Range<T> {
    pub fn at_least(value: T) -> Self {
        Self {
            gte: Some(value),
            lte: None,
        }
    }

    pub fn at_most(value: T) -> Self {
        Self {
            gte: None,
            lte: Some(value),
        }
    }

    pub fn between(low: T, high: T) -> Self {
        Self {
            gte: Some(low),
            lte: Some(high),
        }
    }

    pub fn matches(&self, value: &T) -> bool {
        if let Some(ref low) = self.gte {
            if value < low {
                return false;
            }
        }
        if let Some(ref high) = self.lte {
            if value > high {
                return false;
            }
        }
        true
    }

    pub fn is_unbounded(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }
}

/// Sort direction for a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Optional sort key; result order is significant only when one is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Filter predicates for customer queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFilter {
    /// Case-insensitive substring match on the display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,

    /// Case-insensitive substring match on the email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_contains: Option<String>,

    /// Prefix match on the phone number (e.g. "+1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_starts_with: Option<String>,

    /// Creation timestamp range
    #[serde(default, skip_serializing_if = "Range::is_unbounded")]
    pub created_at: Range<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
}

/// Filter predicates for product queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    /// Case-insensitive substring match on the product name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,

    /// Price range
    #[serde(default, skip_serializing_if = "Range::is_unbounded")]
    pub price: Range<f64>,

    /// Stock range
    #[serde(default, skip_serializing_if = "Range::is_unbounded")]
    pub stock: Range<u32>,

    /// Products with stock strictly below the service's low-stock threshold
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub low_stock: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
}

impl ProductFilter {
    /// Only low-stock products.
    pub fn low_stock() -> Self {
        Self {
            low_stock: true,
            ..Default::default()
        }
    }
}

/// Filter predicates for order queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    /// Restrict to a single customer's orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    /// Case-insensitive substring match on the owning customer's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name_contains: Option<String>,

    /// Case-insensitive substring match on any product name on the order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name_contains: Option<String>,

    /// Orders that include the given product
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    /// Order timestamp range
    #[serde(default, skip_serializing_if = "Range::is_unbounded")]
    pub order_date: Range<DateTime<Utc>>,

    /// Total amount range
    #[serde(default, skip_serializing_if = "Range::is_unbounded")]
    pub total_amount: Range<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
}

impl OrderFilter {
    /// Orders placed on or after the given instant.
    pub fn since(cutoff: DateTime<Utc>) -> Self {
        Self {
            order_date: Range::at_least(cutoff),
            ..Default::default()
        }
    }

    /// Orders belonging to one customer, placed on or after the given instant.
    pub fn for_customer_since(customer_id: impl Into<String>, cutoff: DateTime<Utc>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            order_date: Range::at_least(cutoff),
            ..Default::default()
        }
    }
}
