//! The `Order` aggregate and its owned `Orderline` entities.
//!
//! An order is created in memory without identity. The store assigns the
//! header identifier, every line identifier, and the version token when the
//! aggregate is first persisted; after that the identifiers never change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::repository::Model;

/// Opaque concurrency token stamped by the store on every header write.
///
/// Only equality is meaningful. The optimistic strategy compares the token
/// read with the aggregate against the one currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Wraps a raw token as produced by a store.
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw token for binding into a statement.
    #[must_use]
    pub const fn as_raw(self) -> i64 {
        self.0
    }
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orderline {
    /// Store-assigned identifier; `None` until the line is persisted.
    #[serde(default)]
    pub id: Option<i32>,
    /// Product name. The store rejects a missing product with a NOT NULL
    /// constraint; the aggregate itself does not check it.
    pub product: Option<String>,
    /// Price per unit.
    pub unit_price: f64,
    /// Number of units.
    pub quantity: i32,
}

impl Orderline {
    /// Creates an unpersisted line.
    #[must_use]
    pub fn new(product: impl Into<String>, unit_price: f64, quantity: i32) -> Self {
        Self {
            id: None,
            product: Some(product.into()),
            unit_price,
            quantity,
        }
    }

    /// Returns `true` once the store has assigned an identifier.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Aggregate root: an order header plus its ordered collection of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identifier; `None` until the order is created.
    #[serde(default)]
    pub id: Option<i32>,
    /// Name of the ordering customer.
    pub customer_name: String,
    /// Lines owned by this order, in insertion order.
    #[serde(default)]
    pub orderlines: Vec<Orderline>,
    /// Concurrency token as of the last read or write; `None` when unpersisted.
    #[serde(default)]
    pub version: Option<Version>,
}

impl Order {
    /// Creates an unpersisted order with no lines.
    #[must_use]
    pub fn new(customer_name: impl Into<String>) -> Self {
        Self {
            id: None,
            customer_name: customer_name.into(),
            orderlines: Vec::new(),
            version: None,
        }
    }

    /// Appends a line and returns the order, for building fixtures.
    #[must_use]
    pub fn with_line(mut self, line: Orderline) -> Self {
        self.orderlines.push(line);
        self
    }

    /// Sum of `quantity` across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.orderlines.iter().map(|l| i64::from(l.quantity)).sum()
    }

    /// Identifiers of the persisted lines, in order.
    pub fn line_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.orderlines.iter().filter_map(|l| l.id)
    }
}

impl Model for Order {
    const NAME: &'static str = "Order";
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "order {id} ({:?})", self.customer_name),
            None => write!(f, "unpersisted order ({:?})", self.customer_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rick() -> Order {
        Order::new("Rick Sanchez")
            .with_line(Orderline::new("Americano", 19.99, 3))
            .with_line(Orderline::new("Cappuccino", 22.99, 2))
    }

    #[test]
    fn test_new_order_has_no_identity() {
        let order = rick();

        assert!(order.id.is_none());
        assert!(order.version.is_none());
        assert!(order.orderlines.iter().all(|l| !l.is_persisted()));
    }

    #[test]
    fn test_total_quantity_sums_lines() {
        assert_eq!(rick().total_quantity(), 5);
    }

    #[test]
    fn test_line_ids_skips_unpersisted_lines() {
        let mut order = rick();
        order.orderlines[1].id = Some(42);

        assert_eq!(order.line_ids().collect::<Vec<_>>(), vec![42]);
    }

    #[test]
    fn test_display_identifies_aggregate() {
        let mut order = rick();
        assert_eq!(order.to_string(), "unpersisted order (\"Rick Sanchez\")");

        order.id = Some(7);
        assert_eq!(order.to_string(), "order 7 (\"Rick Sanchez\")");
    }

    #[test]
    fn test_deserialize_without_ids_or_version() {
        let json = serde_json::json!({
            "customer_name": "Morty Smith",
            "orderlines": [{ "product": "Latte", "unit_price": 3.5, "quantity": 1 }]
        });

        let order: Order = serde_json::from_value(json).unwrap();

        assert!(order.id.is_none());
        assert!(order.version.is_none());
        assert_eq!(order.orderlines[0].product.as_deref(), Some("Latte"));
        assert!(order.orderlines[0].id.is_none());
    }

    #[test]
    fn test_version_serializes_as_raw_token() {
        let value = serde_json::to_value(Version::from_raw(9)).unwrap();

        assert_eq!(value, serde_json::json!(9));
    }
}
