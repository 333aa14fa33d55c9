//! Order fixtures.

use orderservice_core::model::{Order, Orderline};

/// The two-line order used throughout the test suites: an Americano and a
/// Cappuccino for Rick Sanchez, five units in total.
#[must_use]
pub fn rick_sanchez_order() -> Order {
    Order::new("Rick Sanchez")
        .with_line(Orderline::new("Americano", 19.99, 3))
        .with_line(Orderline::new("Cappuccino", 22.99, 2))
}

/// An unpersisted order for `customer_name` with one line per
/// `(product, quantity)` pair, each priced at 1.50.
#[must_use]
pub fn order_with_lines(customer_name: &str, lines: &[(&str, i32)]) -> Order {
    lines
        .iter()
        .fold(Order::new(customer_name), |order, (product, quantity)| {
            order.with_line(Orderline::new(*product, 1.50, *quantity))
        })
}
