//! Parameterized statements issued by the order repository.

pub(crate) const SET_READ_SNAPSHOT: &str =
    "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

pub(crate) const SELECT_ORDERS: &str = r"
SELECT id, customer_name, version
FROM orders
ORDER BY id
";

pub(crate) const SELECT_ORDER: &str = r"
SELECT id, customer_name, version
FROM orders
WHERE id = $1
";

pub(crate) const SELECT_ORDER_FOR_UPDATE: &str = r"
SELECT id, customer_name, version
FROM orders
WHERE id = $1
FOR UPDATE
";

pub(crate) const SELECT_ORDERLINES: &str = r"
SELECT id, product, unit_price, quantity
FROM orderlines
WHERE order_id = $1
ORDER BY id
";

pub(crate) const SELECT_ORDERLINES_FOR_UPDATE: &str = r"
SELECT id, product, unit_price, quantity
FROM orderlines
WHERE order_id = $1
ORDER BY id
FOR UPDATE
";

pub(crate) const INSERT_ORDER: &str = r"
INSERT INTO orders (customer_name)
VALUES ($1)
RETURNING id, version
";

pub(crate) const INSERT_ORDERLINE: &str = r"
INSERT INTO orderlines (order_id, product, unit_price, quantity)
VALUES ($1, $2, $3, $4)
RETURNING id
";

pub(crate) const UPDATE_ORDER: &str = r"
UPDATE orders
SET customer_name = $2, version = version + 1
WHERE id = $1
RETURNING version
";

pub(crate) const UPDATE_ORDER_IF_VERSION: &str = r"
UPDATE orders
SET customer_name = $2, version = version + 1
WHERE id = $1 AND version = $3
RETURNING version
";

pub(crate) const UPDATE_ORDERLINE: &str = r"
UPDATE orderlines
SET order_id = $2, product = $3, unit_price = $4, quantity = $5
WHERE id = $1
";

pub(crate) const DELETE_ORDERLINE: &str = "DELETE FROM orderlines WHERE id = $1";

pub(crate) const DELETE_ORDERLINES_OF_ORDER: &str = "DELETE FROM orderlines WHERE order_id = $1";

pub(crate) const DELETE_ORDER: &str = "DELETE FROM orders WHERE id = $1";

pub(crate) const DELETE_ORDER_IF_VERSION: &str = "DELETE FROM orders WHERE id = $1 AND version = $2";
