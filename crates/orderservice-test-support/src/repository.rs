//! Test repositories — `Repository<Order>` implementations for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use orderservice_core::concurrency::{ConcurrencyControl, DeletePolicy, RepositoryOptions};
use orderservice_core::error::DomainError;
use orderservice_core::model::{Order, Orderline, Version};
use orderservice_core::reconcile;
use orderservice_core::repository::{Predicate, Repository, UpdateOutcome};

#[derive(Debug, Clone)]
struct HeaderRow {
    customer_name: String,
    version: i64,
}

#[derive(Debug, Clone)]
struct LineRow {
    order_id: i32,
    product: String,
    unit_price: f64,
    quantity: i32,
}

#[derive(Debug, Default)]
struct Tables {
    next_order_id: i32,
    next_line_id: i32,
    orders: BTreeMap<i32, HeaderRow>,
    lines: BTreeMap<i32, LineRow>,
}

impl Tables {
    fn hydrate(&self, id: i32, header: &HeaderRow) -> Order {
        let orderlines = self
            .lines
            .iter()
            .filter(|(_, line)| line.order_id == id)
            .map(|(line_id, line)| Orderline {
                id: Some(*line_id),
                product: Some(line.product.clone()),
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect();
        Order {
            id: Some(id),
            customer_name: header.customer_name.clone(),
            orderlines,
            version: Some(Version::from_raw(header.version)),
        }
    }

    fn line_row(order: &Order, order_id: i32, line: &Orderline) -> Result<LineRow, DomainError> {
        let product = line.product.clone().ok_or_else(|| {
            DomainError::validation(order, "null value in column \"product\" violates not-null constraint")
        })?;
        if product.is_empty() {
            return Err(DomainError::validation(
                order,
                "new row for relation \"orderlines\" violates check constraint \"orderlines_product_not_empty\"",
            ));
        }
        Ok(LineRow {
            order_id,
            product,
            unit_price: line.unit_price,
            quantity: line.quantity,
        })
    }
}

/// A repository backed by in-process tables.
///
/// Mirrors the store semantics the tests rely on: identifiers and version
/// tokens are assigned on write, a missing product is rejected like a NOT NULL
/// column, the header write is gated by the configured strategy, and lines
/// are reconciled by identity. Every call is applied atomically regardless of
/// strategy.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    tables: Mutex<Tables>,
    options: RepositoryOptions,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository with the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty repository with the given options.
    #[must_use]
    pub fn with_options(options: RepositoryOptions) -> Self {
        Self {
            tables: Mutex::default(),
            options,
        }
    }

    /// Number of stored order headers.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn order_count(&self) -> usize {
        self.tables.lock().unwrap().orders.len()
    }

    /// Number of stored lines across all orders.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn line_count(&self) -> usize {
        self.tables.lock().unwrap().lines.len()
    }
}

#[async_trait]
impl Repository<Order> for InMemoryOrderRepository {
    async fn create(&self, model: &mut Order) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().unwrap();

        let mut rows = Vec::with_capacity(model.orderlines.len());
        for line in &model.orderlines {
            rows.push(Tables::line_row(model, 0, line)?);
        }

        tables.next_order_id += 1;
        let order_id = tables.next_order_id;
        tables.orders.insert(
            order_id,
            HeaderRow {
                customer_name: model.customer_name.clone(),
                version: 1,
            },
        );

        let mut line_ids = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.order_id = order_id;
            tables.next_line_id += 1;
            let line_id = tables.next_line_id;
            tables.lines.insert(line_id, row);
            line_ids.push(line_id);
        }

        model.id = Some(order_id);
        model.version = Some(Version::from_raw(1));
        for (line, id) in model.orderlines.iter_mut().zip(line_ids) {
            line.id = Some(id);
        }
        Ok(())
    }

    async fn read(&self, predicate: Option<&Predicate<Order>>) -> Result<Vec<Order>, DomainError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .orders
            .iter()
            .map(|(id, header)| tables.hydrate(*id, header))
            .filter(|order| predicate.is_none_or(|p| p(order)))
            .collect())
    }

    async fn find(&self, id: i32) -> Result<Option<Order>, DomainError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.orders.get(&id).map(|header| tables.hydrate(id, header)))
    }

    async fn update(&self, model: &mut Order) -> Result<UpdateOutcome, DomainError> {
        let Some(order_id) = model.id else {
            return Err(DomainError::validation(&*model, "cannot update an order without an id"));
        };
        let mut tables = self.tables.lock().unwrap();

        let Some(header) = tables.orders.get(&order_id) else {
            return Ok(UpdateOutcome::Conflict);
        };
        if self.options.concurrency == ConcurrencyControl::Optimistic
            && model.version != Some(Version::from_raw(header.version))
        {
            return Ok(UpdateOutcome::Conflict);
        }
        let next_version = header.version + 1;

        let persisted = tables.hydrate(order_id, header).orderlines;
        let plan = reconcile::plan(&persisted, &model.orderlines);

        let mut updates = Vec::with_capacity(plan.updates.len());
        for (line_id, line) in &plan.updates {
            if !tables.lines.contains_key(line_id) {
                return Ok(UpdateOutcome::Conflict);
            }
            updates.push((*line_id, Tables::line_row(model, order_id, line)?));
        }
        let mut inserts = Vec::with_capacity(plan.inserts.len());
        for (index, line) in &plan.inserts {
            inserts.push((*index, Tables::line_row(model, order_id, line)?));
        }
        let deletes = plan.deletes;

        if let Some(header) = tables.orders.get_mut(&order_id) {
            header.customer_name.clone_from(&model.customer_name);
            header.version = next_version;
        }
        for line_id in deletes {
            tables.lines.remove(&line_id);
        }
        for (line_id, row) in updates {
            tables.lines.insert(line_id, row);
        }
        for (index, row) in inserts {
            tables.next_line_id += 1;
            let line_id = tables.next_line_id;
            tables.lines.insert(line_id, row);
            model.orderlines[index].id = Some(line_id);
        }
        model.version = Some(Version::from_raw(next_version));

        Ok(UpdateOutcome::Applied)
    }

    async fn delete(&self, model: &Order) -> Result<UpdateOutcome, DomainError> {
        if self.options.delete_policy == DeletePolicy::Reject {
            return Err(DomainError::Unsupported("delete"));
        }
        let Some(order_id) = model.id else {
            return Err(DomainError::validation(model, "cannot delete an order without an id"));
        };
        let mut tables = self.tables.lock().unwrap();

        let Some(header) = tables.orders.get(&order_id) else {
            return Ok(UpdateOutcome::Conflict);
        };
        if self.options.concurrency == ConcurrencyControl::Optimistic
            && model.version != Some(Version::from_raw(header.version))
        {
            return Ok(UpdateOutcome::Conflict);
        }

        tables.lines.retain(|_, line| line.order_id != order_id);
        tables.orders.remove(&order_id);
        Ok(UpdateOutcome::Applied)
    }
}

/// A repository that fails every call with a connectivity error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingOrderRepository;

impl FailingOrderRepository {
    fn refused(aggregate: impl std::fmt::Display) -> DomainError {
        DomainError::Connectivity {
            aggregate: aggregate.to_string(),
            message: "connection refused".into(),
        }
    }
}

#[async_trait]
impl Repository<Order> for FailingOrderRepository {
    async fn create(&self, model: &mut Order) -> Result<(), DomainError> {
        Err(Self::refused(&*model))
    }

    async fn read(&self, _predicate: Option<&Predicate<Order>>) -> Result<Vec<Order>, DomainError> {
        Err(Self::refused("orders"))
    }

    async fn find(&self, id: i32) -> Result<Option<Order>, DomainError> {
        Err(Self::refused(format!("order {id}")))
    }

    async fn update(&self, model: &mut Order) -> Result<UpdateOutcome, DomainError> {
        Err(Self::refused(&*model))
    }

    async fn delete(&self, model: &Order) -> Result<UpdateOutcome, DomainError> {
        Err(Self::refused(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::rick_sanchez_order;

    #[tokio::test]
    async fn test_create_assigns_ids_and_version() {
        let repo = InMemoryOrderRepository::new();
        let mut order = rick_sanchez_order();

        repo.create(&mut order).await.unwrap();

        assert!(order.id.is_some());
        assert!(order.version.is_some());
        assert!(order.orderlines.iter().all(Orderline::is_persisted));
        assert_eq!(order.total_quantity(), 5);
    }

    #[tokio::test]
    async fn test_create_with_missing_product_writes_nothing() {
        let repo = InMemoryOrderRepository::new();
        let mut order = rick_sanchez_order();
        order.orderlines[1].product = None;

        let result = repo.create(&mut order).await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert!(order.id.is_none());
        assert_eq!(repo.order_count(), 0);
        assert_eq!(repo.line_count(), 0);
    }

    #[tokio::test]
    async fn test_create_with_empty_product_writes_nothing() {
        let repo = InMemoryOrderRepository::new();
        let mut order = Order::new("Empty").with_line(Orderline::new("", 1.0, 1));

        let result = repo.create(&mut order).await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert!(order.id.is_none());
        assert_eq!(repo.order_count(), 0);
        assert_eq!(repo.line_count(), 0);
    }

    #[tokio::test]
    async fn test_update_with_empty_product_changes_nothing() {
        let repo = InMemoryOrderRepository::new();
        let mut order = rick_sanchez_order();
        repo.create(&mut order).await.unwrap();
        let before = order.clone();

        order.customer_name = "Half".into();
        order.orderlines.remove(0);
        order.orderlines.push(Orderline::new("", 1.0, 1));
        let result = repo.update(&mut order).await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert_eq!(repo.find(before.id.unwrap()).await.unwrap(), Some(before));
    }

    #[tokio::test]
    async fn test_stale_copy_conflicts_under_optimistic() {
        let repo = InMemoryOrderRepository::new();
        let mut order = rick_sanchez_order();
        repo.create(&mut order).await.unwrap();
        let id = order.id.unwrap();

        let mut first = repo.find(id).await.unwrap().unwrap();
        let mut second = repo.find(id).await.unwrap().unwrap();
        first.customer_name = "UpdatedFirst".into();
        second.customer_name = "UpdatedSecond".into();
        second.orderlines.clear();

        assert_eq!(repo.update(&mut first).await.unwrap(), UpdateOutcome::Applied);
        assert_eq!(repo.update(&mut second).await.unwrap(), UpdateOutcome::Conflict);

        let stored = repo.find(id).await.unwrap().unwrap();
        assert_eq!(stored.customer_name, "UpdatedFirst");
        assert_eq!(stored.orderlines.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_copy_wins_under_none() {
        let repo = InMemoryOrderRepository::with_options(RepositoryOptions::with_concurrency(
            ConcurrencyControl::None,
        ));
        let mut order = rick_sanchez_order();
        repo.create(&mut order).await.unwrap();
        let id = order.id.unwrap();

        let mut first = repo.find(id).await.unwrap().unwrap();
        let mut second = repo.find(id).await.unwrap().unwrap();
        first.customer_name = "UpdatedFirst".into();
        second.customer_name = "UpdatedSecond".into();

        assert!(repo.update(&mut first).await.unwrap().is_applied());
        assert!(repo.update(&mut second).await.unwrap().is_applied());

        let stored = repo.find(id).await.unwrap().unwrap();
        assert_eq!(stored.customer_name, "UpdatedSecond");
    }

    #[tokio::test]
    async fn test_update_writes_back_inserted_line_ids() {
        let repo = InMemoryOrderRepository::new();
        let mut order = rick_sanchez_order();
        repo.create(&mut order).await.unwrap();

        order.orderlines.push(Orderline::new("Espresso", 2.5, 1));
        let outcome = repo.update(&mut order).await.unwrap();

        assert!(outcome.is_applied());
        assert!(order.orderlines[2].id.is_some());
        assert_eq!(repo.line_count(), 3);
    }

    #[tokio::test]
    async fn test_delete_rejected_by_policy() {
        let repo = InMemoryOrderRepository::with_options(RepositoryOptions {
            delete_policy: DeletePolicy::Reject,
            ..RepositoryOptions::default()
        });
        let mut order = rick_sanchez_order();
        repo.create(&mut order).await.unwrap();

        let result = repo.delete(&order).await;

        assert!(matches!(result, Err(DomainError::Unsupported("delete"))));
        assert_eq!(repo.order_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_repository_reports_connectivity() {
        let repo = FailingOrderRepository;

        let result = repo.read(None).await;

        assert!(matches!(result, Err(DomainError::Connectivity { .. })));
    }
}
