//! `PostgreSQL` implementation of `Repository<Order>`.
//!
//! Every public operation checks out its own connection and releases it on
//! return. The `*_in` variants run on a caller-owned [`PgUnitOfWork`]
//! instead, and use savepoints where an operation needs its own atomicity.

use async_trait::async_trait;
use orderservice_core::concurrency::{ConcurrencyControl, DeletePolicy, RepositoryOptions};
use orderservice_core::context::DataContext;
use orderservice_core::error::DomainError;
use orderservice_core::model::{Order, Orderline, Version};
use orderservice_core::reconcile;
use orderservice_core::repository::{Predicate, Repository, UpdateOutcome};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, FromRow, PgConnection, Postgres};
use tracing::{debug, info, instrument, warn};

use crate::context::PgDataContext;
use crate::error::SqlResultExt;
use crate::statements;
use crate::unit_of_work::PgUnitOfWork;

const ORDERS: &str = "orders";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i32,
    customer_name: String,
    version: i64,
}

#[derive(Debug, FromRow)]
struct OrderlineRow {
    id: i32,
    product: String,
    unit_price: f64,
    quantity: i32,
}

impl From<OrderlineRow> for Orderline {
    fn from(row: OrderlineRow) -> Self {
        Self {
            id: Some(row.id),
            product: Some(row.product),
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowLock {
    None,
    ForUpdate,
}

/// Identifiers assigned by a successful create.
#[derive(Debug)]
struct Created {
    order_id: i32,
    version: i64,
    line_ids: Vec<i32>,
}

/// What a reconciliation did.
#[derive(Debug, PartialEq, Eq)]
enum Reconciled {
    Conflict,
    Applied {
        version: i64,
        /// `(index into the edited lines, assigned id)` for each insert.
        inserted: Vec<(usize, i32)>,
    },
}

async fn load_lines(
    conn: &mut PgConnection,
    order_id: i32,
    lock: RowLock,
) -> Result<Vec<Orderline>, sqlx::Error> {
    let sql = match lock {
        RowLock::None => statements::SELECT_ORDERLINES,
        RowLock::ForUpdate => statements::SELECT_ORDERLINES_FOR_UPDATE,
    };
    let rows: Vec<OrderlineRow> = sqlx::query_as(sql).bind(order_id).fetch_all(conn).await?;
    Ok(rows.into_iter().map(Orderline::from).collect())
}

async fn hydrate(
    conn: &mut PgConnection,
    header: OrderRow,
    lock: RowLock,
) -> Result<Order, sqlx::Error> {
    let orderlines = load_lines(conn, header.id, lock).await?;
    Ok(Order {
        id: Some(header.id),
        customer_name: header.customer_name,
        orderlines,
        version: Some(Version::from_raw(header.version)),
    })
}

async fn load_all(conn: &mut PgConnection) -> Result<Vec<Order>, sqlx::Error> {
    let headers: Vec<OrderRow> = sqlx::query_as(statements::SELECT_ORDERS)
        .fetch_all(&mut *conn)
        .await?;
    let mut orders = Vec::with_capacity(headers.len());
    for header in headers {
        orders.push(hydrate(&mut *conn, header, RowLock::None).await?);
    }
    Ok(orders)
}

async fn load_one(
    conn: &mut PgConnection,
    order_id: i32,
    lock: RowLock,
) -> Result<Option<Order>, sqlx::Error> {
    let sql = match lock {
        RowLock::None => statements::SELECT_ORDER,
        RowLock::ForUpdate => statements::SELECT_ORDER_FOR_UPDATE,
    };
    let header: Option<OrderRow> = sqlx::query_as(sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    match header {
        Some(header) => Ok(Some(hydrate(conn, header, lock).await?)),
        None => Ok(None),
    }
}

async fn insert_line(
    conn: &mut PgConnection,
    order_id: i32,
    line: &Orderline,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(statements::INSERT_ORDERLINE)
        .bind(order_id)
        .bind(line.product.as_deref())
        .bind(line.unit_price)
        .bind(line.quantity)
        .fetch_one(conn)
        .await
}

/// Inserts the header and every line in one transaction (a savepoint when
/// `conn` is already inside one). Dropping the transaction on error rolls
/// back every row written so far.
async fn insert_aggregate(conn: &mut PgConnection, order: &Order) -> Result<Created, sqlx::Error> {
    let mut tx = conn.begin().await?;

    let (order_id, version): (i32, i64) = sqlx::query_as(statements::INSERT_ORDER)
        .bind(&order.customer_name)
        .fetch_one(&mut *tx)
        .await?;

    let mut line_ids = Vec::with_capacity(order.orderlines.len());
    for line in &order.orderlines {
        line_ids.push(insert_line(&mut tx, order_id, line).await?);
    }

    tx.commit().await?;
    Ok(Created {
        order_id,
        version,
        line_ids,
    })
}

/// Loads the persisted state, writes the header under `strategy`, then
/// applies the line diff: deletes, updates, inserts. Stops at the first
/// statement that affects zero rows.
async fn reconcile_on(
    conn: &mut PgConnection,
    order_id: i32,
    order: &Order,
    strategy: ConcurrencyControl,
) -> Result<Reconciled, sqlx::Error> {
    let lock = match strategy {
        ConcurrencyControl::Pessimistic => RowLock::ForUpdate,
        ConcurrencyControl::None | ConcurrencyControl::Optimistic => RowLock::None,
    };
    let Some(persisted) = load_one(&mut *conn, order_id, lock).await? else {
        return Ok(Reconciled::Conflict);
    };

    let version: Option<i64> = match strategy {
        ConcurrencyControl::Optimistic => {
            sqlx::query_scalar::<_, i64>(statements::UPDATE_ORDER_IF_VERSION)
                .bind(order_id)
                .bind(&order.customer_name)
                .bind(order.version.map(Version::as_raw))
                .fetch_optional(&mut *conn)
                .await?
        }
        ConcurrencyControl::None | ConcurrencyControl::Pessimistic => {
            sqlx::query_scalar::<_, i64>(statements::UPDATE_ORDER)
                .bind(order_id)
                .bind(&order.customer_name)
                .fetch_optional(&mut *conn)
                .await?
        }
    };
    let Some(version) = version else {
        return Ok(Reconciled::Conflict);
    };

    let plan = reconcile::plan(&persisted.orderlines, &order.orderlines);
    debug!(
        deletes = plan.deletes.len(),
        updates = plan.updates.len(),
        inserts = plan.inserts.len(),
        "reconciling order lines"
    );

    for line_id in &plan.deletes {
        let deleted = sqlx::query(statements::DELETE_ORDERLINE)
            .bind(*line_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        if deleted != 1 {
            return Ok(Reconciled::Conflict);
        }
    }

    for (line_id, line) in &plan.updates {
        let updated = sqlx::query(statements::UPDATE_ORDERLINE)
            .bind(*line_id)
            .bind(order_id)
            .bind(line.product.as_deref())
            .bind(line.unit_price)
            .bind(line.quantity)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        if updated != 1 {
            return Ok(Reconciled::Conflict);
        }
    }

    let mut inserted = Vec::with_capacity(plan.inserts.len());
    for (index, line) in &plan.inserts {
        inserted.push((*index, insert_line(&mut *conn, order_id, line).await?));
    }

    Ok(Reconciled::Applied { version, inserted })
}

/// Runs the reconciliation under `strategy` in its own transaction (a
/// savepoint inside a unit of work), committed only when every step applied.
/// A conflict or error leaves the stored aggregate as it was. Only the
/// pessimistic strategy takes row locks while loading the old state.
async fn update_on(
    conn: &mut PgConnection,
    order_id: i32,
    order: &Order,
    strategy: ConcurrencyControl,
) -> Result<Reconciled, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let reconciled = reconcile_on(&mut tx, order_id, order, strategy).await?;
    match reconciled {
        Reconciled::Applied { .. } => tx.commit().await?,
        Reconciled::Conflict => tx.rollback().await?,
    }
    Ok(reconciled)
}

/// Removes every line of the order, then the header, in one transaction.
/// Under the optimistic strategy the header delete is gated by `version`.
async fn delete_on(
    conn: &mut PgConnection,
    order_id: i32,
    version: Option<Version>,
    strategy: ConcurrencyControl,
) -> Result<UpdateOutcome, sqlx::Error> {
    let mut tx = conn.begin().await?;

    sqlx::query(statements::DELETE_ORDERLINES_OF_ORDER)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    let deleted = match strategy {
        ConcurrencyControl::Optimistic => {
            sqlx::query(statements::DELETE_ORDER_IF_VERSION)
                .bind(order_id)
                .bind(version.map(Version::as_raw))
                .execute(&mut *tx)
                .await?
        }
        ConcurrencyControl::None | ConcurrencyControl::Pessimistic => {
            sqlx::query(statements::DELETE_ORDER)
                .bind(order_id)
                .execute(&mut *tx)
                .await?
        }
    }
    .rows_affected();

    if deleted == 1 {
        tx.commit().await?;
        Ok(UpdateOutcome::Applied)
    } else {
        tx.rollback().await?;
        Ok(UpdateOutcome::Conflict)
    }
}

fn apply_created(order: &mut Order, created: Created) {
    order.id = Some(created.order_id);
    order.version = Some(Version::from_raw(created.version));
    for (line, id) in order.orderlines.iter_mut().zip(created.line_ids) {
        line.id = Some(id);
    }
}

fn apply_reconciled(order: &mut Order, reconciled: Reconciled) -> UpdateOutcome {
    match reconciled {
        Reconciled::Conflict => UpdateOutcome::Conflict,
        Reconciled::Applied { version, inserted } => {
            order.version = Some(Version::from_raw(version));
            for (index, id) in inserted {
                if let Some(line) = order.orderlines.get_mut(index) {
                    line.id = Some(id);
                }
            }
            UpdateOutcome::Applied
        }
    }
}

/// PostgreSQL-backed order repository.
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    context: PgDataContext,
    options: RepositoryOptions,
}

impl PgOrderRepository {
    /// Creates a repository over `context` with the given strategy and
    /// delete policy.
    #[must_use]
    pub fn new(context: PgDataContext, options: RepositoryOptions) -> Self {
        Self { context, options }
    }

    /// The configured strategy and delete policy.
    #[must_use]
    pub fn options(&self) -> RepositoryOptions {
        self.options
    }

    async fn acquire(&self, aggregate: &str) -> Result<PoolConnection<Postgres>, DomainError> {
        self.context
            .open()
            .await
            .map_err(|e| e.with_aggregate(aggregate))
    }

    async fn create_with(
        &self,
        conn: &mut PgConnection,
        order: &mut Order,
    ) -> Result<(), DomainError> {
        let label = order.to_string();
        let created = insert_aggregate(conn, order).await.for_aggregate(&label)?;
        info!(
            order_id = created.order_id,
            lines = created.line_ids.len(),
            "order created"
        );
        apply_created(order, created);
        Ok(())
    }

    async fn update_with(
        &self,
        conn: &mut PgConnection,
        order: &mut Order,
    ) -> Result<UpdateOutcome, DomainError> {
        let label = order.to_string();
        let Some(order_id) = order.id else {
            return Err(DomainError::validation(label, "cannot update an order without an id"));
        };
        let strategy = self.options.concurrency;

        let reconciled = update_on(conn, order_id, order, strategy)
            .await
            .for_aggregate(&label)?;
        let outcome = apply_reconciled(order, reconciled);

        if outcome.is_applied() {
            debug!(order_id, version = ?order.version, "order updated");
        } else {
            warn!(order_id, %strategy, "order update conflicted");
        }
        Ok(outcome)
    }

    async fn delete_with(
        &self,
        conn: &mut PgConnection,
        order: &Order,
    ) -> Result<UpdateOutcome, DomainError> {
        if self.options.delete_policy == DeletePolicy::Reject {
            return Err(DomainError::Unsupported("delete"));
        }
        let label = order.to_string();
        let Some(order_id) = order.id else {
            return Err(DomainError::validation(label, "cannot delete an order without an id"));
        };

        let outcome = delete_on(conn, order_id, order.version, self.options.concurrency)
            .await
            .for_aggregate(&label)?;

        if outcome.is_applied() {
            info!(order_id, "order deleted");
        } else {
            warn!(order_id, "order delete conflicted");
        }
        Ok(outcome)
    }

    /// Creates `order` inside `uow`. The insert is still all or nothing
    /// within the unit of work.
    ///
    /// # Errors
    ///
    /// See [`Repository::create`].
    pub async fn create_in(
        &self,
        uow: &mut PgUnitOfWork,
        order: &mut Order,
    ) -> Result<(), DomainError> {
        self.create_with(uow.connection(), order).await
    }

    /// Reads every order as seen by `uow`.
    ///
    /// # Errors
    ///
    /// See [`Repository::read`].
    pub async fn read_in(
        &self,
        uow: &mut PgUnitOfWork,
        predicate: Option<&Predicate<Order>>,
    ) -> Result<Vec<Order>, DomainError> {
        let mut orders = load_all(uow.connection()).await.for_aggregate(ORDERS)?;
        if let Some(predicate) = predicate {
            orders.retain(|order| predicate(order));
        }
        Ok(orders)
    }

    /// Finds one order as seen by `uow`.
    ///
    /// # Errors
    ///
    /// See [`Repository::find`].
    pub async fn find_in(
        &self,
        uow: &mut PgUnitOfWork,
        id: i32,
    ) -> Result<Option<Order>, DomainError> {
        load_one(uow.connection(), id, RowLock::None)
            .await
            .for_aggregate(&format!("order {id}"))
    }

    /// Updates `order` inside `uow`.
    ///
    /// The reconciliation runs in a savepoint, so a conflict or error undoes
    /// only this update and leaves earlier work in `uow` intact.
    ///
    /// # Errors
    ///
    /// See [`Repository::update`].
    pub async fn update_in(
        &self,
        uow: &mut PgUnitOfWork,
        order: &mut Order,
    ) -> Result<UpdateOutcome, DomainError> {
        self.update_with(uow.connection(), order).await
    }

    /// Deletes `order` inside `uow`.
    ///
    /// # Errors
    ///
    /// See [`Repository::delete`].
    pub async fn delete_in(
        &self,
        uow: &mut PgUnitOfWork,
        order: &Order,
    ) -> Result<UpdateOutcome, DomainError> {
        self.delete_with(uow.connection(), order).await
    }
}

#[async_trait]
impl Repository<Order> for PgOrderRepository {
    #[instrument(skip_all, fields(customer_name = %order.customer_name))]
    async fn create(&self, order: &mut Order) -> Result<(), DomainError> {
        let mut conn = self.acquire(&order.to_string()).await?;
        self.create_with(&mut conn, order).await
    }

    #[instrument(skip_all, fields(filtered = predicate.is_some()))]
    async fn read(&self, predicate: Option<&Predicate<Order>>) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.acquire(ORDERS).await?;
        let mut tx = conn.begin().await.for_aggregate(ORDERS)?;
        sqlx::query(statements::SET_READ_SNAPSHOT)
            .execute(&mut *tx)
            .await
            .for_aggregate(ORDERS)?;
        let mut orders = load_all(&mut tx).await.for_aggregate(ORDERS)?;
        tx.commit().await.for_aggregate(ORDERS)?;

        if let Some(predicate) = predicate {
            orders.retain(|order| predicate(order));
        }
        debug!(count = orders.len(), "orders read");
        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn find(&self, id: i32) -> Result<Option<Order>, DomainError> {
        let label = format!("order {id}");
        let mut conn = self.acquire(&label).await?;
        let mut tx = conn.begin().await.for_aggregate(&label)?;
        sqlx::query(statements::SET_READ_SNAPSHOT)
            .execute(&mut *tx)
            .await
            .for_aggregate(&label)?;
        let order = load_one(&mut tx, id, RowLock::None).await.for_aggregate(&label)?;
        tx.commit().await.for_aggregate(&label)?;
        Ok(order)
    }

    #[instrument(skip_all, fields(order_id = ?order.id, strategy = %self.options.concurrency))]
    async fn update(&self, order: &mut Order) -> Result<UpdateOutcome, DomainError> {
        let mut conn = self.acquire(&order.to_string()).await?;
        self.update_with(&mut conn, order).await
    }

    #[instrument(skip_all, fields(order_id = ?order.id, strategy = %self.options.concurrency))]
    async fn delete(&self, order: &Order) -> Result<UpdateOutcome, DomainError> {
        let mut conn = self.acquire(&order.to_string()).await?;
        self.delete_with(&mut conn, order).await
    }
}
