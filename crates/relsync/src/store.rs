//! The transactional executor seam.
//!
//! Updaters never build SQL strings. They hand structured commands to a
//! [`RelationStore`]; [`SqlStore`] renders them for any
//! [`Connection`](relsync_core::Connection), [`MemoryStore`](crate::MemoryStore)
//! interprets them directly.

use relsync_core::{
    Connection, Cx, Dialect, Error, IsolationLevel, Outcome, Row, TransactionOps, Value,
};
use relsync_query::{Delete, InsertMany, Select, Update};
use std::future::Future;

/// Storage the engine reconciles relations against.
pub trait RelationStore: Send + Sync {
    /// Unit of work returned by [`RelationStore::begin`].
    type Tx<'store>: StoreTransaction
    where
        Self: 'store;

    /// Run a read outside any transaction.
    fn select(
        &self,
        cx: &Cx,
        select: &Select,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Begin a unit of work.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send;
}

/// Reads and writes inside one unit of work.
///
/// Must be finished with [`commit`](StoreTransaction::commit) or
/// [`rollback`](StoreTransaction::rollback).
pub trait StoreTransaction: Send + Sync {
    /// Read rows.
    fn select(
        &self,
        cx: &Cx,
        select: &Select,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Insert every row of the batch; returns rows affected.
    fn insert(
        &self,
        cx: &Cx,
        insert: &InsertMany,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Update matching rows; returns rows affected.
    fn update(&self, cx: &Cx, update: &Update)
    -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Delete matching rows; returns rows affected.
    fn delete(&self, cx: &Cx, delete: &Delete)
    -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Make all changes permanent.
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Discard all changes.
    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// Commit on success; otherwise roll back and return the original failure.
///
/// A failed rollback is logged and does not replace the failure that caused it.
pub(crate) async fn commit_or_rollback<Tx, T>(
    cx: &Cx,
    tx: Tx,
    outcome: Outcome<T, Error>,
) -> Outcome<T, Error>
where
    Tx: StoreTransaction,
{
    match outcome {
        Outcome::Ok(value) => match tx.commit(cx).await {
            Outcome::Ok(()) => Outcome::Ok(value),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        },
        failure => {
            match tx.rollback(cx).await {
                Outcome::Ok(()) => tracing::debug!("Rolled back relation transaction"),
                Outcome::Err(e) => {
                    tracing::error!(error = %e, "Rollback failed after relation write failure");
                }
                Outcome::Cancelled(_) => {
                    tracing::error!("Rollback cancelled after relation write failure");
                }
                Outcome::Panicked(_) => {
                    tracing::error!("Rollback panicked after relation write failure");
                }
            }
            failure
        }
    }
}

// ============================================================================
// SQL adapter
// ============================================================================

/// A [`RelationStore`] over any [`Connection`], rendering commands in the
/// connection's dialect.
#[derive(Debug)]
pub struct SqlStore<C> {
    conn: C,
    isolation: IsolationLevel,
}

impl<C: Connection> SqlStore<C> {
    /// Wrap a connection. Transactions use `READ COMMITTED`.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            isolation: IsolationLevel::default(),
        }
    }

    /// Use a different isolation level for relation transactions.
    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// The wrapped connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Unwrap the connection.
    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C: Connection> RelationStore for SqlStore<C> {
    type Tx<'store>
        = SqlTransaction<C::Tx<'store>>
    where
        Self: 'store;

    fn select(
        &self,
        cx: &Cx,
        select: &Select,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let (sql, params) = select.build_with_dialect(self.conn.dialect());
        async move {
            tracing::debug!(sql = %sql, "Reading relation keys");
            self.conn.query(cx, &sql, &params).await
        }
    }

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        async move {
            tracing::trace!(isolation = self.isolation.as_sql(), "BEGIN relation transaction");
            match self.conn.begin_with(cx, self.isolation).await {
                Outcome::Ok(tx) => Outcome::Ok(SqlTransaction {
                    tx,
                    dialect: self.conn.dialect(),
                }),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}

/// Transaction handle of a [`SqlStore`].
#[derive(Debug)]
pub struct SqlTransaction<T> {
    tx: T,
    dialect: Dialect,
}

impl<T: TransactionOps> SqlTransaction<T> {
    async fn execute(&self, cx: &Cx, sql: String, params: Vec<Value>) -> Outcome<u64, Error> {
        tracing::debug!(sql = %sql, params = params.len(), "Executing relation statement");
        self.tx.execute(cx, &sql, &params).await
    }
}

impl<T: TransactionOps> StoreTransaction for SqlTransaction<T> {
    fn select(
        &self,
        cx: &Cx,
        select: &Select,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let (sql, params) = select.build_with_dialect(self.dialect);
        async move {
            tracing::debug!(sql = %sql, "Loading current relation rows");
            self.tx.query(cx, &sql, &params).await
        }
    }

    fn insert(
        &self,
        cx: &Cx,
        insert: &InsertMany,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        async move {
            if insert.is_empty() {
                return Outcome::Ok(0);
            }
            if let Err(e) = insert.validate() {
                return Outcome::Err(e);
            }
            let (sql, params) = insert.build_with_dialect(self.dialect);
            self.execute(cx, sql, params).await
        }
    }

    fn update(
        &self,
        cx: &Cx,
        update: &Update,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let (sql, params) = update.build_with_dialect(self.dialect);
        self.execute(cx, sql, params)
    }

    fn delete(
        &self,
        cx: &Cx,
        delete: &Delete,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let (sql, params) = delete.build_with_dialect(self.dialect);
        self.execute(cx, sql, params)
    }

    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        tracing::trace!("COMMIT relation transaction");
        self.tx.commit(cx)
    }

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        tracing::trace!("ROLLBACK relation transaction");
        self.tx.rollback(cx)
    }
}
