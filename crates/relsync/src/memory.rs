//! An in-memory [`RelationStore`].
//!
//! Tables are lists of rows keyed by column name. A transaction works on a
//! snapshot of all tables taken at `begin`; commit publishes the snapshot,
//! rollback drops it. Every write is recorded in a statement log, and
//! writes can be made to fail per statement kind and table.

use crate::store::{RelationStore, StoreTransaction};
use relsync_core::{Cx, Error, Outcome, QueryError, QueryErrorKind, Row, Value};
use relsync_query::{CommandKind, Delete, Filter, InsertMany, Select, Update};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

type MemoryRow = BTreeMap<String, Value>;
type Tables = BTreeMap<String, Vec<MemoryRow>>;

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRecord {
    /// Statement class.
    pub kind: CommandKind,
    /// Target table.
    pub table: String,
    /// Rows affected.
    pub affected: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    log: Vec<StatementRecord>,
    failures: Vec<(CommandKind, String)>,
    commits: usize,
    rollbacks: usize,
}

/// Tables held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a committed row directly, bypassing the log.
    pub fn insert_row<I, S>(&self, table: &str, row: I)
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let row: MemoryRow = row.into_iter().map(|(c, v)| (c.into(), v)).collect();
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Committed rows of a table, columns in name order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| rows.iter().map(to_row).collect())
            .unwrap_or_default()
    }

    /// Committed values of one column for rows matching the filter.
    pub fn column_values(&self, table: &str, column: &str, filter: &Filter) -> Vec<Value> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(|c: &str| row.get(c)))
                    .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every write executed so far, committed or not.
    pub fn statements(&self) -> Vec<StatementRecord> {
        self.lock().log.clone()
    }

    /// Number of logged writes of a kind.
    pub fn count(&self, kind: CommandKind) -> usize {
        self.lock().log.iter().filter(|r| r.kind == kind).count()
    }

    /// Forget the statement log.
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Make every `kind` statement against `table` fail until cleared.
    pub fn fail_on(&self, kind: CommandKind, table: impl Into<String>) {
        self.lock().failures.push((kind, table.into()));
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Committed transactions.
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    /// Rolled back transactions.
    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }
}

fn to_row(row: &MemoryRow) -> Row {
    let (names, values): (Vec<String>, Vec<Value>) =
        row.iter().map(|(c, v)| (c.clone(), v.clone())).unzip();
    Row::new(names, values)
}

fn select_rows(tables: &Tables, select: &Select) -> Vec<Row> {
    let Some(rows) = tables.get(select.table()) else {
        return Vec::new();
    };
    let filter = select.where_filter();
    rows.iter()
        .filter(|row| filter.matches(|c: &str| row.get(c)))
        .map(|row| {
            if select.selected_columns().is_empty() {
                to_row(row)
            } else {
                let names = select.selected_columns().to_vec();
                let values = names
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect();
                Row::new(names, values)
            }
        })
        .collect()
}

/// Transaction over a [`MemoryStore`] snapshot.
#[derive(Debug)]
pub struct MemoryTransaction<'store> {
    store: &'store MemoryStore,
    working: Mutex<Tables>,
}

impl MemoryTransaction<'_> {
    fn working(&self) -> MutexGuard<'_, Tables> {
        self.working.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::result_large_err)]
    fn write(
        &self,
        kind: CommandKind,
        table: &str,
        apply: impl FnOnce(&mut Vec<MemoryRow>) -> u64,
    ) -> Result<u64, Error> {
        let mut state = self.store.lock();
        if state
            .failures
            .iter()
            .any(|(k, t)| *k == kind && t == table)
        {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                sql: None,
                message: format!("injected {} failure on {table:?}", kind.as_sql()),
                source: None,
            }));
        }

        let affected = apply(self.working().entry(table.to_string()).or_default());
        state.log.push(StatementRecord {
            kind,
            table: table.to_string(),
            affected,
        });
        tracing::trace!(kind = kind.as_sql(), table = table, affected, "Memory write");
        Ok(affected)
    }
}

impl RelationStore for MemoryStore {
    type Tx<'store>
        = MemoryTransaction<'store>
    where
        Self: 'store;

    fn select(
        &self,
        _cx: &Cx,
        select: &Select,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let rows = select_rows(&self.lock().tables, select);
        async move { Outcome::Ok(rows) }
    }

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let snapshot = self.lock().tables.clone();
        async move {
            Outcome::Ok(MemoryTransaction {
                store: self,
                working: Mutex::new(snapshot),
            })
        }
    }
}

fn into_outcome<T>(result: Result<T, Error>) -> Outcome<T, Error> {
    match result {
        Ok(value) => Outcome::Ok(value),
        Err(e) => Outcome::Err(e),
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn select(
        &self,
        _cx: &Cx,
        select: &Select,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let rows = select_rows(&self.working(), select);
        async move { Outcome::Ok(rows) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        insert: &InsertMany,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = insert.validate().and_then(|()| {
            if insert.is_empty() {
                return Ok(0);
            }
            self.write(CommandKind::Insert, insert.table(), |rows| {
                for values in insert.rows() {
                    rows.push(
                        insert
                            .columns()
                            .iter()
                            .cloned()
                            .zip(values.iter().cloned())
                            .collect(),
                    );
                }
                insert.rows().len() as u64
            })
        });
        async move { into_outcome(result) }
    }

    fn update(
        &self,
        _cx: &Cx,
        update: &Update,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.write(CommandKind::Update, update.table_name(), |rows| {
            let filter = update.where_filter();
            let mut affected = 0;
            for row in rows
                .iter_mut()
                .filter(|row| filter.matches(|c: &str| row.get(c)))
            {
                for (column, value) in update.assignments() {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
            affected
        });
        async move { into_outcome(result) }
    }

    fn delete(
        &self,
        _cx: &Cx,
        delete: &Delete,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.write(CommandKind::Delete, delete.table(), |rows| {
            let filter = delete.where_filter();
            let before = rows.len();
            rows.retain(|row| !filter.matches(|c: &str| row.get(c)));
            (before - rows.len()) as u64
        });
        async move { into_outcome(result) }
    }

    fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let tables = self.working.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.store.lock();
        state.tables = tables;
        state.commits += 1;
        drop(state);
        async { Outcome::Ok(()) }
    }

    fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.store.lock().rollbacks += 1;
        async { Outcome::Ok(()) }
    }
}
