//! Junction-table reconciliation.
//!
//! The current links are read inside the relation's transaction, diffed
//! against the desired keys, and written back with at most one batch
//! insert, one update per refreshed row, and one delete.

use crate::config::ColumnContext;
use crate::descriptor::{ManyToManyDescriptor, SyncTarget};
use crate::keys::{KeySet, RelatedKey};
use crate::store::{RelationStore, StoreTransaction, commit_or_rollback};
use relsync_core::{Cx, Error, Outcome, Result, Row, Value};
use relsync_query::{Delete, Filter, InsertMany, Update};
use std::collections::HashMap;

/// Rows written by one many-to-many reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManyToManySync {
    /// Junction rows inserted.
    pub inserted: u64,
    /// Junction rows whose extra columns were refreshed.
    pub updated: u64,
    /// Junction rows deleted.
    pub deleted: u64,
}

/// Statements needed to move the current links to the desired ones.
#[derive(Debug, Default)]
pub struct ManyToManyPlan {
    /// Keys to link.
    pub added: KeySet,
    /// Keys to unlink.
    pub removed: KeySet,
    /// Keys linked before and after.
    pub untouched: KeySet,
    /// Batch insert for `added`.
    pub insert: Option<InsertMany>,
    /// Extra-column refreshes for `untouched` rows that changed.
    pub updates: Vec<Update>,
    /// Delete for `removed`.
    pub delete: Option<Delete>,
}

impl ManyToManyPlan {
    /// Whether the plan writes nothing.
    pub fn is_noop(&self) -> bool {
        self.insert.is_none() && self.updates.is_empty() && self.delete.is_none()
    }
}

fn extra_values(
    target: SyncTarget<'_>,
    descriptor: &ManyToManyDescriptor,
    related_key: &Value,
    is_new_record: bool,
) -> Result<Vec<Value>> {
    descriptor
        .extra_columns
        .iter()
        .map(|(column, provider)| {
            provider.resolve(&ColumnContext {
                owner: target.owner,
                relation_name: target.relation_name,
                attribute_name: target.attribute_name,
                column: column.as_str(),
                related_key,
                is_new_record,
            })
        })
        .collect()
}

/// Diff current junction rows against the desired keys.
///
/// `current_rows` must carry the related column and every extra column.
/// An empty `desired` set unlinks everything.
#[allow(clippy::result_large_err)]
pub fn plan_many_to_many(
    target: SyncTarget<'_>,
    descriptor: &ManyToManyDescriptor,
    current_rows: &[Row],
    desired: &KeySet,
) -> Result<ManyToManyPlan> {
    let mut current = KeySet::new();
    let mut stored: HashMap<RelatedKey, &Row> = HashMap::with_capacity(current_rows.len());
    for row in current_rows {
        let key = RelatedKey::new(row.get_named(&descriptor.related_column)?.clone())?;
        stored.entry(key.clone()).or_insert(row);
        current.insert(key);
    }

    let mut plan = ManyToManyPlan::default();
    if desired.is_empty() {
        plan.removed = current;
    } else {
        plan.removed = current.difference(desired);
        plan.added = desired.difference(&current);
        plan.untouched = current.intersection(desired);
    }

    if !plan.added.is_empty() {
        let columns = [
            descriptor.junction_column.clone(),
            descriptor.related_column.clone(),
        ]
        .into_iter()
        .chain(descriptor.extra_columns.iter().map(|(c, _)| c.clone()));
        let mut insert = InsertMany::into_table(descriptor.junction_table.clone(), columns);
        for key in plan.added.iter() {
            let mut row = vec![target.owner_key.clone(), key.value().clone()];
            row.extend(extra_values(target, descriptor, key.value(), true)?);
            insert.push_row(row);
        }
        plan.insert = Some(insert);
    }

    if !descriptor.extra_columns.is_empty() {
        for key in plan.untouched.iter() {
            let computed = extra_values(target, descriptor, key.value(), false)?;
            let Some(row) = stored.get(key) else {
                continue;
            };
            let changed = descriptor
                .extra_columns
                .iter()
                .zip(&computed)
                .any(|((column, _), value)| {
                    !row.get_by_name(column)
                        .unwrap_or(&Value::Null)
                        .loosely_equals(value)
                });
            if !changed {
                continue;
            }

            let update = descriptor
                .extra_columns
                .iter()
                .zip(computed)
                .fold(
                    Update::table(descriptor.junction_table.clone()),
                    |update, ((column, _), value)| update.set(column.clone(), value),
                )
                .filter(link_filter(descriptor, target.owner_key, key.value().clone()));
            plan.updates.push(update);
        }
    }

    if !plan.removed.is_empty() {
        let filter = Filter::new()
            .eq(descriptor.junction_column.clone(), target.owner_key.clone())
            .any_of(descriptor.related_column.clone(), plan.removed.to_values())
            .and(delete_scope(descriptor));
        plan.delete = Some(Delete::from(descriptor.junction_table.clone()).filter(filter));
    }

    Ok(plan)
}

fn delete_scope(descriptor: &ManyToManyDescriptor) -> Filter {
    descriptor
        .delete_scope
        .iter()
        .fold(Filter::new(), |filter, (column, value)| {
            filter.condition(column.clone(), value)
        })
}

fn link_filter(descriptor: &ManyToManyDescriptor, owner_key: &Value, related_key: Value) -> Filter {
    Filter::new()
        .eq(descriptor.junction_column.clone(), owner_key.clone())
        .eq(descriptor.related_column.clone(), related_key)
        .and(delete_scope(descriptor))
}

/// Reconcile junction rows in one transaction.
///
/// Any failure rolls the transaction back and is returned unchanged.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(attribute = target.attribute_name, table = %descriptor.junction_table)
)]
pub async fn sync_many_to_many<S: RelationStore>(
    cx: &Cx,
    store: &S,
    target: SyncTarget<'_>,
    descriptor: &ManyToManyDescriptor,
    desired: &KeySet,
) -> Outcome<ManyToManySync, Error> {
    let tx = match store.begin(cx).await {
        Outcome::Ok(tx) => tx,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let outcome = reconcile(cx, &tx, target, descriptor, desired).await;
    commit_or_rollback(cx, tx, outcome).await
}

async fn reconcile<Tx: StoreTransaction>(
    cx: &Cx,
    tx: &Tx,
    target: SyncTarget<'_>,
    descriptor: &ManyToManyDescriptor,
    desired: &KeySet,
) -> Outcome<ManyToManySync, Error> {
    let rows = match tx
        .select(cx, &descriptor.current_rows(target.owner_key))
        .await
    {
        Outcome::Ok(rows) => rows,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let plan = match plan_many_to_many(target, descriptor, &rows, desired) {
        Ok(plan) => plan,
        Err(e) => return Outcome::Err(e),
    };

    tracing::debug!(
        current = rows.len(),
        added = plan.added.len(),
        removed = plan.removed.len(),
        untouched = plan.untouched.len(),
        refreshed = plan.updates.len(),
        "Computed junction delta"
    );

    let mut sync = ManyToManySync::default();

    if let Some(insert) = &plan.insert {
        match tx.insert(cx, insert).await {
            Outcome::Ok(n) => sync.inserted = n,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    for update in &plan.updates {
        match tx.update(cx, update).await {
            Outcome::Ok(n) => sync.updated += n,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    if let Some(delete) = &plan.delete {
        match tx.delete(cx, delete).await {
            Outcome::Ok(n) => sync.deleted = n,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    Outcome::Ok(sync)
}
