//! Foreign-key reconciliation for one-to-many relations.
//!
//! Detach then attach: every row pointing at the owner is reset to the
//! configured default, then the desired rows are pointed at the owner.

use crate::config::ProviderContext;
use crate::descriptor::{OneToManyDescriptor, SyncTarget};
use crate::keys::KeySet;
use crate::store::{RelationStore, StoreTransaction, commit_or_rollback};
use relsync_core::{Cx, Error, Outcome, Result};
use relsync_query::{Filter, Update};

/// Rows written by one one-to-many reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneToManySync {
    /// Rows reset to the default value.
    pub detached: u64,
    /// Rows pointed at the owner.
    pub attached: u64,
}

/// The two statements of a one-to-many reconciliation.
#[derive(Debug)]
pub struct OneToManyPlan {
    /// Always issued.
    pub detach: Update,
    /// Issued only for a non-empty desired set.
    pub attach: Option<Update>,
}

/// Build the detach and attach statements.
#[allow(clippy::result_large_err)]
pub fn plan_one_to_many(
    target: SyncTarget<'_>,
    descriptor: &OneToManyDescriptor,
    desired: &KeySet,
) -> Result<OneToManyPlan> {
    let default = descriptor.default_value.resolve(&ProviderContext {
        owner: target.owner,
        relation_name: target.relation_name,
        attribute_name: target.attribute_name,
    })?;

    let detach = Update::table(descriptor.foreign_table.clone())
        .set(descriptor.foreign_key_column.clone(), default)
        .filter(Filter::new().eq(descriptor.foreign_key_column.clone(), target.owner_key.clone()));

    let attach = (!desired.is_empty()).then(|| {
        Update::table(descriptor.foreign_table.clone())
            .set(descriptor.foreign_key_column.clone(), target.owner_key.clone())
            .filter(Filter::new().any_of(
                descriptor.foreign_primary_key_column.clone(),
                desired.to_values(),
            ))
    });

    Ok(OneToManyPlan { detach, attach })
}

/// Rewrite foreign keys in one transaction.
///
/// Any failure rolls the transaction back and is returned unchanged.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(attribute = target.attribute_name, table = %descriptor.foreign_table)
)]
pub async fn sync_one_to_many<S: RelationStore>(
    cx: &Cx,
    store: &S,
    target: SyncTarget<'_>,
    descriptor: &OneToManyDescriptor,
    desired: &KeySet,
) -> Outcome<OneToManySync, Error> {
    let plan = match plan_one_to_many(target, descriptor, desired) {
        Ok(plan) => plan,
        Err(e) => return Outcome::Err(e),
    };

    let tx = match store.begin(cx).await {
        Outcome::Ok(tx) => tx,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let outcome = apply(cx, &tx, &plan).await;
    commit_or_rollback(cx, tx, outcome).await
}

async fn apply<Tx: StoreTransaction>(
    cx: &Cx,
    tx: &Tx,
    plan: &OneToManyPlan,
) -> Outcome<OneToManySync, Error> {
    let mut sync = OneToManySync::default();

    match tx.update(cx, &plan.detach).await {
        Outcome::Ok(n) => sync.detached = n,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }

    if let Some(attach) = &plan.attach {
        match tx.update(cx, attach).await {
            Outcome::Ok(n) => sync.attached = n,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    tracing::debug!(
        detached = sync.detached,
        attached = sync.attached,
        "Rewrote foreign keys"
    );
    Outcome::Ok(sync)
}
