//! relsync - transactional synchronization of relation keys.
//!
//! relsync exposes a model's many-to-many and one-to-many relations as plain
//! key-list attributes. Assign the keys you want, save the model, and relsync
//! reconciles what is stored:
//!
//! - **Many-to-many**: junction rows are diffed against the desired keys;
//!   only missing links are inserted, only stale links are deleted, and extra
//!   junction columns are refreshed only when their computed value changes.
//! - **One-to-many**: rows pointing at the owner are detached (foreign key set
//!   to a configurable default) and the desired rows are attached.
//!
//! Every relation is reconciled in its own transaction.
//!
//! # Quick Start
//!
//! ```ignore
//! use relsync::prelude::*;
//!
//! async fn save_book(cx: &Cx, store: &impl RelationStore, book: &Book) -> Outcome<SaveReport, Error> {
//!     let mut relations = RelationBehavior::new(
//!         RelationsConfig::new()
//!             .relation("author_ids", RelationConfig::new("authors").via_table_value("position", Value::BigInt(0)))
//!             .relation("review_ids", RelationConfig::new("reviews").default_value(Value::Null)),
//!     )?;
//!
//!     relations.set("author_ids", vec![7_i64, 8, 9])?;
//!     relations.set("review_ids", vec![2_i64, 4])?;
//!     relations.save_relations(cx, store, book).await
//! }
//! ```
//!
//! Storage is reached through [`RelationStore`]: [`SqlStore`] adapts any
//! [`Connection`], [`MemoryStore`] keeps tables in memory.

pub mod behavior;
pub mod config;
pub mod descriptor;
pub mod keys;
pub mod many_to_many;
pub mod memory;
pub mod one_to_many;
pub mod pending;
pub mod shape;
pub mod store;

pub use behavior::{RelationBehavior, RelationSync, SaveReport, SyncCounts};
pub use config::{
    ColumnContext, ColumnValue, DefaultValue, FieldConfig, ProviderContext, RawRelationsConfig,
    RelationConfig, RelationsConfig, Transform, TransformRegistry,
};
pub use descriptor::{
    DescriptorLayout, ManyToManyDescriptor, OneToManyDescriptor, RelationDescriptor, RelationKind,
    SyncTarget,
};
pub use keys::{KeySet, RelatedKey};
pub use many_to_many::{ManyToManyPlan, ManyToManySync, plan_many_to_many, sync_many_to_many};
pub use memory::{MemoryStore, MemoryTransaction, StatementRecord};
pub use one_to_many::{OneToManyPlan, OneToManySync, plan_one_to_many, sync_one_to_many};
pub use pending::{PendingValues, keys_from_value};
pub use shape::{LinkTableInfo, PrimaryRecord, RelationLink, RelationShape};
pub use store::{RelationStore, SqlStore, SqlTransaction, StoreTransaction};

pub use relsync_core::{
    ConfigErrorKind, Connection, Cx, Dialect, Error, IsolationLevel, Outcome, Result, Row,
    TransactionOps, Value,
};
pub use relsync_query::{CommandKind, Filter};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ColumnValue, Cx, DefaultValue, Error, FieldConfig, LinkTableInfo, MemoryStore, Outcome,
        PrimaryRecord, RelationBehavior, RelationConfig, RelationShape, RelationStore,
        RelationsConfig, Result, SaveReport, SqlStore, Value,
    };
}
