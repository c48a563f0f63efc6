//! Foreign-key synchronization through `RelationBehavior` and `MemoryStore`.

mod common;

use asupersync::Cx;
use common::{Book, review, reviews_with, runtime, unwrap_outcome};
use relsync::prelude::*;
use relsync::{CommandKind, OneToManySync, ProviderContext, SyncCounts};

fn seed(store: &MemoryStore) {
    review(store, 1, Some(3));
    review(store, 2, None);
    review(store, 3, Some(3));
    review(store, 4, Some(9));
    review(store, 5, Some(9));
}

fn o2m_counts(report: &SaveReport) -> OneToManySync {
    match report.get("review_ids").map(|r| r.counts) {
        Some(SyncCounts::OneToMany(counts)) => counts,
        other => panic!("expected one-to-many counts, got {other:?}"),
    }
}

#[test]
fn detached_rows_get_null_by_default() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        seed(&store);
        let book = Book::new(3);

        let mut relations =
            RelationBehavior::new(RelationsConfig::new().relation("review_ids", "reviews")).unwrap();
        relations.set("review_ids", vec![2_i64, 4]).unwrap();
        let report = unwrap_outcome(relations.save_relations(&cx, &store, &book).await);

        assert_eq!(
            o2m_counts(&report),
            OneToManySync {
                detached: 2,
                attached: 2
            }
        );
        assert_eq!(reviews_with(&store, Value::BigInt(3)), vec![2, 4]);
        assert_eq!(reviews_with(&store, Value::Null), vec![1, 3]);
        assert_eq!(reviews_with(&store, Value::BigInt(9)), vec![5]);
        assert_eq!(store.count(CommandKind::Update), 2);
        assert_eq!(store.commits(), 1);
    });
}

#[test]
fn detached_rows_get_a_constant_default() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        seed(&store);
        let book = Book::new(3);

        let mut relations = RelationBehavior::new(
            RelationsConfig::new().relation(
                "review_ids",
                RelationConfig::new("reviews").default_value(Value::BigInt(0)),
            ),
        )
        .unwrap();
        relations.set("review_ids", vec![2_i64, 4]).unwrap();
        unwrap_outcome(relations.save_relations(&cx, &store, &book).await);

        assert_eq!(reviews_with(&store, Value::BigInt(3)), vec![2, 4]);
        assert_eq!(reviews_with(&store, Value::BigInt(0)), vec![1, 3]);
    });
}

#[test]
fn detached_rows_get_a_computed_default() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        seed(&store);
        let book = Book { id: Some(3), year: 1999 };

        let mut relations = RelationBehavior::new(
            RelationsConfig::new().relation(
                "review_ids",
                RelationConfig::new("reviews").default_value(DefaultValue::computed(
                    |ctx: &ProviderContext<'_>| {
                        Ok(ctx.owner.attribute("year").unwrap_or(Value::Null))
                    },
                )),
            ),
        )
        .unwrap();
        relations.set("review_ids", vec![2_i64, 4]).unwrap();
        unwrap_outcome(relations.save_relations(&cx, &store, &book).await);

        assert_eq!(reviews_with(&store, Value::BigInt(3)), vec![2, 4]);
        assert_eq!(reviews_with(&store, Value::BigInt(1999)), vec![1, 3]);
    });
}

#[test]
fn empty_value_detaches_everything() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        seed(&store);
        let book = Book::new(9);

        let mut relations =
            RelationBehavior::new(RelationsConfig::new().relation("review_ids", "reviews")).unwrap();
        relations.set("review_ids", "").unwrap();
        let report = unwrap_outcome(relations.save_relations(&cx, &store, &book).await);

        assert_eq!(
            o2m_counts(&report),
            OneToManySync {
                detached: 2,
                attached: 0
            }
        );
        assert!(reviews_with(&store, Value::BigInt(9)).is_empty());
        assert_eq!(store.count(CommandKind::Update), 1);
    });
}

#[test]
fn read_through_lists_rows_pointing_at_the_owner() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        seed(&store);
        let book = Book::new(9);

        let relations =
            RelationBehavior::new(RelationsConfig::new().relation("review_ids", "reviews")).unwrap();
        let current = unwrap_outcome(relations.get(&cx, &store, &book, "review_ids").await);
        let mut ids: Vec<i64> = current
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![4, 5]);
        assert!(store.statements().is_empty());
    });
}
