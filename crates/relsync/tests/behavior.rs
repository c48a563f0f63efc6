//! Save ordering, failure handling and configuration through `RelationBehavior`.

mod common;

use asupersync::Cx;
use common::{
    Book, OrderLine, expect_err, link, linked_authors, review, reviews_with, runtime,
    unwrap_outcome,
};
use relsync::prelude::*;
use relsync::{
    ColumnContext, CommandKind, ConfigErrorKind, ProviderContext, RawRelationsConfig,
    TransformRegistry,
};

fn both_relations() -> RelationBehavior {
    RelationBehavior::new(
        RelationsConfig::new()
            .relation("author_ids", "authors")
            .relation("review_ids", "reviews"),
    )
    .unwrap()
}

#[test]
fn relations_are_saved_in_configuration_order() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        let book = Book::new(1);

        let mut relations = both_relations();
        relations.set("review_ids", vec![10_i64]).unwrap();
        relations.set("author_ids", vec![7_i64]).unwrap();
        let report = unwrap_outcome(relations.save_relations(&cx, &store, &book).await);

        let order: Vec<&str> = report.relations.iter().map(|r| r.attribute.as_str()).collect();
        assert_eq!(order, vec!["author_ids", "review_ids"]);
        assert_eq!(store.commits(), 2);
    });
}

#[test]
fn nothing_pending_means_no_transaction() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        let book = Book { id: None, year: 2001 };

        let mut relations = both_relations();
        let report = unwrap_outcome(relations.save_relations(&cx, &store, &book).await);
        assert!(report.is_empty());
        assert_eq!(store.commits(), 0);
    });
}

#[test]
fn failing_relation_rolls_back_and_keeps_its_pending_value() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        review(&store, 4, Some(1));
        review(&store, 5, None);
        let book = Book::new(1);

        let mut relations = both_relations();
        relations.set("author_ids", vec![7_i64, 8]).unwrap();
        relations.set("review_ids", vec![5_i64]).unwrap();

        store.fail_on(CommandKind::Update, "review");
        let err = expect_err(relations.save_relations(&cx, &store, &book).await);
        assert!(matches!(err, Error::Query(_)));

        // The earlier relation stays committed, the failing one left nothing behind.
        assert_eq!(linked_authors(&store, 1), vec![7, 8]);
        assert_eq!(reviews_with(&store, Value::BigInt(1)), vec![4]);
        assert_eq!(store.commits(), 1);
        assert_eq!(store.rollbacks(), 1);
        assert!(!relations.is_dirty("author_ids"));
        assert!(relations.is_dirty("review_ids"));

        store.clear_failures();
        let report = unwrap_outcome(relations.save_relations(&cx, &store, &book).await);
        assert_eq!(report.relations.len(), 1);
        assert!(report.get("review_ids").is_some());
        assert_eq!(reviews_with(&store, Value::BigInt(1)), vec![5]);
    });
}

#[test]
fn failed_delete_undoes_the_insert_of_the_same_relation() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        link(&store, 1, 7);
        let book = Book::new(1);

        let mut relations = both_relations();
        relations.set("author_ids", vec![8_i64]).unwrap();
        store.fail_on(CommandKind::Delete, "book_has_author");

        expect_err(relations.save_relations(&cx, &store, &book).await);
        assert_eq!(linked_authors(&store, 1), vec![7]);
        assert_eq!(store.rollbacks(), 1);
        assert_eq!(store.commits(), 0);
    });
}

#[test]
fn composite_primary_key_is_rejected_before_any_statement() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();

        let mut relations =
            RelationBehavior::new(RelationsConfig::new().relation("tag_ids", "tags")).unwrap();
        relations.set("tag_ids", vec![1_i64]).unwrap();

        let err = expect_err(relations.save_relations(&cx, &store, &OrderLine).await);
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::CompositePrimaryKey));
        assert!(store.statements().is_empty());
        assert_eq!(store.commits() + store.rollbacks(), 0);
        assert!(relations.is_dirty("tag_ids"));
    });
}

#[test]
fn unsaved_owner_with_pending_values_is_rejected() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        let book = Book { id: None, year: 2001 };

        let mut relations = both_relations();
        relations.set("author_ids", vec![1_i64]).unwrap();
        let err = expect_err(relations.save_relations(&cx, &store, &book).await);
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingPrimaryKey));
        assert!(store.statements().is_empty());
    });
}

#[test]
fn undeclared_and_singular_relations_are_rejected_on_save() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        let book = Book::new(1);

        let mut relations =
            RelationBehavior::new(RelationsConfig::new().relation("publisher_ids", "publishers"))
                .unwrap();
        relations.set("publisher_ids", vec![1_i64]).unwrap();
        let err = expect_err(relations.save_relations(&cx, &store, &book).await);
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownRelation));

        let mut relations =
            RelationBehavior::new(RelationsConfig::new().relation("cover_id", "cover")).unwrap();
        relations.set("cover_id", 3_i64).unwrap();
        let err = expect_err(relations.save_relations(&cx, &store, &book).await);
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnsupportedRelation));
        assert!(err.to_string().contains("relationship type not supported"));
        assert!(store.statements().is_empty());
    });
}

#[test]
fn transforms_from_json_config_round_trip() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        let book = Book::new(1);

        let raw = RawRelationsConfig::from_json_str(
            r#"{
                "author_ids": {
                    "relation": "authors",
                    "fields": {
                        "list": { "get": "implode", "set": "explode" },
                        "json": { "get": "json_encode", "set": "json_decode" }
                    }
                },
                "review_ids": "reviews"
            }"#,
        )
        .unwrap();
        let config = raw.resolve(&TransformRegistry::with_builtins()).unwrap();
        let mut relations = RelationBehavior::new(config).unwrap();

        relations.set("author_ids_json", "[1,2]").unwrap();
        let encoded = unwrap_outcome(relations.get(&cx, &store, &book, "author_ids_json").await);
        assert_eq!(encoded, Value::from("[1,2]"));

        relations.set("author_ids_list", "7,8").unwrap();
        unwrap_outcome(relations.save_relations(&cx, &store, &book).await);
        assert_eq!(linked_authors(&store, 1), vec![7, 8]);

        let listed = unwrap_outcome(relations.get(&cx, &store, &book, "author_ids_list").await);
        assert_eq!(listed, Value::from("7,8"));
    });
}

#[test]
fn unknown_transform_name_is_not_callable() {
    let raw = RawRelationsConfig::from_json_str(
        r#"{ "author_ids": { "relation": "authors", "get": "str_rot13" } }"#,
    )
    .unwrap();
    let err = raw.resolve(&TransformRegistry::with_builtins()).unwrap_err();
    assert_eq!(err.config_kind(), Some(ConfigErrorKind::NotCallable));
}

#[test]
fn colliding_derived_fields_are_rejected() {
    let raw = RawRelationsConfig::from_json_str(
        r#"{
            "author": { "relation": "authors", "fields": { "ids": {} } },
            "author_ids": "reviews"
        }"#,
    )
    .unwrap();
    let config = raw.resolve(&TransformRegistry::with_builtins()).unwrap();
    let err = RelationBehavior::new(config).unwrap_err();
    assert_eq!(err.config_kind(), Some(ConfigErrorKind::AmbiguousField));
}

#[test]
fn unknown_attribute_is_rejected_on_get() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        let relations = both_relations();
        let err = expect_err(relations.get(&cx, &store, &Book::new(1), "editor_ids").await);
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownAttribute));
    });
}

#[test]
fn failing_set_transform_leaves_nothing_pending() {
    let mut relations = RelationBehavior::new(RelationsConfig::new().relation(
        "author_ids",
        RelationConfig::new("authors")
            .set(|_: Value| Err(Error::transform("author_ids", "not a key list"))),
    ))
    .unwrap();

    let err = relations.set("author_ids", "7,8").unwrap_err();
    assert_eq!(err.to_string(), "Transform error on 'author_ids': not a key list");
    assert!(!relations.is_dirty("author_ids"));
}

#[test]
fn failing_get_transform_is_returned_from_get() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        link(&store, 1, 7);

        let relations = RelationBehavior::new(RelationsConfig::new().relation(
            "author_ids",
            RelationConfig::new("authors")
                .get(|_: Value| Err(Error::transform("author_ids", "cannot encode"))),
        ))
        .unwrap();

        let err = expect_err(relations.get(&cx, &store, &Book::new(1), "author_ids").await);
        assert!(matches!(err, Error::Transform(ref e) if e.message == "cannot encode"));
    });
}

#[test]
fn failing_default_provider_opens_no_transaction() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        review(&store, 4, Some(1));
        let book = Book::new(1);

        let mut relations = RelationBehavior::new(RelationsConfig::new().relation(
            "review_ids",
            RelationConfig::new("reviews").default_value(DefaultValue::computed(
                |ctx: &ProviderContext<'_>| Err(Error::transform(ctx.attribute_name, "no default")),
            )),
        ))
        .unwrap();
        relations.set("review_ids", vec![5_i64]).unwrap();

        let err = expect_err(relations.save_relations(&cx, &store, &book).await);
        assert!(matches!(err, Error::Transform(ref e) if e.attribute == "review_ids"));
        assert_eq!(store.commits(), 0);
        assert_eq!(store.rollbacks(), 0);
        assert!(store.statements().is_empty());
        assert_eq!(reviews_with(&store, Value::BigInt(1)), vec![4]);
        assert!(relations.is_dirty("review_ids"));
    });
}

#[test]
fn failing_extra_column_provider_rolls_back_the_relation() {
    let rt = runtime();
    rt.block_on(async {
        let cx = Cx::for_testing();
        let store = MemoryStore::new();
        link(&store, 1, 7);
        let book = Book::new(1);

        let mut relations = RelationBehavior::new(RelationsConfig::new().relation(
            "author_ids",
            RelationConfig::new("authors").via_table_value(
                "position",
                ColumnValue::computed(|ctx: &ColumnContext<'_>| {
                    if ctx.is_new_record {
                        Err(Error::transform(ctx.attribute_name, "no position"))
                    } else {
                        Ok(Value::Null)
                    }
                }),
            ),
        ))
        .unwrap();
        relations.set("author_ids", vec![7_i64, 8]).unwrap();

        let err = expect_err(relations.save_relations(&cx, &store, &book).await);
        assert!(matches!(err, Error::Transform(ref e) if e.message == "no position"));
        assert_eq!(linked_authors(&store, 1), vec![7]);
        assert_eq!(store.commits(), 0);
        assert_eq!(store.rollbacks(), 1);
        assert!(relations.is_dirty("author_ids"));
    });
}
