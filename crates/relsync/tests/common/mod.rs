#![allow(dead_code)]

use asupersync::Outcome;
use asupersync::runtime::{Runtime, RuntimeBuilder};
use relsync::prelude::*;
use relsync::{Filter, RelationLink};

pub fn runtime() -> Runtime {
    RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime")
}

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

/// `book` with `authors` (via `book_has_author`), `reviews` (by
/// `review.book_id`) and `cover` (a singular relation).
#[derive(Debug, Clone)]
pub struct Book {
    pub id: Option<i64>,
    pub year: i64,
}

impl Book {
    pub fn new(id: i64) -> Self {
        Self {
            id: Some(id),
            year: 2001,
        }
    }
}

impl PrimaryRecord for Book {
    fn table_name(&self) -> &str {
        "book"
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![Value::from(self.id)]
    }

    fn relation(&self, name: &str) -> Option<RelationShape> {
        match name {
            "authors" => Some(RelationShape::many_to_many(
                "authors",
                "author",
                "id",
                LinkTableInfo::new("book_has_author", "book_id", "author_id"),
            )),
            "reviews" => Some(RelationShape::one_to_many("reviews", "review", "id", "book_id")),
            "cover" => Some(RelationShape {
                name: "cover".into(),
                related_table: "image".into(),
                related_primary_key: vec!["id".into()],
                multiple: false,
                link: RelationLink::ForeignKey {
                    column: "book_id".into(),
                },
            }),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "year" => Some(Value::BigInt(self.year)),
            _ => None,
        }
    }
}

/// A record keyed by `(order_id, line_no)`.
pub struct OrderLine;

impl PrimaryRecord for OrderLine {
    fn table_name(&self) -> &str {
        "order_line"
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![Value::BigInt(1), Value::BigInt(2)]
    }

    fn relation(&self, _name: &str) -> Option<RelationShape> {
        Some(RelationShape::many_to_many(
            "tags",
            "tag",
            "id",
            LinkTableInfo::new("order_line_tag", "order_line_id", "tag_id"),
        ))
    }
}

pub fn link(store: &MemoryStore, book: i64, author: i64) {
    store.insert_row(
        "book_has_author",
        [
            ("book_id", Value::BigInt(book)),
            ("author_id", Value::BigInt(author)),
        ],
    );
}

pub fn review(store: &MemoryStore, id: i64, book: Option<i64>) {
    store.insert_row(
        "review",
        [("id", Value::BigInt(id)), ("book_id", Value::from(book))],
    );
}

/// Authors linked to a book, sorted.
pub fn linked_authors(store: &MemoryStore, book: i64) -> Vec<i64> {
    let mut ids: Vec<i64> = store
        .column_values(
            "book_has_author",
            "author_id",
            &Filter::new().eq("book_id", book),
        )
        .iter()
        .filter_map(Value::as_canonical_i64)
        .collect();
    ids.sort_unstable();
    ids
}

/// Reviews whose `book_id` equals `value`, sorted.
pub fn reviews_with(store: &MemoryStore, value: Value) -> Vec<i64> {
    let mut ids: Vec<i64> = store
        .column_values("review", "id", &Filter::new().eq("book_id", value))
        .iter()
        .filter_map(Value::as_canonical_i64)
        .collect();
    ids.sort_unstable();
    ids
}
