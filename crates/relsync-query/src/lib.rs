//! Structured commands for relsync.
//!
//! `relsync-query` is the **statement construction layer**. The engine
//! describes every read and write it needs as a [`Select`], [`InsertMany`],
//! [`Update`] or [`Delete`] scoped by a [`Filter`]; executors either render
//! them to parameterized SQL for a `Dialect` or interpret them directly.

pub mod builder;
pub mod filter;

pub use builder::{CommandKind, Delete, InsertMany, Select, Update};
pub use filter::{Filter, Term};
