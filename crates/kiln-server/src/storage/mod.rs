//! Storage layer
//!
//! Uses SQLite (embedded) as the transactional version store.

pub mod db;

pub use db::{CommitReceipt, Database, EntryChange, UpsertEntry};
