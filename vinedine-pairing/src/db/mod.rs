//! Database access for the pairing service
//!
//! The pool itself is opened by `vinedine_common::db::init_database`; this
//! module owns the `recipes` table.

pub mod recipes;

pub use recipes::{RecordStore, StorageError};
