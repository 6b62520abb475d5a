//! SQLite backend for citation capture.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Timestamp-gated writes run inside
//! `BEGIN IMMEDIATE` transactions, which take the database write lock before
//! the stored timestamp is read.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
