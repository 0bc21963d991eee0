//! SQLite backend for the farmstat ingestion store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every unit of work (one source file,
//! one refresh) runs inside a single `call` closure and a single SQLite
//! transaction.

mod derive;
mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
