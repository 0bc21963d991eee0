//! Core types and trait definitions for the farmstat ingestion pipeline.
//!
//! This crate is deliberately free of parsing and database dependencies.
//! The codec, store, and batch-runner crates all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod domain;
pub mod error;
pub mod record;
pub mod store;
pub mod vpd;

pub use error::{Error, Result};
