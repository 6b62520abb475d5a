//! Core types and trait definitions for citation capture.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the domain model, the [`store::CaptureStore`] abstraction, the
//! reconciliation engine that applies change records to a store, and the pure
//! mapping from accepted changes to outbound relationship events.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod citation;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod relationship;
pub mod store;
pub mod target;

pub use error::{Error, Result};
