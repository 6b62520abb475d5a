//! The citation capture worker.
//!
//! Wires the pieces together: every inbound feed record is appended to the
//! audit log, reconciled against the store, and, when the resulting
//! transition is one the registry should hear about, mapped to a
//! relationship event and posted to the webhook.
//!
//! The `citecap` binary in this crate drives the [`feed`] reader from a file
//! or stdin and can serve the read API from `citecap-api`.

pub mod config;
pub mod error;
pub mod feed;
pub mod pipeline;

pub use crate::config::WorkerConfig;
pub use error::{Error, Result};
pub use feed::{FeedRecord, Summary, ingest};
pub use pipeline::{Emission, Pipeline, Processed};
