//! Read-only JSON API over a citation capture store.
//!
//! Exposes an axum [`Router`] backed by any [`citecap_core::store::CaptureStore`].
//! Writes only ever happen through the reconciliation engine, so nothing here
//! mutates the store. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", citecap_api::api_router(store.clone()))
//! ```

pub mod citations;
pub mod error;
pub mod stats;
pub mod targets;

use std::sync::Arc;

use axum::{Router, routing::get};
use citecap_core::store::CaptureStore;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build the API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: CaptureStore + 'static,
{
  Router::new()
    // Citation targets
    .route("/targets", get(targets::list::<S>))
    .route(
      "/targets/lookup",
      get(targets::lookup::<S>).post(targets::lookup_many::<S>),
    )
    .route("/targets/entry-date", get(targets::entry_date::<S>))
    .route("/targets/by-bibcode/{bibcode}", get(targets::by_bibcode::<S>))
    // Citations
    .route("/citations", get(citations::list::<S>))
    .route("/citations/lookup", get(citations::lookup::<S>))
    .route("/citations/by-bibcode/{bibcode}", get(citations::by_bibcode::<S>))
    // Bookkeeping
    .route("/stats", get(stats::counts::<S>))
    .route("/events", get(stats::recent_events::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(store)
}
