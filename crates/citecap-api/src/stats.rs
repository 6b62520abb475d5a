//! Bookkeeping endpoints: row counts and the raw event log.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use citecap_core::{event::Event, store::CaptureStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const DEFAULT_EVENT_LIMIT: usize = 20;
const MAX_EVENT_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
pub struct Counts {
  pub citation_targets: u64,
  pub citations:        u64,
  pub events:           u64,
}

/// `GET /stats`
pub async fn counts<S>(State(store): State<Arc<S>>) -> Result<Json<Counts>, ApiError>
where
  S: CaptureStore,
{
  Ok(Json(Counts {
    citation_targets: store.citation_target_count().await.map_err(ApiError::store)?,
    citations:        store.citation_count().await.map_err(ApiError::store)?,
    events:           store.event_count().await.map_err(ApiError::store)?,
  }))
}

#[derive(Debug, Deserialize)]
pub struct EventParams {
  pub limit: Option<usize>,
}

/// `GET /events[?limit=<n>]`. Newest first; `limit` is capped at 500.
pub async fn recent_events<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<EventParams>,
) -> Result<Json<Vec<Event>>, ApiError>
where
  S: CaptureStore,
{
  let limit = params
    .limit
    .unwrap_or(DEFAULT_EVENT_LIMIT)
    .min(MAX_EVENT_LIMIT);
  let events = store.recent_events(limit).await.map_err(ApiError::store)?;
  Ok(Json(events))
}
