//! Handlers for `/targets` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/targets` | Optional `?status=REGISTERED\|DISCARDED\|DELETED` |
//! | `GET`  | `/targets/lookup` | `?content=<identifier>`; 404 if not found |
//! | `POST` | `/targets/lookup` | Body: `{"contents":[..],"status":"REGISTERED"}` |
//! | `GET`  | `/targets/entry-date` | `?content=<identifier>`; 404 if not found |
//! | `GET`  | `/targets/by-bibcode/{bibcode}` | Optional `?status=`; 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use citecap_core::{
  citation::LifecycleStatus,
  store::CaptureStore,
  target::{CitationTarget, TargetSummary},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct StatusParams {
  pub status: Option<LifecycleStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ContentParams {
  pub content: String,
}

/// `GET /targets[?status=<status>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<StatusParams>,
) -> Result<Json<Vec<TargetSummary>>, ApiError>
where
  S: CaptureStore,
{
  let targets = store
    .lookup_all(params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(targets))
}

/// `GET /targets/lookup?content=<identifier>`
pub async fn lookup<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ContentParams>,
) -> Result<Json<CitationTarget>, ApiError>
where
  S: CaptureStore,
{
  let target = store
    .lookup_by_identifier(&params.content)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("citation target {} not found", params.content)))?;
  Ok(Json(target))
}

#[derive(Debug, Deserialize)]
pub struct LookupManyBody {
  pub contents: Vec<String>,
  #[serde(default)]
  pub status:   Option<LifecycleStatus>,
}

/// `POST /targets/lookup`
///
/// Unknown identifiers are skipped rather than reported.
pub async fn lookup_many<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<LookupManyBody>,
) -> Result<Json<Vec<TargetSummary>>, ApiError>
where
  S: CaptureStore,
{
  let targets = store
    .lookup_by_identifiers(&body.contents, body.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(targets))
}

#[derive(Debug, Serialize)]
pub struct EntryDate {
  pub content: String,
  pub created: DateTime<Utc>,
}

/// `GET /targets/entry-date?content=<identifier>`
pub async fn entry_date<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ContentParams>,
) -> Result<Json<EntryDate>, ApiError>
where
  S: CaptureStore,
{
  let created = store
    .entry_date(&params.content)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("citation target {} not found", params.content)))?;
  Ok(Json(EntryDate { content: params.content, created }))
}

/// `GET /targets/by-bibcode/{bibcode}[?status=<status>]`
pub async fn by_bibcode<S>(
  State(store): State<Arc<S>>,
  Path(bibcode): Path<String>,
  Query(params): Query<StatusParams>,
) -> Result<Json<TargetSummary>, ApiError>
where
  S: CaptureStore,
{
  let target = store
    .lookup_by_bibcode(&bibcode, params.status)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no citation target with bibcode {bibcode}")))?;
  Ok(Json(target))
}
