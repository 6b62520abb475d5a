//! Handlers for `/citations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/citations` | `?content=<identifier>`, optional `&status=` (default `REGISTERED`) |
//! | `GET`  | `/citations/lookup` | `?citing=<bibcode>&content=<identifier>`; 404 if not found |
//! | `GET`  | `/citations/by-bibcode/{bibcode}` | Registered citations of a registered target |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use citecap_core::{
  citation::{Citation, LifecycleStatus},
  store::CaptureStore,
};
use serde::Deserialize;

use crate::error::ApiError;

fn default_status() -> LifecycleStatus { LifecycleStatus::Registered }

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub content: String,
  #[serde(default = "default_status")]
  pub status:  LifecycleStatus,
}

/// `GET /citations?content=<identifier>[&status=<status>]`
///
/// Returns the citing bibcodes.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: CaptureStore,
{
  let citing = store
    .list_citing_bibcodes(&params.content, params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(citing))
}

#[derive(Debug, Deserialize)]
pub struct PairParams {
  pub citing:  String,
  pub content: String,
}

/// `GET /citations/lookup?citing=<bibcode>&content=<identifier>`
pub async fn lookup<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<PairParams>,
) -> Result<Json<Citation>, ApiError>
where
  S: CaptureStore,
{
  let citation = store
    .get_citation(&params.citing, &params.content)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no citation of {} by {}",
        params.content, params.citing
      ))
    })?;
  Ok(Json(citation))
}

/// `GET /citations/by-bibcode/{bibcode}`
pub async fn by_bibcode<S>(
  State(store): State<Arc<S>>,
  Path(bibcode): Path<String>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: CaptureStore,
{
  let citing = store
    .list_citing_bibcodes_by_target(&bibcode)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(citing))
}
