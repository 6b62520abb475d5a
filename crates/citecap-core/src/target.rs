//! Citation targets: the cited artifacts, independent of who cites them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::citation::{ContentType, LifecycleStatus};

/// Metadata as fetched from the external registry, before parsing.
///
/// Registries sometimes hand back bytes. They are kept as text whenever they
/// decode as UTF-8, and as bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMetadata {
  Text(String),
  Bytes(Vec<u8>),
}

impl Default for RawMetadata {
  fn default() -> Self { Self::Text(String::new()) }
}

impl RawMetadata {
  /// Decode byte payloads to text when they are valid UTF-8.
  pub fn decoded(self) -> Self {
    match self {
      Self::Bytes(bytes) => match String::from_utf8(bytes) {
        Ok(text) => Self::Text(text),
        Err(e) => Self::Bytes(e.into_bytes()),
      },
      text => text,
    }
  }
}

/// Parsed metadata. Only the bibcodes are interpreted; everything else the
/// resolver produced is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMetadata {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bibcode:           Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub alternate_bibcode: Vec<String>,
  #[serde(flatten)]
  pub extra:             serde_json::Map<String, serde_json::Value>,
}

/// The output of the metadata resolver for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetadata {
  #[serde(default)]
  pub raw:    RawMetadata,
  #[serde(default)]
  pub parsed: ParsedMetadata,
  pub status: LifecycleStatus,
}

impl TargetMetadata {
  /// Metadata for a target nobody has resolved yet.
  pub fn unresolved() -> Self {
    Self {
      raw:    RawMetadata::default(),
      parsed: ParsedMetadata::default(),
      status: LifecycleStatus::Discarded,
    }
  }
}

/// Input to [`CaptureStore::insert_target`](crate::store::CaptureStore::insert_target).
/// The `created` timestamp is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewCitationTarget {
  pub content:      String,
  pub content_type: ContentType,
  pub metadata:     TargetMetadata,
}

/// A persisted citation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationTarget {
  pub content:               String,
  pub content_type:          ContentType,
  pub raw_cited_metadata:    RawMetadata,
  pub parsed_cited_metadata: ParsedMetadata,
  pub status:                LifecycleStatus,
  /// Entry date.
  pub created:               DateTime<Utc>,
}

impl CitationTarget {
  pub fn bibcode(&self) -> Option<&str> {
    self.parsed_cited_metadata.bibcode.as_deref()
  }

  pub fn summary(&self) -> TargetSummary {
    TargetSummary {
      bibcode:           self.parsed_cited_metadata.bibcode.clone(),
      alternate_bibcode: self.parsed_cited_metadata.alternate_bibcode.clone(),
      content:           self.content.clone(),
      content_type:      self.content_type,
    }
  }
}

/// The key data of a target, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
  pub bibcode:           Option<String>,
  pub alternate_bibcode: Vec<String>,
  pub content:           String,
  pub content_type:      ContentType,
}

// ─── Listing filter ──────────────────────────────────────────────────────────

/// Whether a listing filtered on `status` may include `target`.
///
/// Targets without a resolved bibcode are hidden from every listing except
/// the one asking for discarded targets, which exist precisely because their
/// metadata is incomplete.
pub fn listing_admits(
  status: Option<LifecycleStatus>,
  target: &CitationTarget,
) -> bool {
  if status.is_some_and(|s| s != target.status) {
    return false;
  }
  status == Some(LifecycleStatus::Discarded) || target.bibcode().is_some()
}

/// Apply [`listing_admits`] and reduce to summaries.
pub fn summarize<'a>(
  status: Option<LifecycleStatus>,
  targets: impl IntoIterator<Item = &'a CitationTarget>,
) -> Vec<TargetSummary> {
  targets
    .into_iter()
    .filter(|t| listing_admits(status, t))
    .map(CitationTarget::summary)
    .collect()
}
