//! Citations and the change records that drive them.
//!
//! A citation is the relationship between a citing bibcode and a cited
//! content identifier. Only the latest accepted state per `(citing, content)`
//! pair is kept; change records describe how that state moves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder the upstream feed uses for a cited bibcode it does not know.
pub const UNKNOWN_BIBCODE: &str = "...................";

/// How the cited artifact is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
  Doi,
  /// A persistent identifier; only `ascl:`-prefixed ids are understood.
  Pid,
  Url,
}

/// Lifecycle status shared by citations and citation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleStatus {
  /// Resolved and visible.
  Registered,
  /// Rejected or not yet resolved.
  Discarded,
  /// Withdrawn. Rows are never physically removed.
  Deleted,
}

impl LifecycleStatus {
  /// The status a citation takes when its target has status `self`.
  ///
  /// Citations only become visible once their target is registered; until
  /// then they wait as discarded and are reactivated later.
  pub fn for_citation(self) -> Self {
    match self {
      Self::Registered => Self::Registered,
      Self::Discarded | Self::Deleted => Self::Discarded,
    }
  }

  /// The status an accepted update leaves a citation in, given the status of
  /// its target once the update's metadata has been applied. A registered
  /// citation is never demoted by an update.
  pub fn after_update(self, target: Self) -> Self {
    match self {
      Self::Registered => Self::Registered,
      Self::Discarded | Self::Deleted => target.for_citation(),
    }
  }
}

/// What a change record says happened to a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
  New,
  Updated,
  Deleted,
}

/// An inbound change record from the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationChange {
  pub citing:       String,
  /// Best-known cited bibcode; may be [`UNKNOWN_BIBCODE`].
  #[serde(default)]
  pub cited:        String,
  pub content:      String,
  pub content_type: ContentType,
  #[serde(default)]
  pub resolved:     bool,
  pub status:       ChangeStatus,
  /// Event time of the source of truth, not receipt time.
  pub timestamp:    DateTime<Utc>,
}

impl CitationChange {
  /// `false` when `cited` is empty or only the placeholder dots.
  pub fn has_known_cited(&self) -> bool {
    !self.cited.is_empty() && !self.cited.chars().all(|c| c == '.')
  }
}

/// The stored state of one `(citing, content)` relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
  pub citing:    String,
  pub content:   String,
  pub cited:     String,
  pub resolved:  bool,
  pub timestamp: DateTime<Utc>,
  pub status:    LifecycleStatus,
}
