//! The reconciliation engine.
//!
//! Applies one change record at a time to a [`CaptureStore`]. The engine keeps
//! no state of its own. Each change maps to exactly one store write, and that
//! write makes every decision (existence, timestamp order, target status)
//! under a single exclusive lock, so a change is applied whole or not at all.
//!
//! Per `(citing, content)` pair:
//!
//! | from                  | change    | to                                      |
//! |-----------------------|-----------|-----------------------------------------|
//! | absent                | `new`     | target's status                         |
//! | `REGISTERED`          | `updated` | `REGISTERED`                            |
//! | `DISCARDED`/`DELETED` | `updated` | target's status                         |
//! | any                   | `deleted` | `DELETED`                               |
//!
//! "Target's status" means `REGISTERED` when the target is registered and
//! `DISCARDED` otherwise, after the change's metadata has been applied. The
//! first time a target becomes registered, every discarded citation of that
//! target is reactivated.
//!
//! Duplicates, stale timestamps and changes for unknown citations are
//! reported as [`Outcome::Ignored`], never as errors.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
  citation::{ChangeStatus, CitationChange, LifecycleStatus},
  store::{CaptureStore, CitationInsert, GatedUpdate},
  target::TargetMetadata,
};

/// Why a change record left the store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
  /// A `new` change for a citation that already exists.
  Duplicate,
  /// The stored timestamp is equal to or newer than the change's.
  Stale,
  /// An `updated` or `deleted` change for a citation never created.
  Missing,
}

/// An accepted change to a citation's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
  /// `None` when the citation was created by this change.
  pub previous:    Option<LifecycleStatus>,
  pub current:     LifecycleStatus,
  /// Discarded citations of the same target promoted along the way.
  pub reactivated: u64,
}

impl Transition {
  /// Whether the external registry should hear about this transition.
  ///
  /// Discarded citations were never announced, so neither their creation nor
  /// their deletion is reported.
  pub fn is_significant(&self) -> bool {
    match self.current {
      LifecycleStatus::Registered => true,
      LifecycleStatus::Deleted => {
        self.previous == Some(LifecycleStatus::Registered)
      }
      LifecycleStatus::Discarded => false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Applied(Transition),
  Ignored(Ignored),
}

impl Outcome {
  pub fn is_applied(&self) -> bool { matches!(self, Self::Applied(_)) }

  pub fn is_significant(&self) -> bool {
    matches!(self, Self::Applied(t) if t.is_significant())
  }
}

/// Applies change records to a store.
///
/// Cloning is cheap; the store is shared.
pub struct Reconciler<S> {
  store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store) }
  }
}

impl<S: CaptureStore> Reconciler<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Apply `change`.
  ///
  /// `metadata` is the resolver's view of the target, if it produced one.
  /// Only store failures are returned as errors; the caller is expected to
  /// rely on redelivery for those.
  pub async fn apply(
    &self,
    change: &CitationChange,
    metadata: Option<TargetMetadata>,
  ) -> Result<Outcome, S::Error> {
    let outcome = match change.status {
      ChangeStatus::New => self.create(change, metadata).await?,
      ChangeStatus::Updated => self.update(change, metadata).await?,
      ChangeStatus::Deleted => self.delete(change).await?,
    };
    debug!(
      citing = %change.citing,
      content = %change.content,
      timestamp = %change.timestamp,
      ?outcome,
      "reconciled change"
    );
    Ok(outcome)
  }

  async fn create(
    &self,
    change: &CitationChange,
    metadata: Option<TargetMetadata>,
  ) -> Result<Outcome, S::Error> {
    match self.store.create_citation(change, metadata).await? {
      CitationInsert::Inserted { status, reactivated } => {
        log_reactivation(change, reactivated);
        Ok(Outcome::Applied(Transition {
          previous: None,
          current: status,
          reactivated,
        }))
      }
      CitationInsert::AlreadyExists => {
        info!(
          citing = %change.citing,
          content = %change.content,
          timestamp = %change.timestamp,
          "ignoring new citation: already stored"
        );
        Ok(Outcome::Ignored(Ignored::Duplicate))
      }
    }
  }

  async fn update(
    &self,
    change: &CitationChange,
    metadata: Option<TargetMetadata>,
  ) -> Result<Outcome, S::Error> {
    Ok(match self.store.update_citation(change, metadata).await? {
      GatedUpdate::Applied {
        previous,
        current,
        reactivated,
      } => {
        log_reactivation(change, reactivated);
        Outcome::Applied(Transition {
          previous: Some(previous),
          current,
          reactivated,
        })
      }
      GatedUpdate::Stale { .. } => Outcome::Ignored(Ignored::Stale),
      GatedUpdate::Missing => {
        info!(
          citing = %change.citing,
          content = %change.content,
          timestamp = %change.timestamp,
          "ignoring citation update: citation does not exist"
        );
        Outcome::Ignored(Ignored::Missing)
      }
    })
  }

  async fn delete(&self, change: &CitationChange) -> Result<Outcome, S::Error> {
    Ok(match self.store.mark_citation_deleted(change).await? {
      GatedUpdate::Applied { previous, current, .. } => {
        if previous == LifecycleStatus::Deleted {
          warn!(
            citing = %change.citing,
            content = %change.content,
            timestamp = %change.timestamp,
            "citation deleted twice"
          );
        }
        Outcome::Applied(Transition {
          previous: Some(previous),
          current,
          reactivated: 0,
        })
      }
      GatedUpdate::Stale { .. } => Outcome::Ignored(Ignored::Stale),
      GatedUpdate::Missing => {
        info!(
          citing = %change.citing,
          content = %change.content,
          timestamp = %change.timestamp,
          "ignoring citation deletion: citation does not exist"
        );
        Outcome::Ignored(Ignored::Missing)
      }
    })
  }
}

fn log_reactivation(change: &CitationChange, reactivated: u64) {
  if reactivated > 0 {
    info!(
      content = %change.content,
      reactivated,
      "citation target registered; reactivated discarded citations"
    );
  }
}
