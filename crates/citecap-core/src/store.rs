//! The `CaptureStore` trait and the outcomes of its guarded writes.
//!
//! The trait is implemented by storage backends (e.g. `citecap-store-sqlite`).
//! The reconciliation engine and the read API depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  citation::{Citation, CitationChange, LifecycleStatus},
  event::Event,
  target::{
    CitationTarget, NewCitationTarget, ParsedMetadata, RawMetadata, TargetMetadata,
    TargetSummary,
  },
};

/// Result of an insert guarded by a unique key.
///
/// A duplicate is what at-least-once delivery looks like, so it is reported
/// as a value rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum InsertOutcome {
  Inserted,
  AlreadyExists,
}

/// Result of [`CaptureStore::create_citation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CitationInsert {
  /// The citation was stored with `status`. `reactivated` counts sibling
  /// citations flipped to `REGISTERED` because the target was registered for
  /// the first time in the same write.
  Inserted {
    status:      LifecycleStatus,
    reactivated: u64,
  },
  /// The `(citing, content)` pair is taken. Nothing was written.
  AlreadyExists,
}

/// Result of a timestamp-gated citation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum GatedUpdate {
  /// The incoming timestamp was strictly newer; the row was written.
  Applied {
    previous:    LifecycleStatus,
    current:     LifecycleStatus,
    reactivated: u64,
  },
  /// The incoming timestamp was equal or older; nothing changed.
  Stale { current: LifecycleStatus },
  /// No row exists for the `(citing, content)` pair.
  Missing,
}

/// Result of a target metadata write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
  /// Whether anything differed from the stored row.
  pub changed:     bool,
  /// Citations flipped from `DISCARDED` to `REGISTERED` because the target
  /// became registered for the first time.
  pub reactivated: u64,
}

/// Abstraction over a citation capture backend.
///
/// Every read-compare-write method (`create_citation`, `update_citation`,
/// `mark_citation_deleted`, `update_target_metadata`, `reactivate_discarded`)
/// must hold an exclusive lock on the rows it compares for the whole
/// operation, so that concurrent deliveries serialise and the newest
/// timestamp wins regardless of arrival order.
///
/// A target becomes registered for the first time at most once. That moment
/// is when its discarded citations are reactivated, in the same write that
/// registers it. Later promotions after a demotion reactivate nothing.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait CaptureStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new target. Returns [`InsertOutcome::AlreadyExists`] if the
  /// content identifier is taken.
  fn insert_target(
    &self,
    target: NewCitationTarget,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Replace a target's metadata, and its status when `status` is given.
  ///
  /// Writes only when something actually differs. Byte-encoded raw metadata
  /// is decoded to text where possible. A missing target reports no change.
  fn update_target_metadata<'a>(
    &'a self,
    content: &'a str,
    raw: RawMetadata,
    parsed: ParsedMetadata,
    status: Option<LifecycleStatus>,
  ) -> impl Future<Output = Result<MetadataUpdate, Self::Error>> + Send + 'a;

  /// Full record for a content identifier, if any.
  fn lookup_by_identifier<'a>(
    &'a self,
    content: &'a str,
  ) -> impl Future<Output = Result<Option<CitationTarget>, Self::Error>> + Send + 'a;

  /// Summaries for a set of content identifiers.
  ///
  /// `status` filters as described on
  /// [`listing_admits`](crate::target::listing_admits).
  fn lookup_by_identifiers<'a>(
    &'a self,
    contents: &'a [String],
    status: Option<LifecycleStatus>,
  ) -> impl Future<Output = Result<Vec<TargetSummary>, Self::Error>> + Send + 'a;

  /// The target whose parsed metadata carries `bibcode`.
  fn lookup_by_bibcode<'a>(
    &'a self,
    bibcode: &'a str,
    status: Option<LifecycleStatus>,
  ) -> impl Future<Output = Result<Option<TargetSummary>, Self::Error>> + Send + 'a;

  /// All targets, filtered as described on
  /// [`listing_admits`](crate::target::listing_admits).
  fn lookup_all(
    &self,
    status: Option<LifecycleStatus>,
  ) -> impl Future<Output = Result<Vec<TargetSummary>, Self::Error>> + Send + '_;

  /// Creation timestamp of a target. `None` if not found.
  fn entry_date<'a>(
    &'a self,
    content: &'a str,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + 'a;

  fn citation_target_count(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Persist the citation described by a `NEW` change, in one write with
  /// its target.
  ///
  /// A missing target is created from `metadata`, or as unresolved. An
  /// existing target has `metadata` applied as by `update_target_metadata`.
  /// The citation is then stored `REGISTERED` if the target is registered and
  /// `DISCARDED` otherwise. If the pair is taken nothing is written, the
  /// target included.
  fn create_citation<'a>(
    &'a self,
    change: &'a CitationChange,
    metadata: Option<TargetMetadata>,
  ) -> impl Future<Output = Result<CitationInsert, Self::Error>> + Send + 'a;

  fn citation_exists<'a>(
    &'a self,
    citing: &'a str,
    content: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn get_citation<'a>(
    &'a self,
    citing: &'a str,
    content: &'a str,
  ) -> impl Future<Output = Result<Option<Citation>, Self::Error>> + Send + 'a;

  /// Apply `cited`, `resolved` and `timestamp` from `change` if its timestamp
  /// is strictly newer than the stored one, together with `metadata` on the
  /// target. A stale or missing citation leaves the target untouched.
  ///
  /// A registered citation stays registered. Any other citation becomes
  /// `REGISTERED` if the target is registered after the metadata write and
  /// `DISCARDED` otherwise.
  fn update_citation<'a>(
    &'a self,
    change: &'a CitationChange,
    metadata: Option<TargetMetadata>,
  ) -> impl Future<Output = Result<GatedUpdate, Self::Error>> + Send + 'a;

  /// Set status to `DELETED` if `change`'s timestamp is strictly newer than
  /// the stored one. The previous status is reported either way.
  fn mark_citation_deleted<'a>(
    &'a self,
    change: &'a CitationChange,
  ) -> impl Future<Output = Result<GatedUpdate, Self::Error>> + Send + 'a;

  /// Flip every `DISCARDED` citation of `content` to `REGISTERED`. Returns the
  /// number of rows changed.
  fn reactivate_discarded<'a>(
    &'a self,
    content: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Citing bibcodes of `content` whose citation has `status`.
  fn list_citing_bibcodes<'a>(
    &'a self,
    content: &'a str,
    status: LifecycleStatus,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  /// Registered citing bibcodes of the registered target carrying `bibcode`.
  /// Empty if no such target exists.
  fn list_citing_bibcodes_by_target<'a>(
    &'a self,
    bibcode: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  fn citation_count(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Append a raw payload to the audit log.
  fn record_event(
    &self,
    data: serde_json::Value,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// The `limit` most recently received events, newest first.
  fn recent_events(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  fn event_count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
