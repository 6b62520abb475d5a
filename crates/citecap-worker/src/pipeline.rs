//! Per-record processing: audit, reconcile, map, emit.

use std::sync::Arc;

use chrono::Utc;
use citecap_core::{
  citation::CitationChange,
  reconcile::{Outcome, Reconciler},
  relationship::{MapperPolicy, map_change},
  store::CaptureStore,
};
use citecap_webhook::WebhookClient;
use tracing::{debug, warn};

use crate::{Error, Result, feed::FeedRecord};

/// What happened on the outbound side for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
  /// The transition is not one the registry hears about.
  NotReportable,
  /// The mapper has no event for this change.
  Suppressed,
  /// The change could not be expressed as an event.
  Unmappable,
  /// An event was built but no webhook is configured.
  Disabled,
  Delivered,
  /// Delivery was attempted and not confirmed.
  Failed,
}

impl Emission {
  pub fn is_delivered(&self) -> bool { matches!(self, Self::Delivered) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Processed {
  pub outcome:  Outcome,
  pub emission: Emission,
}

/// Processes feed records against a store.
///
/// Cloning is cheap; clones share the store and the HTTP client.
pub struct Pipeline<S> {
  reconciler: Reconciler<S>,
  webhook:    Option<WebhookClient>,
  policy:     MapperPolicy,
}

impl<S> Clone for Pipeline<S> {
  fn clone(&self) -> Self {
    Self {
      reconciler: self.reconciler.clone(),
      webhook:    self.webhook.clone(),
      policy:     self.policy,
    }
  }
}

impl<S: CaptureStore> Pipeline<S> {
  pub fn new(store: Arc<S>, webhook: Option<WebhookClient>, policy: MapperPolicy) -> Self {
    Self {
      reconciler: Reconciler::new(store),
      webhook,
      policy,
    }
  }

  pub fn store(&self) -> &Arc<S> { self.reconciler.store() }

  /// Record `payload` in the audit log, then decode and handle it.
  ///
  /// Payloads that do not decode are still logged before
  /// [`Error::Malformed`] is returned.
  pub async fn process(&self, payload: serde_json::Value) -> Result<Processed> {
    self
      .store()
      .record_event(payload.clone())
      .await
      .map_err(Error::store)?;
    let record: FeedRecord = serde_json::from_value(payload)?;
    self.handle(record).await
  }

  /// Reconcile one record and emit the resulting relationship event, if any.
  ///
  /// Only store failures are errors. A webhook failure leaves the committed
  /// store state in place and is reported as [`Emission::Failed`].
  pub async fn handle(&self, record: FeedRecord) -> Result<Processed> {
    let FeedRecord { change, metadata } = record;

    let outcome = self
      .reconciler
      .apply(&change, metadata)
      .await
      .map_err(Error::store)?;

    let emission = if outcome.is_significant() {
      self.emit(&change).await
    } else {
      Emission::NotReportable
    };

    Ok(Processed { outcome, emission })
  }

  async fn emit(&self, change: &CitationChange) -> Emission {
    let today = Utc::now().date_naive();
    let event = match map_change(change, today, self.policy) {
      Ok(Some(event)) => event,
      Ok(None) => return Emission::Suppressed,
      Err(e) => {
        warn!(
          citing = %change.citing,
          content = %change.content,
          timestamp = %change.timestamp,
          error = %e,
          "accepted change has no valid relationship event"
        );
        return Emission::Unmappable;
      }
    };

    let Some(webhook) = &self.webhook else {
      debug!(
        citing = %change.citing,
        content = %change.content,
        kind = ?event.kind,
        "webhook disabled, relationship event not sent"
      );
      return Emission::Disabled;
    };

    match webhook.emit(&event.relationship).await {
      Ok(()) => Emission::Delivered,
      Err(e) => {
        warn!(
          citing = %change.citing,
          content = %change.content,
          timestamp = %change.timestamp,
          error = %e,
          "relationship event not emitted"
        );
        Emission::Failed
      }
    }
  }
}
