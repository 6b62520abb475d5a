//! Newline-delimited JSON feed ingestion.
//!
//! One record per line:
//!
//! ```json
//! {"change":{"citing":"..","content":"..","content_type":"doi","status":"new","timestamp":".."},"metadata":{..}}
//! ```
//!
//! `metadata` is optional and carries the resolver's view of the target
//! (`raw`, `parsed`, `status`). Blank lines are skipped. A line that is not
//! JSON, or does not decode, is logged and counted; it never stops the feed.

use citecap_core::{
  citation::CitationChange,
  reconcile::{Ignored, Outcome},
  store::CaptureStore,
  target::TargetMetadata,
};
use serde::{Deserialize, Serialize};
use tokio::{
  io::{AsyncBufRead, AsyncBufReadExt as _},
  task::JoinSet,
};
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  pipeline::{Emission, Pipeline, Processed},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRecord {
  pub change:   CitationChange,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<TargetMetadata>,
}

/// Tally of one feed run.
///
/// `not_emitted` counts records whose relationship event was due but did not
/// reach the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
  pub records:     u64,
  pub applied:     u64,
  pub duplicate:   u64,
  pub stale:       u64,
  pub missing:     u64,
  pub emitted:     u64,
  pub not_emitted: u64,
  pub malformed:   u64,
  pub failed:      u64,
}

impl Summary {
  fn tally(&mut self, result: Result<Processed>) {
    let processed = match result {
      Ok(p) => p,
      Err(Error::Malformed(_)) => {
        self.malformed += 1;
        return;
      }
      Err(_) => {
        self.failed += 1;
        return;
      }
    };
    match processed.outcome {
      Outcome::Applied(_) => self.applied += 1,
      Outcome::Ignored(Ignored::Duplicate) => self.duplicate += 1,
      Outcome::Ignored(Ignored::Stale) => self.stale += 1,
      Outcome::Ignored(Ignored::Missing) => self.missing += 1,
    }
    match processed.emission {
      Emission::Delivered => self.emitted += 1,
      Emission::Disabled | Emission::Unmappable | Emission::Failed => self.not_emitted += 1,
      Emission::NotReportable | Emission::Suppressed => {}
    }
  }
}

/// Feed every line of `reader` through `pipeline`, keeping at most
/// `concurrency` records in flight.
///
/// Records in flight together may complete in any order; the store's
/// timestamp gating keeps the final state independent of that order. Only a
/// failure to read the input is returned as an error.
pub async fn ingest<R, S>(reader: R, pipeline: &Pipeline<S>, concurrency: usize) -> Result<Summary>
where
  R: AsyncBufRead + Unpin,
  S: CaptureStore + 'static,
{
  let concurrency = concurrency.max(1);
  let mut summary = Summary::default();
  let mut in_flight = JoinSet::new();
  let mut lines = reader.lines();
  let mut line_no = 0u64;

  while let Some(line) = lines.next_line().await? {
    line_no += 1;
    if line.trim().is_empty() {
      continue;
    }
    summary.records += 1;

    let payload = match serde_json::from_str::<serde_json::Value>(&line) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(line = line_no, error = %e, "skipping feed line that is not JSON");
        summary.malformed += 1;
        continue;
      }
    };

    if in_flight.len() >= concurrency
      && let Some(joined) = in_flight.join_next().await
    {
      settle(&mut summary, joined);
    }

    let pipeline = pipeline.clone();
    in_flight.spawn(async move {
      let result = pipeline.process(payload).await;
      if let Err(e) = &result {
        warn!(line = line_no, error = %e, "feed record not processed");
      }
      result
    });
  }

  while let Some(joined) = in_flight.join_next().await {
    settle(&mut summary, joined);
  }

  info!(
    records = summary.records,
    applied = summary.applied,
    duplicate = summary.duplicate,
    stale = summary.stale,
    missing = summary.missing,
    emitted = summary.emitted,
    not_emitted = summary.not_emitted,
    malformed = summary.malformed,
    failed = summary.failed,
    "feed complete"
  );
  Ok(summary)
}

fn settle(
  summary: &mut Summary,
  joined: std::result::Result<Result<Processed>, tokio::task::JoinError>,
) {
  match joined {
    Ok(result) => summary.tally(result),
    Err(e) => {
      error!(error = %e, "feed record task failed");
      summary.failed += 1;
    }
  }
}
