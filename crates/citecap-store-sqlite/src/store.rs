//! [`SqliteStore`]: the SQLite implementation of [`CaptureStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use citecap_core::{
  citation::{Citation, CitationChange, ContentType, LifecycleStatus},
  event::Event,
  store::{CaptureStore, CitationInsert, GatedUpdate, InsertOutcome, MetadataUpdate},
  target::{
    CitationTarget, NewCitationTarget, ParsedMetadata, RawMetadata, TargetMetadata,
    TargetSummary, listing_admits, summarize,
  },
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, types::Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    CITATION_COLUMNS, RawCitation, RawEvent, RawTarget, TARGET_COLUMNS,
    encode_content_type, encode_dt, encode_event_time, encode_parsed, encode_raw,
    encode_status, encode_uuid, read_status,
  },
  schema::SCHEMA,
};

/// `true` for a violated PRIMARY KEY or UNIQUE constraint. Foreign key and
/// NOT NULL violations are real errors and are not matched.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

/// A `citation_targets` row, encoded and ready to insert.
struct TargetRow {
  content_type: &'static str,
  raw:          Value,
  parsed:       String,
  status:       LifecycleStatus,
}

impl TargetRow {
  fn encode(content_type: ContentType, metadata: TargetMetadata) -> Result<Self> {
    Ok(Self {
      content_type: encode_content_type(content_type),
      parsed:       encode_parsed(&metadata.parsed)?,
      raw:          encode_raw(metadata.raw),
      status:       metadata.status,
    })
  }
}

/// Metadata to compare with, and write over, a stored target.
struct MetadataRow {
  raw:    Value,
  parsed: String,
  /// `None` keeps the stored status.
  status: Option<LifecycleStatus>,
}

impl MetadataRow {
  fn encode(metadata: TargetMetadata) -> Result<Self> {
    Ok(Self {
      parsed: encode_parsed(&metadata.parsed)?,
      raw:    encode_raw(metadata.raw),
      status: Some(metadata.status),
    })
  }
}

// The functions below run inside a caller's `IMMEDIATE` transaction.

fn insert_target_row(
  conn: &Connection,
  content: &str,
  row: &TargetRow,
  now: &str,
) -> rusqlite::Result<InsertOutcome> {
  let registered_at = (row.status == LifecycleStatus::Registered).then_some(now);
  let inserted = conn.execute(
    "INSERT INTO citation_targets (
       content, content_type, raw_cited_metadata, parsed_cited_metadata,
       status, registered_at, created, updated
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
    rusqlite::params![
      content,
      row.content_type,
      row.raw,
      row.parsed,
      encode_status(row.status),
      registered_at,
      now,
    ],
  );
  match inserted {
    Ok(_) => Ok(InsertOutcome::Inserted),
    Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::AlreadyExists),
    Err(e) => Err(e),
  }
}

fn target_status(conn: &Connection, content: &str) -> rusqlite::Result<Option<LifecycleStatus>> {
  conn
    .query_row(
      "SELECT status FROM citation_targets WHERE content = ?1",
      rusqlite::params![content],
      |r| read_status(r, 0),
    )
    .optional()
}

/// Stored event time and status of a citation.
fn stored_citation(
  conn: &Connection,
  citing: &str,
  content: &str,
) -> rusqlite::Result<Option<(i64, LifecycleStatus)>> {
  conn
    .query_row(
      "SELECT timestamp, status FROM citations WHERE citing = ?1 AND content = ?2",
      rusqlite::params![citing, content],
      |r| Ok((r.get(0)?, read_status(r, 1)?)),
    )
    .optional()
}

/// Write `meta` over the target if anything differs. `None` if the target
/// does not exist.
///
/// `registered_at` is set the first time the status becomes `REGISTERED`, and
/// only then are the target's discarded citations reactivated.
fn write_metadata(
  conn: &Connection,
  content: &str,
  meta: &MetadataRow,
  now: &str,
) -> rusqlite::Result<Option<MetadataUpdate>> {
  let stored: Option<(Value, String, LifecycleStatus, bool)> = conn
    .query_row(
      "SELECT raw_cited_metadata, parsed_cited_metadata, status, registered_at IS NOT NULL
       FROM citation_targets WHERE content = ?1",
      rusqlite::params![content],
      |r| Ok((r.get(0)?, r.get(1)?, read_status(r, 2)?, r.get(3)?)),
    )
    .optional()?;

  let Some((raw, parsed, status, ever_registered)) = stored else {
    return Ok(None);
  };
  let next = meta.status.unwrap_or(status);
  if raw == meta.raw && parsed == meta.parsed && next == status {
    return Ok(Some(MetadataUpdate::default()));
  }

  let first_registration = next == LifecycleStatus::Registered && !ever_registered;
  conn.execute(
    "UPDATE citation_targets
     SET raw_cited_metadata = ?2,
         parsed_cited_metadata = ?3,
         status = ?4,
         updated = ?5,
         registered_at = CASE WHEN ?6 THEN ?5 ELSE registered_at END
     WHERE content = ?1",
    rusqlite::params![
      content,
      meta.raw,
      meta.parsed,
      encode_status(next),
      now,
      first_registration,
    ],
  )?;

  let reactivated = if first_registration {
    reactivate(conn, content, now)?
  } else {
    0
  };
  Ok(Some(MetadataUpdate { changed: true, reactivated }))
}

fn reactivate(conn: &Connection, content: &str, now: &str) -> rusqlite::Result<u64> {
  let n = conn.execute(
    "UPDATE citations SET status = ?2, updated = ?3
     WHERE content = ?1 AND status = ?4",
    rusqlite::params![
      content,
      encode_status(LifecycleStatus::Registered),
      now,
      encode_status(LifecycleStatus::Discarded),
    ],
  )?;
  Ok(n as u64)
}

/// A citation capture store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn count(&self, table: &'static str) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
          r.get(0)
        })?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }
}

impl CaptureStore for SqliteStore {
  type Error = crate::Error;

  async fn insert_target(&self, target: NewCitationTarget) -> Result<InsertOutcome> {
    let content = target.content.clone();
    let row     = TargetRow::encode(target.content_type, target.metadata)?;
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| Ok(insert_target_row(conn, &content, &row, &now_str)?))
      .await?;

    match outcome {
      InsertOutcome::Inserted => {
        info!(content = %target.content, "stored new citation target");
      }
      InsertOutcome::AlreadyExists => error!(
        content = %target.content,
        "ignoring new citation target: it already exists (another delivery may \
         have stored it first)"
      ),
    }
    Ok(outcome)
  }

  async fn update_target_metadata(
    &self,
    content: &str,
    raw: RawMetadata,
    parsed: ParsedMetadata,
    status: Option<LifecycleStatus>,
  ) -> Result<MetadataUpdate> {
    let content_str = content.to_owned();
    let now_str     = encode_dt(Utc::now());
    let meta = MetadataRow {
      raw: encode_raw(raw),
      parsed: encode_parsed(&parsed)?,
      status,
    };

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = write_metadata(&tx, &content_str, &meta, &now_str)?;
        tx.commit()?;
        Ok(updated)
      })
      .await?;

    match updated {
      Some(update) if update.changed => info!(
        content,
        alternate_bibcodes = %parsed.alternate_bibcode.join(", "),
        reactivated = update.reactivated,
        "updated metadata for citation target"
      ),
      Some(_) => {}
      None => warn!(content, "cannot update metadata: citation target not found"),
    }
    Ok(updated.unwrap_or_default())
  }

  async fn lookup_by_identifier(&self, content: &str) -> Result<Option<CitationTarget>> {
    let content = content.to_owned();

    let raw: Option<RawTarget> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {TARGET_COLUMNS} FROM citation_targets WHERE content = ?1"),
            rusqlite::params![content],
            RawTarget::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawTarget::into_target).transpose()
  }

  async fn lookup_by_identifiers(
    &self,
    contents: &[String],
    status: Option<LifecycleStatus>,
  ) -> Result<Vec<TargetSummary>> {
    let contents = contents.to_vec();

    let raws: Vec<RawTarget> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TARGET_COLUMNS} FROM citation_targets WHERE content = ?1"
        ))?;
        let mut rows = Vec::with_capacity(contents.len());
        for content in &contents {
          if let Some(row) = stmt
            .query_row(rusqlite::params![content], RawTarget::from_row)
            .optional()?
          {
            rows.push(row);
          }
        }
        Ok(rows)
      })
      .await?;

    let targets = raws
      .into_iter()
      .map(RawTarget::into_target)
      .collect::<Result<Vec<_>>>()?;
    Ok(summarize(status, &targets))
  }

  async fn lookup_by_bibcode(
    &self,
    bibcode: &str,
    status: Option<LifecycleStatus>,
  ) -> Result<Option<TargetSummary>> {
    let bibcode    = bibcode.to_owned();
    let status_str = status.map(encode_status).map(str::to_owned);

    let raw: Option<RawTarget> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {TARGET_COLUMNS} FROM citation_targets
               WHERE json_extract(parsed_cited_metadata, '$.bibcode') = ?1
                 AND (?2 IS NULL OR status = ?2)
               ORDER BY created
               LIMIT 1"
            ),
            rusqlite::params![bibcode, status_str],
            RawTarget::from_row,
          )
          .optional()?)
      })
      .await?;

    let target = raw.map(RawTarget::into_target).transpose()?;
    Ok(
      target
        .filter(|t| listing_admits(status, t))
        .map(|t| t.summary()),
    )
  }

  async fn lookup_all(&self, status: Option<LifecycleStatus>) -> Result<Vec<TargetSummary>> {
    let status_str = status.map(encode_status).map(str::to_owned);

    let raws: Vec<RawTarget> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TARGET_COLUMNS} FROM citation_targets
           WHERE (?1 IS NULL OR status = ?1)
           ORDER BY created, content"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status_str], RawTarget::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let targets = raws
      .into_iter()
      .map(RawTarget::into_target)
      .collect::<Result<Vec<_>>>()?;
    Ok(summarize(status, &targets))
  }

  async fn entry_date(&self, content: &str) -> Result<Option<DateTime<Utc>>> {
    Ok(self.lookup_by_identifier(content).await?.map(|t| t.created))
  }

  async fn citation_target_count(&self) -> Result<u64> {
    self.count("citation_targets").await
  }

  async fn create_citation(
    &self,
    change: &CitationChange,
    metadata: Option<TargetMetadata>,
  ) -> Result<CitationInsert> {
    let citing    = change.citing.clone();
    let content   = change.content.clone();
    let cited     = change.cited.clone();
    let resolved  = change.resolved;
    let timestamp = encode_event_time(change.timestamp);
    let now_str   = encode_dt(Utc::now());
    let initial   = TargetRow::encode(
      change.content_type,
      metadata.clone().unwrap_or_else(TargetMetadata::unresolved),
    )?;
    let refresh   = metadata.map(MetadataRow::encode).transpose()?;

    // The citation's status is decided from the target row under the same
    // write lock that inserts it.
    let (outcome, target_created) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if stored_citation(&tx, &citing, &content)?.is_some() {
          return Ok((CitationInsert::AlreadyExists, false));
        }

        let mut reactivated = 0;
        let (target, target_created) = match target_status(&tx, &content)? {
          None => {
            let created = insert_target_row(&tx, &content, &initial, &now_str)?;
            (initial.status, created == InsertOutcome::Inserted)
          }
          Some(current) => match &refresh {
            Some(meta) => {
              if let Some(update) = write_metadata(&tx, &content, meta, &now_str)? {
                reactivated = update.reactivated;
              }
              (meta.status.unwrap_or(current), false)
            }
            None => (current, false),
          },
        };

        let status = target.for_citation();
        tx.execute(
          "INSERT INTO citations (
             citing, content, cited, resolved, timestamp, status, created, updated
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            citing,
            content,
            cited,
            resolved,
            timestamp,
            encode_status(status),
            now_str,
          ],
        )?;
        tx.commit()?;
        Ok((CitationInsert::Inserted { status, reactivated }, target_created))
      })
      .await?;

    if target_created {
      info!(content = %change.content, "stored new citation target");
    }
    match outcome {
      CitationInsert::Inserted { status, reactivated } => info!(
        citing = %change.citing,
        content = %change.content,
        timestamp = %change.timestamp,
        ?status,
        reactivated,
        "stored new citation"
      ),
      CitationInsert::AlreadyExists => {}
    }
    Ok(outcome)
  }

  async fn citation_exists(&self, citing: &str, content: &str) -> Result<bool> {
    let citing  = citing.to_owned();
    let content = content.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM citations WHERE citing = ?1 AND content = ?2",
              rusqlite::params![citing, content],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn get_citation(&self, citing: &str, content: &str) -> Result<Option<Citation>> {
    let citing  = citing.to_owned();
    let content = content.to_owned();

    let raw: Option<RawCitation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {CITATION_COLUMNS} FROM citations WHERE citing = ?1 AND content = ?2"
            ),
            rusqlite::params![citing, content],
            RawCitation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCitation::into_citation).transpose()
  }

  async fn update_citation(
    &self,
    change: &CitationChange,
    metadata: Option<TargetMetadata>,
  ) -> Result<GatedUpdate> {
    let citing   = change.citing.clone();
    let content  = change.content.clone();
    let cited    = change.cited.clone();
    let resolved = change.resolved;
    let incoming = encode_event_time(change.timestamp);
    let now_str  = encode_dt(Utc::now());
    let refresh  = metadata.map(MetadataRow::encode).transpose()?;

    // The write lock is held from before the stored timestamp is read until
    // the citation and its target are both committed.
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some((stored_ts, previous)) = stored_citation(&tx, &citing, &content)? else {
          return Ok(GatedUpdate::Missing);
        };
        if incoming <= stored_ts {
          return Ok(GatedUpdate::Stale { current: previous });
        }

        let mut reactivated = 0;
        if let Some(meta) = &refresh {
          if let Some(update) = write_metadata(&tx, &content, meta, &now_str)? {
            reactivated = update.reactivated;
          }
        }
        let target = target_status(&tx, &content)?.unwrap_or(LifecycleStatus::Discarded);
        let current = previous.after_update(target);

        tx.execute(
          "UPDATE citations
           SET cited = ?3, resolved = ?4, timestamp = ?5, status = ?6, updated = ?7
           WHERE citing = ?1 AND content = ?2",
          rusqlite::params![
            citing,
            content,
            cited,
            resolved,
            incoming,
            encode_status(current),
            now_str,
          ],
        )?;
        tx.commit()?;
        Ok(GatedUpdate::Applied { previous, current, reactivated })
      })
      .await?;

    match outcome {
      GatedUpdate::Applied { current, .. } => info!(
        citing = %change.citing,
        content = %change.content,
        timestamp = %change.timestamp,
        status = ?current,
        "updated citation"
      ),
      GatedUpdate::Stale { .. } => info!(
        citing = %change.citing,
        content = %change.content,
        timestamp = %change.timestamp,
        "ignoring citation update: received timestamp is equal/older than stored (stale)"
      ),
      GatedUpdate::Missing => {}
    }
    Ok(outcome)
  }

  async fn mark_citation_deleted(&self, change: &CitationChange) -> Result<GatedUpdate> {
    let citing   = change.citing.clone();
    let content  = change.content.clone();
    let incoming = encode_event_time(change.timestamp);
    let now_str  = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some((stored_ts, previous)) = stored_citation(&tx, &citing, &content)? else {
          return Ok(GatedUpdate::Missing);
        };
        if incoming <= stored_ts {
          return Ok(GatedUpdate::Stale { current: previous });
        }

        tx.execute(
          "UPDATE citations SET timestamp = ?3, status = ?4, updated = ?5
           WHERE citing = ?1 AND content = ?2",
          rusqlite::params![
            citing,
            content,
            incoming,
            encode_status(LifecycleStatus::Deleted),
            now_str,
          ],
        )?;
        tx.commit()?;
        Ok(GatedUpdate::Applied {
          previous,
          current: LifecycleStatus::Deleted,
          reactivated: 0,
        })
      })
      .await?;

    match outcome {
      GatedUpdate::Applied { .. } => info!(
        citing = %change.citing,
        content = %change.content,
        timestamp = %change.timestamp,
        "marked citation as deleted"
      ),
      GatedUpdate::Stale { .. } => info!(
        citing = %change.citing,
        content = %change.content,
        timestamp = %change.timestamp,
        "ignoring citation deletion: received timestamp is equal/older than stored (stale)"
      ),
      GatedUpdate::Missing => {}
    }
    Ok(outcome)
  }

  async fn reactivate_discarded(&self, content: &str) -> Result<u64> {
    let content_str = content.to_owned();
    let now_str     = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let n = reactivate(&tx, &content_str, &now_str)?;
        tx.commit()?;
        Ok(n)
      })
      .await?;

    if changed > 0 {
      info!(content, changed, "marked discarded citations as registered");
    }
    Ok(changed)
  }

  async fn list_citing_bibcodes(
    &self,
    content: &str,
    status: LifecycleStatus,
  ) -> Result<Vec<String>> {
    let content    = content.to_owned();
    let status_str = encode_status(status).to_owned();

    let bibcodes = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT citing FROM citations WHERE content = ?1 AND status = ?2 ORDER BY citing",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![content, status_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(bibcodes)
  }

  async fn list_citing_bibcodes_by_target(&self, bibcode: &str) -> Result<Vec<String>> {
    let Some(target) = self
      .lookup_by_bibcode(bibcode, Some(LifecycleStatus::Registered))
      .await?
    else {
      return Ok(Vec::new());
    };
    self
      .list_citing_bibcodes(&target.content, LifecycleStatus::Registered)
      .await
  }

  async fn citation_count(&self) -> Result<u64> { self.count("citations").await }

  async fn record_event(&self, data: serde_json::Value) -> Result<Event> {
    let event = Event {
      event_id:    Uuid::new_v4(),
      data,
      received_at: Utc::now(),
    };

    let id_str   = encode_uuid(event.event_id);
    let data_str = event.data.to_string();
    let at_str   = encode_dt(event.received_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO events (event_id, data, received_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, data_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(event)
  }

  async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, data, received_at FROM events
           ORDER BY rowid DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], |row| {
            Ok(RawEvent {
              event_id:    row.get(0)?,
              data:        row.get(1)?,
              received_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn event_count(&self) -> Result<u64> { self.count("events").await }
}

#[cfg(test)]
impl SqliteStore {
  /// Overwrite a citation's status, bypassing every write rule.
  pub(crate) async fn force_citation_status(
    &self,
    citing: &str,
    content: &str,
    status: LifecycleStatus,
  ) -> Result<()> {
    let citing     = citing.to_owned();
    let content    = content.to_owned();
    let status_str = encode_status(status);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE citations SET status = ?3 WHERE citing = ?1 AND content = ?2",
          rusqlite::params![citing, content, status_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
