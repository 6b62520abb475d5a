//! Encoding and decoding helpers between Rust domain types and the
//! representations stored in SQLite columns.
//!
//! Bookkeeping timestamps are stored as RFC 3339 strings. The citation event
//! time is stored as integer microseconds so that the ordering gate compares
//! integers. Parsed metadata is stored as compact JSON; raw metadata as TEXT
//! or BLOB depending on whether it decodes.

use chrono::{DateTime, Utc};
use citecap_core::{
  citation::{Citation, ContentType, LifecycleStatus},
  event::Event,
  target::{CitationTarget, ParsedMetadata, RawMetadata},
};
use rusqlite::types::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_event_time(dt: DateTime<Utc>) -> i64 { dt.timestamp_micros() }

pub fn decode_event_time(micros: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_micros(micros)
    .ok_or_else(|| Error::DateParse(format!("event time out of range: {micros}")))
}

// ─── ContentType ──────────────────────────────────────────────────────────────

pub fn encode_content_type(t: ContentType) -> &'static str {
  match t {
    ContentType::Doi => "doi",
    ContentType::Pid => "pid",
    ContentType::Url => "url",
  }
}

pub fn decode_content_type(s: &str) -> Result<ContentType> {
  match s {
    "doi" => Ok(ContentType::Doi),
    "pid" => Ok(ContentType::Pid),
    "url" => Ok(ContentType::Url),
    other => Err(Error::UnknownValue {
      column: "content_type",
      value:  other.to_owned(),
    }),
  }
}

// ─── LifecycleStatus ──────────────────────────────────────────────────────────

pub fn encode_status(s: LifecycleStatus) -> &'static str {
  match s {
    LifecycleStatus::Registered => "REGISTERED",
    LifecycleStatus::Discarded => "DISCARDED",
    LifecycleStatus::Deleted => "DELETED",
  }
}

pub fn decode_status(s: &str) -> Result<LifecycleStatus> {
  match s {
    "REGISTERED" => Ok(LifecycleStatus::Registered),
    "DISCARDED" => Ok(LifecycleStatus::Discarded),
    "DELETED" => Ok(LifecycleStatus::Deleted),
    other => Err(Error::UnknownValue {
      column: "status",
      value:  other.to_owned(),
    }),
  }
}

/// Read a status column where a write decision depends on it. An unknown
/// value fails the surrounding transaction.
pub fn read_status(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<LifecycleStatus> {
  let value: String = row.get(idx)?;
  decode_status(&value).map_err(|_| {
    rusqlite::Error::InvalidColumnType(idx, "status".to_owned(), rusqlite::types::Type::Text)
  })
}

// ─── Metadata ─────────────────────────────────────────────────────────────────

pub fn encode_raw(raw: RawMetadata) -> Value {
  match raw.decoded() {
    RawMetadata::Text(text) => Value::Text(text),
    RawMetadata::Bytes(bytes) => Value::Blob(bytes),
  }
}

pub fn decode_raw(value: Value) -> Result<RawMetadata> {
  match value {
    Value::Null => Ok(RawMetadata::default()),
    Value::Text(text) => Ok(RawMetadata::Text(text)),
    Value::Blob(bytes) => Ok(RawMetadata::Bytes(bytes)),
    other => Err(Error::UnknownValue {
      column: "raw_cited_metadata",
      value:  format!("{other:?}"),
    }),
  }
}

/// Compact JSON. Object keys come out sorted, so equal metadata always
/// encodes to equal strings.
pub fn encode_parsed(parsed: &ParsedMetadata) -> Result<String> {
  Ok(serde_json::to_string(parsed)?)
}

pub fn decode_parsed(s: &str) -> Result<ParsedMetadata> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const TARGET_COLUMNS: &str = "content, content_type, raw_cited_metadata, \
                                  parsed_cited_metadata, status, created";

/// Raw values read directly from a `citation_targets` row.
pub struct RawTarget {
  pub content:      String,
  pub content_type: String,
  pub raw:          Value,
  pub parsed:       String,
  pub status:       String,
  pub created:      String,
}

impl RawTarget {
  /// Read a row selected with [`TARGET_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      content:      row.get(0)?,
      content_type: row.get(1)?,
      raw:          row.get(2)?,
      parsed:       row.get(3)?,
      status:       row.get(4)?,
      created:      row.get(5)?,
    })
  }

  pub fn into_target(self) -> Result<CitationTarget> {
    Ok(CitationTarget {
      content:               self.content,
      content_type:          decode_content_type(&self.content_type)?,
      raw_cited_metadata:    decode_raw(self.raw)?,
      parsed_cited_metadata: decode_parsed(&self.parsed)?,
      status:                decode_status(&self.status)?,
      created:               decode_dt(&self.created)?,
    })
  }
}

pub const CITATION_COLUMNS: &str = "citing, content, cited, resolved, timestamp, status";

/// Raw values read directly from a `citations` row.
pub struct RawCitation {
  pub citing:    String,
  pub content:   String,
  pub cited:     String,
  pub resolved:  bool,
  pub timestamp: i64,
  pub status:    String,
}

impl RawCitation {
  /// Read a row selected with [`CITATION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      citing:    row.get(0)?,
      content:   row.get(1)?,
      cited:     row.get(2)?,
      resolved:  row.get(3)?,
      timestamp: row.get(4)?,
      status:    row.get(5)?,
    })
  }

  pub fn into_citation(self) -> Result<Citation> {
    Ok(Citation {
      citing:    self.citing,
      content:   self.content,
      cited:     self.cited,
      resolved:  self.resolved,
      timestamp: decode_event_time(self.timestamp)?,
      status:    decode_status(&self.status)?,
    })
  }
}

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub event_id:    String,
  pub data:        String,
  pub received_at: String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      event_id:    decode_uuid(&self.event_id)?,
      data:        serde_json::from_str(&self.data)?,
      received_at: decode_dt(&self.received_at)?,
    })
  }
}
