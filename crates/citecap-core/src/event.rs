//! Raw audit log entries.
//!
//! Every inbound payload is appended as received. Nothing reads the log during
//! reconciliation; it exists for replay and debugging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub event_id:    Uuid,
  pub data:        serde_json::Value,
  pub received_at: DateTime<Utc>,
}
