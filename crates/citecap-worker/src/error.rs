//! Error types for `citecap-worker`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("malformed feed record: {0}")]
  Malformed(#[from] serde_json::Error),

  #[error("feed read error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("webhook client error: {0}")]
  Webhook(#[from] citecap_webhook::Error),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
