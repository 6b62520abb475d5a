//! Outbound webhook for relationship events.
//!
//! Each accepted, reportable transition is posted once as a one-element JSON
//! array. Delivery is a single bounded-timeout attempt; retrying is the
//! caller's decision.

use std::time::Duration;

use citecap_core::relationship::RelationshipEvent;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

/// Where and how to post events.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
  pub url:          String,
  pub auth_token:   String,
  pub timeout_secs: u64,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("registry rejected event with status {status}: {body}")]
  Rejected { status: u16, body: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Posts relationship events to the configured registry.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WebhookClient {
  client:     Client,
  url:        String,
  auth_token: String,
}

impl WebhookClient {
  pub fn new(config: &WebhookConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      url: config.url.clone(),
      auth_token: config.auth_token.clone(),
    })
  }

  /// Post `event`. Only a 2xx response counts as delivered.
  pub async fn emit(&self, event: &RelationshipEvent) -> Result<()> {
    let resp = self
      .client
      .post(&self.url)
      .bearer_auth(&self.auth_token)
      .json(&[event])
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      warn!(
        url = %self.url,
        status = status.as_u16(),
        "registry did not accept relationship event"
      );
      return Err(Error::Rejected { status: status.as_u16(), body });
    }

    info!(
      source = %event.source.identifier.id,
      target = %event.target.identifier.id,
      relation = ?event.relationship_type.sub_type,
      "emitted relationship event"
    );
    Ok(())
  }
}
