//! Worker configuration.
//!
//! Loaded once at startup from an optional TOML file layered under
//! `CITECAP_*` environment variables (nested keys separated by `__`, e.g.
//! `CITECAP_WEBHOOK__AUTH_TOKEN`), then passed down explicitly.

use std::path::{Path, PathBuf};

use citecap_core::relationship::MapperPolicy;
use citecap_webhook::{WebhookClient, WebhookConfig};
use config::{
  Config, ConfigError, Environment, File, FileFormat,
  builder::{ConfigBuilder, DefaultState},
};
use serde::Deserialize;

use crate::{Error, Result};

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/citecap/citecap.db") }

fn default_timeout_secs() -> u64 { 30 }

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  /// Announce deletions of registered citations to the registry.
  #[serde(default)]
  pub emit_deletions: bool,
  #[serde(default)]
  pub webhook:        WebhookSettings,
  #[serde(default)]
  pub api:            ApiSettings,
}

/// The `[webhook]` table. `url` and `auth_token` are required once
/// `enabled` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
  #[serde(default)]
  pub enabled:      bool,
  pub url:          Option<String>,
  pub auth_token:   Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for WebhookSettings {
  fn default() -> Self {
    Self {
      enabled:      false,
      url:          None,
      auth_token:   None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

/// The `[api]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self { host: default_host(), port: default_port() }
  }
}

impl WorkerConfig {
  /// Read `path` if it exists, then apply `CITECAP_*` overrides.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::build(Config::builder().add_source(File::from(path).required(false)))
  }

  /// Parse a TOML document, then apply `CITECAP_*` overrides.
  pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
    Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
  }

  fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(
        Environment::with_prefix("CITECAP")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn policy(&self) -> MapperPolicy {
    MapperPolicy { emit_deletions: self.emit_deletions }
  }

  /// The webhook client, or `None` when emission is switched off.
  pub fn webhook_client(&self) -> Result<Option<WebhookClient>> {
    let settings = &self.webhook;
    if !settings.enabled {
      return Ok(None);
    }
    let (Some(url), Some(auth_token)) = (&settings.url, &settings.auth_token) else {
      return Err(Error::Config(
        "webhook.url and webhook.auth_token are required when the webhook is enabled".into(),
      ));
    };
    let client = WebhookClient::new(&WebhookConfig {
      url:          url.clone(),
      auth_token:   auth_token.clone(),
      timeout_secs: settings.timeout_secs,
    })?;
    Ok(Some(client))
  }
}
