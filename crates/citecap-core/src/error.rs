//! Error types for `citecap-core`.

use thiserror::Error;

use crate::citation::ContentType;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot classify {content_type:?} identifier {content:?}")]
  UnclassifiableContent {
    content_type: ContentType,
    content:      String,
  },

  #[error("resolved change for {content:?} carries no cited bibcode")]
  UnknownSourceBibcode { content: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
