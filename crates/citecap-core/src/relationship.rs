//! Mapping from accepted change records to outbound relationship events.
//!
//! The mapping depends only on the change's `status`, `resolved` flag and
//! `content_type`:
//!
//! | status    | resolved | event           | relation        | source   |
//! |-----------|----------|-----------------|-----------------|----------|
//! | `new`     | any      | created         | `Cites`         | `citing` |
//! | `updated` | `false`  | none            |                 |          |
//! | `updated` | `true`   | created         | `IsIdenticalTo` | `cited`  |
//! | `deleted` | any      | deleted, if enabled by [`MapperPolicy`] | `Cites` | `citing` |
//!
//! A resolved update declares that the cited content is the same work as a
//! catalogued record, hence the source switches to the cited bibcode.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  citation::{ChangeStatus, CitationChange, ContentType},
};

pub const SUBTYPE_SCHEMA: &str = "DataCite";
pub const RELATIONSHIP_NAME: &str = "References";
pub const SOURCE_SCHEME: &str = "ads";
pub const SOURCE_URL_BASE: &str = "http://adsabs.harvard.edu/abs/";
pub const SOURCE_TYPE: &str = "unknown";
pub const TARGET_TYPE: &str = "software";
pub const LICENSE_URL: &str = "https://creativecommons.org/publicdomain/zero/1.0/";
pub const LINK_PROVIDER: &str = "SAO/NASA Astrophysics Data System";

const ASCL_PREFIX: &str = "ascl:";

/// The DataCite relation sub-type carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationName {
  Cites,
  IsIdenticalTo,
}

/// Whether an event announces or withdraws a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  RelationCreated,
  RelationDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelationshipType {
  pub sub_type_schema: String,
  pub sub_type:        RelationName,
  pub name:            String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
  #[serde(rename = "IDScheme")]
  pub scheme: String,
  #[serde(rename = "IDURL")]
  pub url:    String,
  #[serde(rename = "ID")]
  pub id:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeName {
  pub name: String,
}

/// One end of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
  pub identifier: Identifier,
  #[serde(rename = "Type")]
  pub kind:       TypeName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkProvider {
  pub name: String,
}

/// The relationship object posted to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelationshipEvent {
  pub relationship_type:     RelationshipType,
  pub source:                Endpoint,
  #[serde(rename = "LicenseURL")]
  pub license_url:           String,
  pub target:                Endpoint,
  /// Serialised as `YYYY-MM-DD`.
  pub link_publication_date: NaiveDate,
  pub link_provider:         Vec<LinkProvider>,
}

/// A mapped event together with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
  pub kind:         EventKind,
  pub relationship: RelationshipEvent,
}

/// Switches for mappings that exist but are not yet emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperPolicy {
  /// Emit `relation_deleted` events. Off until the registry supports them.
  #[serde(default)]
  pub emit_deletions: bool,
}

/// Classify a content identifier into the registry's target scheme.
///
/// Fails for empty identifiers and for persistent identifiers other than
/// ASCL ones.
pub fn classify(content_type: ContentType, content: &str) -> Result<Identifier> {
  let unclassifiable = || Error::UnclassifiableContent {
    content_type,
    content: content.to_owned(),
  };
  if content.is_empty() {
    return Err(unclassifiable());
  }

  let (scheme, url) = match content_type {
    ContentType::Doi => ("doi", format!("https://doi.org/{content}")),
    ContentType::Pid => {
      let code = content.strip_prefix(ASCL_PREFIX).ok_or_else(unclassifiable)?;
      ("ascl", format!("https://ascl.net/{code}"))
    }
    ContentType::Url => ("url", content.to_owned()),
  };

  Ok(Identifier {
    scheme: scheme.to_owned(),
    url,
    id: content.to_owned(),
  })
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceRole {
  Citing,
  Cited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
  Emit {
    kind:     EventKind,
    relation: RelationName,
    source:   SourceRole,
  },
  Suppress,
}

fn plan(status: ChangeStatus, resolved: bool, policy: MapperPolicy) -> Plan {
  match (status, resolved) {
    (ChangeStatus::New, _) => Plan::Emit {
      kind:     EventKind::RelationCreated,
      relation: RelationName::Cites,
      source:   SourceRole::Citing,
    },
    (ChangeStatus::Updated, false) => Plan::Suppress,
    (ChangeStatus::Updated, true) => Plan::Emit {
      kind:     EventKind::RelationCreated,
      relation: RelationName::IsIdenticalTo,
      source:   SourceRole::Cited,
    },
    (ChangeStatus::Deleted, _) if policy.emit_deletions => Plan::Emit {
      kind:     EventKind::RelationDeleted,
      relation: RelationName::Cites,
      source:   SourceRole::Citing,
    },
    (ChangeStatus::Deleted, _) => Plan::Suppress,
  }
}

fn source_endpoint(bibcode: &str) -> Endpoint {
  Endpoint {
    identifier: Identifier {
      scheme: SOURCE_SCHEME.to_owned(),
      url:    format!("{SOURCE_URL_BASE}{bibcode}"),
      id:     bibcode.to_owned(),
    },
    kind:       TypeName { name: SOURCE_TYPE.to_owned() },
  }
}

/// Map `change` to at most one outbound event, dated `today`.
///
/// `Ok(None)` means the change is deliberately not reported. An error means
/// the change could not be mapped and must not be reported either.
pub fn map_change(
  change: &CitationChange,
  today: NaiveDate,
  policy: MapperPolicy,
) -> Result<Option<OutboundEvent>> {
  let (kind, relation, role) = match plan(change.status, change.resolved, policy) {
    Plan::Emit { kind, relation, source } => (kind, relation, source),
    Plan::Suppress => return Ok(None),
  };

  let source_bibcode = match role {
    SourceRole::Citing => change.citing.as_str(),
    SourceRole::Cited if change.has_known_cited() => change.cited.as_str(),
    SourceRole::Cited => {
      return Err(Error::UnknownSourceBibcode {
        content: change.content.clone(),
      });
    }
  };

  let target = classify(change.content_type, &change.content)?;

  Ok(Some(OutboundEvent {
    kind,
    relationship: RelationshipEvent {
      relationship_type:     RelationshipType {
        sub_type_schema: SUBTYPE_SCHEMA.to_owned(),
        sub_type:        relation,
        name:            RELATIONSHIP_NAME.to_owned(),
      },
      source:                source_endpoint(source_bibcode),
      license_url:           LICENSE_URL.to_owned(),
      target:                Endpoint {
        identifier: target,
        kind:       TypeName { name: TARGET_TYPE.to_owned() },
      },
      link_publication_date: today,
      link_provider:         vec![LinkProvider { name: LINK_PROVIDER.to_owned() }],
    },
  }))
}
