//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeZone as _, Utc};
use citecap_core::{
  citation::{ChangeStatus, CitationChange, ContentType, LifecycleStatus},
  store::{CaptureStore, CitationInsert, GatedUpdate, InsertOutcome, MetadataUpdate},
  target::{NewCitationTarget, ParsedMetadata, RawMetadata, TargetMetadata},
};
use serde_json::json;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

fn metadata(bibcode: Option<&str>, status: LifecycleStatus) -> TargetMetadata {
  TargetMetadata {
    raw: RawMetadata::Text("<resource/>".into()),
    parsed: ParsedMetadata {
      bibcode: bibcode.map(str::to_owned),
      alternate_bibcode: vec![],
      extra: Default::default(),
    },
    status,
  }
}

fn new_target(content: &str, meta: TargetMetadata) -> NewCitationTarget {
  NewCitationTarget {
    content:      content.into(),
    content_type: ContentType::Doi,
    metadata:     meta,
  }
}

fn change(citing: &str, content: &str, status: ChangeStatus, secs: i64) -> CitationChange {
  CitationChange {
    citing: citing.into(),
    cited: "...................".into(),
    content: content.into(),
    content_type: ContentType::Doi,
    resolved: false,
    status,
    timestamp: at(secs),
  }
}

async fn seed_citation(
  s: &SqliteStore,
  citing: &str,
  content: &str,
  status: LifecycleStatus,
  secs: i64,
) {
  if s.lookup_by_identifier(content).await.unwrap().is_none() {
    let outcome = s
      .insert_target(new_target(content, TargetMetadata::unresolved()))
      .await
      .unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);
  }
  let c = change(citing, content, ChangeStatus::New, secs);
  let outcome = s.create_citation(&c, None).await.unwrap();
  assert!(matches!(outcome, CitationInsert::Inserted { .. }));
  s.force_citation_status(citing, content, status).await.unwrap();
}

async fn status_of(s: &SqliteStore, citing: &str, content: &str) -> LifecycleStatus {
  s.get_citation(citing, content).await.unwrap().unwrap().status
}

// ─── Citation targets ────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_lookup_target() {
  let s = store().await;
  let meta = metadata(Some("2014zndo.....11813S"), LifecycleStatus::Registered);

  let outcome = s
    .insert_target(new_target("10.5281/zenodo.11813", meta.clone()))
    .await
    .unwrap();
  assert_eq!(outcome, InsertOutcome::Inserted);

  let t = s
    .lookup_by_identifier("10.5281/zenodo.11813")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(t.content_type, ContentType::Doi);
  assert_eq!(t.status, LifecycleStatus::Registered);
  assert_eq!(t.raw_cited_metadata, meta.raw);
  assert_eq!(t.parsed_cited_metadata, meta.parsed);
  assert_eq!(s.citation_target_count().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_target_insert_is_a_no_op() {
  let s = store().await;
  let first = metadata(Some("2014zndo.....11813S"), LifecycleStatus::Registered);
  let second = metadata(None, LifecycleStatus::Discarded);

  s.insert_target(new_target("10.5281/zenodo.11813", first))
    .await
    .unwrap();
  let outcome = s
    .insert_target(new_target("10.5281/zenodo.11813", second))
    .await
    .unwrap();
  assert_eq!(outcome, InsertOutcome::AlreadyExists);

  let t = s
    .lookup_by_identifier("10.5281/zenodo.11813")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(t.status, LifecycleStatus::Registered);
  assert_eq!(s.citation_target_count().await.unwrap(), 1);
}

#[tokio::test]
async fn lookup_missing_target_returns_none() {
  let s = store().await;
  assert!(s.lookup_by_identifier("10.0/none").await.unwrap().is_none());
  assert!(s.entry_date("10.0/none").await.unwrap().is_none());
}

#[tokio::test]
async fn entry_date_is_creation_time() {
  let s = store().await;
  let before = Utc::now();
  s.insert_target(new_target("10.1/a", TargetMetadata::unresolved()))
    .await
    .unwrap();
  let created = s.entry_date("10.1/a").await.unwrap().unwrap();
  assert!(created >= before - chrono::Duration::seconds(1));
  assert!(created <= Utc::now());
}

#[tokio::test]
async fn metadata_update_only_writes_on_difference() {
  let s = store().await;
  let meta = metadata(None, LifecycleStatus::Discarded);
  s.insert_target(new_target("10.1/a", meta.clone())).await.unwrap();

  let same = s
    .update_target_metadata("10.1/a", meta.raw.clone(), meta.parsed.clone(), None)
    .await
    .unwrap();
  assert_eq!(same, MetadataUpdate::default());

  let same_status = s
    .update_target_metadata(
      "10.1/a",
      meta.raw.clone(),
      meta.parsed.clone(),
      Some(LifecycleStatus::Discarded),
    )
    .await
    .unwrap();
  assert!(!same_status.changed);

  let promoted = s
    .update_target_metadata(
      "10.1/a",
      meta.raw.clone(),
      meta.parsed.clone(),
      Some(LifecycleStatus::Registered),
    )
    .await
    .unwrap();
  assert!(promoted.changed);

  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Registered);
}

#[tokio::test]
async fn metadata_update_without_status_keeps_status() {
  let s = store().await;
  s.insert_target(new_target("10.1/a", metadata(None, LifecycleStatus::Discarded)))
    .await
    .unwrap();

  let updated = metadata(Some("2001Sci...1....1A"), LifecycleStatus::Registered);
  assert!(
    s.update_target_metadata("10.1/a", updated.raw, updated.parsed, None)
      .await
      .unwrap()
      .changed
  );

  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Discarded);
  assert_eq!(t.bibcode(), Some("2001Sci...1....1A"));
}

#[tokio::test]
async fn raw_metadata_bytes_are_decoded_when_possible() {
  let s = store().await;
  s.insert_target(new_target("10.1/a", TargetMetadata::unresolved()))
    .await
    .unwrap();

  s.update_target_metadata(
    "10.1/a",
    RawMetadata::Bytes(b"<resource/>".to_vec()),
    ParsedMetadata::default(),
    None,
  )
  .await
  .unwrap();
  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.raw_cited_metadata, RawMetadata::Text("<resource/>".into()));

  s.update_target_metadata(
    "10.1/a",
    RawMetadata::Bytes(vec![0xff, 0x00]),
    ParsedMetadata::default(),
    None,
  )
  .await
  .unwrap();
  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.raw_cited_metadata, RawMetadata::Bytes(vec![0xff, 0x00]));
}

#[tokio::test]
async fn metadata_update_for_missing_target_reports_no_change() {
  let s = store().await;
  let updated = s
    .update_target_metadata(
      "10.0/none",
      RawMetadata::default(),
      ParsedMetadata::default(),
      Some(LifecycleStatus::Registered),
    )
    .await
    .unwrap();
  assert!(!updated.changed);
}

#[tokio::test]
async fn parsed_metadata_extra_fields_roundtrip() {
  let s = store().await;
  let mut meta = metadata(Some("2014zndo.....11813S"), LifecycleStatus::Registered);
  meta.parsed.extra.insert("title".into(), json!("Software"));
  meta.parsed.alternate_bibcode = vec!["2014zndo.....11813T".into()];
  s.insert_target(new_target("10.1/a", meta.clone())).await.unwrap();

  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.parsed_cited_metadata, meta.parsed);
}

// ─── Listing filters ─────────────────────────────────────────────────────────

async fn seed_listing(s: &SqliteStore) {
  for (content, bibcode, status) in [
    ("10.1/registered", Some("2001Reg...1....1A"), LifecycleStatus::Registered),
    ("10.1/registered-nobib", None, LifecycleStatus::Registered),
    ("10.1/discarded", None, LifecycleStatus::Discarded),
    ("10.1/deleted", Some("2001Del...1....1A"), LifecycleStatus::Deleted),
  ] {
    s.insert_target(new_target(content, metadata(bibcode, status)))
      .await
      .unwrap();
  }
}

#[tokio::test]
async fn lookup_all_discarded_includes_targets_without_bibcode() {
  let s = store().await;
  seed_listing(&s).await;

  let discarded = s.lookup_all(Some(LifecycleStatus::Discarded)).await.unwrap();
  assert_eq!(discarded.len(), 1);
  assert_eq!(discarded[0].content, "10.1/discarded");
  assert!(discarded[0].bibcode.is_none());
}

#[tokio::test]
async fn lookup_all_registered_excludes_targets_without_bibcode() {
  let s = store().await;
  seed_listing(&s).await;

  let registered = s.lookup_all(Some(LifecycleStatus::Registered)).await.unwrap();
  assert_eq!(registered.len(), 1);
  assert_eq!(registered[0].content, "10.1/registered");
}

#[tokio::test]
async fn lookup_all_unfiltered_excludes_targets_without_bibcode() {
  let s = store().await;
  seed_listing(&s).await;

  let all = s.lookup_all(None).await.unwrap();
  let contents: Vec<_> = all.iter().map(|t| t.content.as_str()).collect();
  assert_eq!(contents.len(), 2);
  assert!(contents.contains(&"10.1/registered"));
  assert!(contents.contains(&"10.1/deleted"));
}

#[tokio::test]
async fn lookup_by_identifiers_applies_filter() {
  let s = store().await;
  seed_listing(&s).await;

  let wanted = vec![
    "10.1/registered".to_string(),
    "10.1/discarded".to_string(),
    "10.1/unknown".to_string(),
  ];
  let registered = s
    .lookup_by_identifiers(&wanted, Some(LifecycleStatus::Registered))
    .await
    .unwrap();
  assert_eq!(registered.len(), 1);
  assert_eq!(registered[0].content, "10.1/registered");

  let discarded = s
    .lookup_by_identifiers(&wanted, Some(LifecycleStatus::Discarded))
    .await
    .unwrap();
  assert_eq!(discarded.len(), 1);
  assert_eq!(discarded[0].content, "10.1/discarded");
}

#[tokio::test]
async fn lookup_by_bibcode_respects_status() {
  let s = store().await;
  seed_listing(&s).await;

  let found = s
    .lookup_by_bibcode("2001Reg...1....1A", Some(LifecycleStatus::Registered))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.content, "10.1/registered");

  let not_registered = s
    .lookup_by_bibcode("2001Del...1....1A", Some(LifecycleStatus::Registered))
    .await
    .unwrap();
  assert!(not_registered.is_none());

  let any = s.lookup_by_bibcode("2001Del...1....1A", None).await.unwrap();
  assert_eq!(any.unwrap().content, "10.1/deleted");
}

// ─── Citations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn created_citation_takes_target_status() {
  let s = store().await;
  s.insert_target(new_target(
    "10.1/registered",
    metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered),
  ))
  .await
  .unwrap();
  s.insert_target(new_target("10.1/unresolved", TargetMetadata::unresolved()))
    .await
    .unwrap();

  let c = change("2005CaJES..42.1987P", "10.1/registered", ChangeStatus::New, 100);
  assert_eq!(
    s.create_citation(&c, None).await.unwrap(),
    CitationInsert::Inserted { status: LifecycleStatus::Registered, reactivated: 0 }
  );
  let c = change("2005CaJES..42.1987P", "10.1/unresolved", ChangeStatus::New, 100);
  assert_eq!(
    s.create_citation(&c, None).await.unwrap(),
    CitationInsert::Inserted { status: LifecycleStatus::Discarded, reactivated: 0 }
  );

  assert!(s.citation_exists("2005CaJES..42.1987P", "10.1/registered").await.unwrap());
  assert!(!s.citation_exists("2005CaJES..42.1987P", "10.1/other").await.unwrap());

  let stored = s
    .get_citation("2005CaJES..42.1987P", "10.1/registered")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.status, LifecycleStatus::Registered);
  assert_eq!(stored.timestamp, at(100));
  assert!(!stored.resolved);
  assert_eq!(s.citation_count().await.unwrap(), 2);
}

#[tokio::test]
async fn created_citation_stores_missing_target() {
  let s = store().await;
  let meta = metadata(Some("2014zndo.....11813S"), LifecycleStatus::Registered);
  let c = change("2005CaJES..42.1987P", "10.5281/zenodo.11813", ChangeStatus::New, 100);

  let outcome = s.create_citation(&c, Some(meta.clone())).await.unwrap();
  assert_eq!(outcome, CitationInsert::Inserted {
    status:      LifecycleStatus::Registered,
    reactivated: 0,
  });

  let t = s
    .lookup_by_identifier("10.5281/zenodo.11813")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(t.status, LifecycleStatus::Registered);
  assert_eq!(t.parsed_cited_metadata, meta.parsed);

  let unresolved = change("2005CaJES..42.1987P", "10.1/new", ChangeStatus::New, 100);
  s.create_citation(&unresolved, None).await.unwrap();
  let t = s.lookup_by_identifier("10.1/new").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Discarded);
  assert_eq!(
    status_of(&s, "2005CaJES..42.1987P", "10.1/new").await,
    LifecycleStatus::Discarded
  );
}

#[tokio::test]
async fn duplicate_citation_touches_neither_citation_nor_target() {
  let s = store().await;
  seed_citation(&s, "2005CaJES..42.1987P", "10.1/a", LifecycleStatus::Discarded, 100).await;

  let c = change("2005CaJES..42.1987P", "10.1/a", ChangeStatus::New, 200);
  let registered = metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered);
  let outcome = s.create_citation(&c, Some(registered)).await.unwrap();
  assert_eq!(outcome, CitationInsert::AlreadyExists);

  let stored = s
    .get_citation("2005CaJES..42.1987P", "10.1/a")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.timestamp, at(100));
  assert_eq!(stored.status, LifecycleStatus::Discarded);
  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Discarded);
  assert_eq!(s.citation_count().await.unwrap(), 1);
}

#[tokio::test]
async fn citation_created_after_registration_is_registered() {
  let s = store().await;
  seed_citation(&s, "A", "10.1/a", LifecycleStatus::Discarded, 100).await;

  // The delivery for B was produced before the target was registered and
  // carries no metadata of its own.
  let registered = metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered);
  let promoted = s
    .update_target_metadata(
      "10.1/a",
      registered.raw,
      registered.parsed,
      Some(registered.status),
    )
    .await
    .unwrap();
  assert_eq!(promoted, MetadataUpdate { changed: true, reactivated: 1 });

  let c = change("B", "10.1/a", ChangeStatus::New, 100);
  assert_eq!(
    s.create_citation(&c, None).await.unwrap(),
    CitationInsert::Inserted { status: LifecycleStatus::Registered, reactivated: 0 }
  );
  assert!(
    s.list_citing_bibcodes("10.1/a", LifecycleStatus::Discarded)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn citations_created_during_registration_are_never_left_discarded() {
  let s = store().await;
  s.insert_target(new_target("10.1/a", TargetMetadata::unresolved()))
    .await
    .unwrap();

  let creates: Vec<_> = (0..20)
    .map(|i| {
      let s = s.clone();
      tokio::spawn(async move {
        let c = change(&format!("2020cit.{i:02}"), "10.1/a", ChangeStatus::New, 100);
        s.create_citation(&c, None).await.unwrap()
      })
    })
    .collect();
  let promote = {
    let s = s.clone();
    let m = metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered);
    tokio::spawn(async move {
      s.update_target_metadata("10.1/a", m.raw, m.parsed, Some(m.status))
        .await
        .unwrap()
    })
  };
  for handle in creates {
    assert!(matches!(handle.await.unwrap(), CitationInsert::Inserted { .. }));
  }
  assert!(promote.await.unwrap().changed);

  assert!(
    s.list_citing_bibcodes("10.1/a", LifecycleStatus::Discarded)
      .await
      .unwrap()
      .is_empty()
  );
  assert_eq!(
    s.list_citing_bibcodes("10.1/a", LifecycleStatus::Registered)
      .await
      .unwrap()
      .len(),
    20
  );
}

#[tokio::test]
async fn newer_update_is_applied_with_its_metadata() {
  let s = store().await;
  seed_citation(&s, "1999ITGRS..37..917L", "10.1/a", LifecycleStatus::Discarded, 100).await;

  let mut c = change("1999ITGRS..37..917L", "10.1/a", ChangeStatus::Updated, 200);
  c.cited = "1997ASAJ..101Q3182L".into();
  c.resolved = true;
  let registered = metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered);

  let outcome = s.update_citation(&c, Some(registered)).await.unwrap();
  assert_eq!(outcome, GatedUpdate::Applied {
    previous:    LifecycleStatus::Discarded,
    current:     LifecycleStatus::Registered,
    reactivated: 1,
  });

  let stored = s
    .get_citation("1999ITGRS..37..917L", "10.1/a")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.cited, "1997ASAJ..101Q3182L");
  assert!(stored.resolved);
  assert_eq!(stored.timestamp, at(200));
  assert_eq!(stored.status, LifecycleStatus::Registered);

  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Registered);
  assert_eq!(t.bibcode(), Some("2001Reg...1....1A"));
}

#[tokio::test]
async fn stale_update_leaves_citation_and_target_untouched() {
  let s = store().await;
  s.insert_target(new_target(
    "10.1/a",
    metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered),
  ))
  .await
  .unwrap();
  seed_citation(&s, "1999ITGRS..37..917L", "10.1/a", LifecycleStatus::Registered, 200).await;

  for secs in [200, 100] {
    let mut c = change("1999ITGRS..37..917L", "10.1/a", ChangeStatus::Updated, secs);
    c.cited = "1997ASAJ..101Q3182L".into();
    let older = metadata(None, LifecycleStatus::Discarded);
    let outcome = s.update_citation(&c, Some(older)).await.unwrap();
    assert_eq!(outcome, GatedUpdate::Stale {
      current: LifecycleStatus::Registered,
    });
  }

  let stored = s
    .get_citation("1999ITGRS..37..917L", "10.1/a")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.cited, "...................");
  assert_eq!(stored.timestamp, at(200));

  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Registered);
  assert_eq!(t.bibcode(), Some("2001Reg...1....1A"));
}

#[tokio::test]
async fn update_never_demotes_a_registered_citation() {
  let s = store().await;
  s.insert_target(new_target(
    "10.1/a",
    metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered),
  ))
  .await
  .unwrap();
  seed_citation(&s, "1999ITGRS..37..917L", "10.1/a", LifecycleStatus::Registered, 100).await;

  let c = change("1999ITGRS..37..917L", "10.1/a", ChangeStatus::Updated, 200);
  let demoted = metadata(None, LifecycleStatus::Discarded);
  let outcome = s.update_citation(&c, Some(demoted)).await.unwrap();
  assert_eq!(outcome, GatedUpdate::Applied {
    previous:    LifecycleStatus::Registered,
    current:     LifecycleStatus::Registered,
    reactivated: 0,
  });

  // The target follows its metadata; the citation keeps its status.
  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Discarded);
  assert_eq!(
    status_of(&s, "1999ITGRS..37..917L", "10.1/a").await,
    LifecycleStatus::Registered
  );
}

#[tokio::test]
async fn update_revives_deleted_citation_with_target_status() {
  let s = store().await;
  seed_citation(&s, "A", "10.1/a", LifecycleStatus::Deleted, 100).await;

  let c = change("A", "10.1/a", ChangeStatus::Updated, 200);
  assert_eq!(s.update_citation(&c, None).await.unwrap(), GatedUpdate::Applied {
    previous:    LifecycleStatus::Deleted,
    current:     LifecycleStatus::Discarded,
    reactivated: 0,
  });
}

#[tokio::test]
async fn subsecond_ordering_is_preserved() {
  let s = store().await;
  seed_citation(&s, "1999ITGRS..37..917L", "10.1/a", LifecycleStatus::Registered, 200).await;

  let mut c = change("1999ITGRS..37..917L", "10.1/a", ChangeStatus::Updated, 200);
  c.timestamp = Utc.timestamp_opt(200, 500_000_000).unwrap();
  let outcome = s.update_citation(&c, None).await.unwrap();
  assert!(matches!(outcome, GatedUpdate::Applied { .. }));
}

#[tokio::test]
async fn update_missing_citation_reports_missing() {
  let s = store().await;
  s.insert_target(new_target("10.1/a", TargetMetadata::unresolved()))
    .await
    .unwrap();
  let c = change("1999ITGRS..37..917L", "10.1/a", ChangeStatus::Updated, 200);
  let registered = metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered);
  let outcome = s.update_citation(&c, Some(registered)).await.unwrap();
  assert_eq!(outcome, GatedUpdate::Missing);

  let t = s.lookup_by_identifier("10.1/a").await.unwrap().unwrap();
  assert_eq!(t.status, LifecycleStatus::Discarded);
}

#[tokio::test]
async fn mark_deleted_reports_previous_status() {
  let s = store().await;
  seed_citation(&s, "2000JGeod..74..134G", "10.1/a", LifecycleStatus::Registered, 100).await;

  let first = change("2000JGeod..74..134G", "10.1/a", ChangeStatus::Deleted, 200);
  assert_eq!(s.mark_citation_deleted(&first).await.unwrap(), GatedUpdate::Applied {
    previous:    LifecycleStatus::Registered,
    current:     LifecycleStatus::Deleted,
    reactivated: 0,
  });

  let second = change("2000JGeod..74..134G", "10.1/a", ChangeStatus::Deleted, 300);
  assert_eq!(s.mark_citation_deleted(&second).await.unwrap(), GatedUpdate::Applied {
    previous:    LifecycleStatus::Deleted,
    current:     LifecycleStatus::Deleted,
    reactivated: 0,
  });

  let stored = s
    .get_citation("2000JGeod..74..134G", "10.1/a")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.status, LifecycleStatus::Deleted);
  assert_eq!(stored.timestamp, at(300));
}

#[tokio::test]
async fn stale_deletion_is_ignored() {
  let s = store().await;
  seed_citation(&s, "2000JGeod..74..134G", "10.1/a", LifecycleStatus::Registered, 200).await;

  let c = change("2000JGeod..74..134G", "10.1/a", ChangeStatus::Deleted, 100);
  assert_eq!(
    s.mark_citation_deleted(&c).await.unwrap(),
    GatedUpdate::Stale { current: LifecycleStatus::Registered }
  );
  assert_eq!(
    status_of(&s, "2000JGeod..74..134G", "10.1/a").await,
    LifecycleStatus::Registered
  );
}

#[tokio::test]
async fn reactivate_discarded_only_touches_discarded_rows_of_content() {
  let s = store().await;
  seed_citation(&s, "A", "10.1/a", LifecycleStatus::Discarded, 100).await;
  seed_citation(&s, "B", "10.1/a", LifecycleStatus::Discarded, 100).await;
  seed_citation(&s, "C", "10.1/a", LifecycleStatus::Deleted, 100).await;
  seed_citation(&s, "D", "10.1/b", LifecycleStatus::Discarded, 100).await;

  assert_eq!(s.reactivate_discarded("10.1/a").await.unwrap(), 2);

  assert_eq!(status_of(&s, "A", "10.1/a").await, LifecycleStatus::Registered);
  assert_eq!(status_of(&s, "B", "10.1/a").await, LifecycleStatus::Registered);
  assert_eq!(status_of(&s, "C", "10.1/a").await, LifecycleStatus::Deleted);
  assert_eq!(status_of(&s, "D", "10.1/b").await, LifecycleStatus::Discarded);

  assert_eq!(s.reactivate_discarded("10.1/a").await.unwrap(), 0);
}

#[tokio::test]
async fn only_the_first_registration_reactivates() {
  let s = store().await;
  seed_citation(&s, "A", "10.1/a", LifecycleStatus::Discarded, 100).await;
  seed_citation(&s, "B", "10.1/a", LifecycleStatus::Deleted, 100).await;

  let registered = metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered);
  let discarded = metadata(None, LifecycleStatus::Discarded);
  let write = |meta: TargetMetadata| {
    let s = s.clone();
    async move {
      s.update_target_metadata("10.1/a", meta.raw, meta.parsed, Some(meta.status))
        .await
        .unwrap()
    }
  };

  assert_eq!(write(registered.clone()).await, MetadataUpdate {
    changed:     true,
    reactivated: 1,
  });
  assert_eq!(status_of(&s, "A", "10.1/a").await, LifecycleStatus::Registered);
  assert_eq!(status_of(&s, "B", "10.1/a").await, LifecycleStatus::Deleted);

  // Demoted, then a citation arrives while the target is discarded.
  assert!(write(discarded).await.changed);
  seed_citation(&s, "C", "10.1/a", LifecycleStatus::Discarded, 100).await;

  assert_eq!(write(registered).await, MetadataUpdate {
    changed:     true,
    reactivated: 0,
  });
  assert_eq!(status_of(&s, "C", "10.1/a").await, LifecycleStatus::Discarded);
}

#[tokio::test]
async fn target_inserted_registered_is_never_reactivated_later() {
  let s = store().await;
  let registered = metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered);
  s.insert_target(new_target("10.1/a", registered.clone()))
    .await
    .unwrap();
  s.update_target_metadata(
    "10.1/a",
    RawMetadata::default(),
    ParsedMetadata::default(),
    Some(LifecycleStatus::Discarded),
  )
  .await
  .unwrap();
  seed_citation(&s, "A", "10.1/a", LifecycleStatus::Discarded, 100).await;

  let again = s
    .update_target_metadata(
      "10.1/a",
      registered.raw,
      registered.parsed,
      Some(registered.status),
    )
    .await
    .unwrap();
  assert_eq!(again.reactivated, 0);
  assert_eq!(status_of(&s, "A", "10.1/a").await, LifecycleStatus::Discarded);
}

#[tokio::test]
async fn list_citing_bibcodes_filters_on_status() {
  let s = store().await;
  seed_citation(&s, "B", "10.1/a", LifecycleStatus::Registered, 100).await;
  seed_citation(&s, "A", "10.1/a", LifecycleStatus::Registered, 100).await;
  seed_citation(&s, "C", "10.1/a", LifecycleStatus::Deleted, 100).await;
  seed_citation(&s, "D", "10.1/a", LifecycleStatus::Discarded, 100).await;

  let registered = s
    .list_citing_bibcodes("10.1/a", LifecycleStatus::Registered)
    .await
    .unwrap();
  assert_eq!(registered, vec!["A".to_string(), "B".to_string()]);

  let deleted = s
    .list_citing_bibcodes("10.1/a", LifecycleStatus::Deleted)
    .await
    .unwrap();
  assert_eq!(deleted, vec!["C".to_string()]);
}

#[tokio::test]
async fn list_by_target_bibcode_requires_registered_target() {
  let s = store().await;
  s.insert_target(new_target(
    "10.1/a",
    metadata(Some("2001Reg...1....1A"), LifecycleStatus::Registered),
  ))
  .await
  .unwrap();
  s.insert_target(new_target(
    "10.1/b",
    metadata(Some("2001Dis...1....1A"), LifecycleStatus::Discarded),
  ))
  .await
  .unwrap();
  seed_citation(&s, "A", "10.1/a", LifecycleStatus::Registered, 100).await;
  seed_citation(&s, "B", "10.1/b", LifecycleStatus::Registered, 100).await;

  assert_eq!(
    s.list_citing_bibcodes_by_target("2001Reg...1....1A").await.unwrap(),
    vec!["A".to_string()]
  );
  assert!(
    s.list_citing_bibcodes_by_target("2001Dis...1....1A")
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    s.list_citing_bibcodes_by_target("2001Non...1....1A")
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Audit log ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn events_are_appended_and_listed_newest_first() {
  let s = store().await;
  let first = s.record_event(json!({"n": 1})).await.unwrap();
  let second = s.record_event(json!({"n": 2})).await.unwrap();
  assert_ne!(first.event_id, second.event_id);
  assert_eq!(s.event_count().await.unwrap(), 2);

  let recent = s.recent_events(10).await.unwrap();
  assert_eq!(recent.len(), 2);
  assert_eq!(recent[0].data, json!({"n": 2}));
  assert_eq!(recent[1].event_id, first.event_id);

  assert_eq!(s.recent_events(1).await.unwrap().len(), 1);
}
