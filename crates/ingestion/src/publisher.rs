//! Publication state machine
//!
//! Governs the ingest and publish transitions per article version:
//! version sequencing, already-published guards, forced corrections,
//! and the atomic ingest+publish composition. Every transition runs
//! inside a single storage transaction; an error rolls the whole
//! unit of work back, and outbound notifications are deferred until
//! after commit.

use articleforge_common::config::AppConfig;
use articleforge_common::db::models::{ArticleStatus, ArticleVersion};
use articleforge_common::db::repository;
use articleforge_common::errors::{AppError, Result};
use articleforge_common::events::{EventSink, Outbox};
use articleforge_common::ids::Msid;
use articleforge_common::validate::status_key_of;
use articleforge_common::{DbPool, SchemaRegistry, XML2JSON_KEY};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::merge;
use crate::relations;

/// Merge priority of the primordial fragment. Fragments added
/// through the API default to a higher position so they override it.
pub const XML2JSON_POSITION: i32 = 0;

/// Outcome status of a state-machine transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionStatus {
    Ingested,
    Published,
}

/// Status record produced by every transition, including dry runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionReport {
    pub status: TransitionStatus,
    pub id: Msid,
    pub datetime: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Expected manuscript id; mismatch with the document is rejected
    pub msid: Option<Msid>,
    /// Expected version; mismatch with the document is rejected
    pub version: Option<i32>,
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub msid: Msid,
    pub version: i32,
    /// Publication timestamp; defaults to now
    pub when: Option<DateTime<Utc>>,
    pub force: bool,
    pub dry_run: bool,
}

/// The identifying fields every ingestable document must carry.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub msid: Msid,
    pub version: i32,
    pub status: ArticleStatus,
    pub volume: Option<i32>,
    pub article_type: Option<String>,
}

/// Extract the identifying fields from an article-json document.
///
/// A document that cannot identify itself is structurally unusable —
/// a `Parse` error, never a validation failure.
pub fn parse_document_meta(doc: &Value) -> Result<DocumentMeta> {
    let msid = match doc.get("id") {
        Some(Value::String(raw)) => raw
            .trim_start_matches('0')
            .parse::<Msid>()
            .ok()
            .filter(|m| *m > 0),
        Some(Value::Number(n)) => n.as_i64().filter(|m| *m > 0),
        _ => None,
    }
    .ok_or_else(|| AppError::Parse {
        message: "document has no usable top-level 'id'".to_string(),
    })?;

    let version = doc
        .get("version")
        .and_then(Value::as_i64)
        .filter(|v| *v >= 1 && *v <= i32::MAX as i64)
        .ok_or_else(|| AppError::Parse {
            message: "document has no usable top-level 'version'".to_string(),
        })? as i32;

    let status = status_key_of(doc)?;

    Ok(DocumentMeta {
        msid,
        version,
        status,
        volume: doc.get("volume").and_then(Value::as_i64).map(|v| v as i32),
        article_type: doc.get("type").and_then(Value::as_str).map(str::to_string),
    })
}

// ============================================================================
// Transition guards
// ============================================================================

/// Whether an ingest of (msid, version) may proceed.
///
/// Versions are strictly sequential: version N requires version N-1
/// to exist and, for a standard ingest, to be published. A published
/// version may only be rewritten under `force`.
pub fn check_ingest_allowed(
    msid: Msid,
    version: i32,
    existing: Option<&ArticleVersion>,
    previous: Option<&ArticleVersion>,
    force: bool,
) -> Result<()> {
    if let Some(existing) = existing {
        if existing.is_published() && !force {
            return Err(AppError::AlreadyPublished { msid, version });
        }
    }

    if version > 1 {
        match previous {
            None => return Err(AppError::PreviousVersionDne { msid, version }),
            Some(previous) if !previous.is_published() && !force => {
                return Err(AppError::PreviousVersionUnpublished { msid, version });
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Whether a publish of (msid, version) may proceed; returns the row
/// to publish.
pub fn check_publish_allowed(
    msid: Msid,
    version: i32,
    existing: Option<ArticleVersion>,
    force: bool,
) -> Result<ArticleVersion> {
    let av = existing.ok_or_else(|| {
        AppError::no_record("article version", format!("{}/{}", msid, version))
    })?;

    if av.is_published() && !force {
        return Err(AppError::AlreadyPublished { msid, version });
    }

    Ok(av)
}

// ============================================================================
// Transitions
// ============================================================================

/// Ingest an article-json document: create or update the article and
/// version rows, rewrite the primordial fragment, rebuild relations,
/// and re-render the stored representation.
///
/// Never sets `datetime_published` — publication dates surface only
/// through the merge pipeline.
pub async fn ingest(
    db: &DbPool,
    registry: &SchemaRegistry,
    sink: &EventSink,
    config: &AppConfig,
    doc: &Value,
    opts: &IngestOptions,
) -> Result<TransitionReport> {
    let txn = db.write().begin().await?;
    let mut outbox = Outbox::new();

    // An error drops the transaction, rolling every write back.
    let (report, _meta) = ingest_in(&txn, registry, config, doc, opts, &mut outbox).await?;
    finish(txn, outbox, sink, opts.dry_run).await?;

    Ok(report)
}

/// Publish a previously-ingested article version.
pub async fn publish(
    db: &DbPool,
    registry: &SchemaRegistry,
    sink: &EventSink,
    opts: &PublishOptions,
) -> Result<TransitionReport> {
    let txn = db.write().begin().await?;
    let mut outbox = Outbox::new();

    let report = publish_in(&txn, registry, opts, &mut outbox).await?;
    finish(txn, outbox, sink, opts.dry_run).await?;

    Ok(report)
}

/// Atomic ingest-then-publish with a shared `force` flag: either both
/// transitions apply or neither is observable.
pub async fn ingest_publish(
    db: &DbPool,
    registry: &SchemaRegistry,
    sink: &EventSink,
    config: &AppConfig,
    doc: &Value,
    opts: &IngestOptions,
) -> Result<TransitionReport> {
    let txn = db.write().begin().await?;
    let mut outbox = Outbox::new();

    let (_ingest_report, meta) = ingest_in(&txn, registry, config, doc, opts, &mut outbox).await?;
    let publish_opts = PublishOptions {
        msid: meta.msid,
        version: meta.version,
        when: None,
        force: opts.force,
        dry_run: opts.dry_run,
    };
    let report = publish_in(&txn, registry, &publish_opts, &mut outbox).await?;
    finish(txn, outbox, sink, opts.dry_run).await?;

    Ok(report)
}

async fn ingest_in(
    txn: &DatabaseTransaction,
    registry: &SchemaRegistry,
    config: &AppConfig,
    doc: &Value,
    opts: &IngestOptions,
    outbox: &mut Outbox,
) -> Result<(TransitionReport, DocumentMeta)> {
    let meta = parse_document_meta(doc)?;

    if let Some(expected) = opts.msid {
        if expected != meta.msid {
            return Err(AppError::BadRequest {
                message: format!(
                    "document id {} does not match the requested manuscript id {}",
                    meta.msid, expected
                ),
            });
        }
    }
    if let Some(expected) = opts.version {
        if expected != meta.version {
            return Err(AppError::BadRequest {
                message: format!(
                    "document version {} does not match the requested version {}",
                    meta.version, expected
                ),
            });
        }
    }

    let journal = repository::get_or_create_journal(txn, &config.journal).await?;
    repository::upsert_article(
        txn,
        meta.msid,
        journal.id,
        meta.volume,
        meta.article_type.clone(),
    )
    .await?;

    let existing = repository::find_version(txn, meta.msid, meta.version).await?;
    let previous = if meta.version > 1 {
        repository::find_version(txn, meta.msid, meta.version - 1).await?
    } else {
        None
    };
    check_ingest_allowed(
        meta.msid,
        meta.version,
        existing.as_ref(),
        previous.as_ref(),
        opts.force,
    )?;

    let av = repository::upsert_version(txn, meta.msid, meta.version, meta.status).await?;

    // The primordial fragment is article-scoped and rewritten on
    // every ingest.
    repository::upsert_fragment(
        txn,
        meta.msid,
        XML2JSON_KEY,
        None,
        doc.clone(),
        XML2JSON_POSITION,
    )
    .await?;

    relations::rebuild_relations(txn, config, &av, doc).await?;

    // Quiet: an ingest whose document has no valid representation
    // still succeeds, with the stored article-json cleared.
    merge::set_article_json(txn, registry, &av, true, true).await?;
    refresh_sibling_versions(txn, registry, &av).await?;

    outbox.push(meta.msid);
    metrics::counter!("articleforge_ingests_total").increment(1);
    info!(
        msid = meta.msid,
        version = meta.version,
        force = opts.force,
        "article version ingested"
    );

    let report = TransitionReport {
        status: TransitionStatus::Ingested,
        id: meta.msid,
        datetime: format_utc(&Utc::now()),
    };
    Ok((report, meta))
}

async fn publish_in(
    txn: &DatabaseTransaction,
    registry: &SchemaRegistry,
    opts: &PublishOptions,
    outbox: &mut Outbox,
) -> Result<TransitionReport> {
    let existing = repository::find_version(txn, opts.msid, opts.version).await?;
    let av = check_publish_allowed(opts.msid, opts.version, existing, opts.force)?;

    let when = opts.when.unwrap_or_else(Utc::now);
    let av = repository::set_datetime_published(txn, av, when).await?;

    // Loud: a version that cannot produce a valid representation
    // cannot be published.
    merge::set_article_json(txn, registry, &av, false, false).await?;
    refresh_sibling_versions(txn, registry, &av).await?;

    outbox.push(opts.msid);
    metrics::counter!("articleforge_publishes_total").increment(1);
    info!(
        msid = opts.msid,
        version = opts.version,
        force = opts.force,
        "article version published"
    );

    Ok(TransitionReport {
        status: TransitionStatus::Published,
        id: opts.msid,
        datetime: format_utc(&when),
    })
}

/// Re-render every other version of the article: publishing or
/// correcting one version shifts the derived date fields of its
/// siblings.
async fn refresh_sibling_versions<C: ConnectionTrait>(
    conn: &C,
    registry: &SchemaRegistry,
    av: &ArticleVersion,
) -> Result<()> {
    for sibling in repository::list_versions(conn, av.article_id, false).await? {
        if sibling.id != av.id {
            merge::set_article_json(conn, registry, &sibling, true, true).await?;
        }
    }
    Ok(())
}

async fn finish(
    txn: DatabaseTransaction,
    outbox: Outbox,
    sink: &EventSink,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        txn.rollback().await?;
        debug!("dry run, transaction rolled back");
    } else {
        txn.commit().await?;
        // Notifications only after the transaction is durable.
        outbox.drain(sink).await;
    }
    Ok(())
}

fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn version_row(version: i32, published: bool) -> ArticleVersion {
        let now = Utc::now();
        ArticleVersion {
            id: Uuid::new_v4(),
            article_id: 9560,
            version,
            status: "poa".to_string(),
            datetime_published: published.then(|| now.into()),
            article_json: None,
            article_json_snippet: None,
            article_json_hash: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_parse_document_meta() {
        let doc = json!({
            "id": "09560",
            "version": 1,
            "status": "poa",
            "volume": 4,
            "type": "research-article"
        });
        let meta = parse_document_meta(&doc).unwrap();
        assert_eq!(meta.msid, 9560);
        assert_eq!(meta.version, 1);
        assert_eq!(meta.status, ArticleStatus::Poa);
        assert_eq!(meta.volume, Some(4));
        assert_eq!(meta.article_type.as_deref(), Some("research-article"));
    }

    #[test]
    fn test_unusable_document_is_parse_error() {
        for doc in [
            json!({"version": 1, "status": "poa"}),
            json!({"id": "09560", "status": "poa"}),
            json!({"id": "09560", "version": 0, "status": "poa"}),
            json!({"id": "09560", "version": 1}),
        ] {
            assert!(
                matches!(parse_document_meta(&doc), Err(AppError::Parse { .. })),
                "expected Parse error for {}",
                doc
            );
        }
    }

    #[test]
    fn test_ingest_v1_always_sequenced() {
        assert!(check_ingest_allowed(9560, 1, None, None, false).is_ok());
    }

    #[test]
    fn test_ingest_v2_without_v1_fails() {
        let err = check_ingest_allowed(9560, 2, None, None, false).unwrap_err();
        assert!(matches!(err, AppError::PreviousVersionDne { version: 2, .. }));
    }

    #[test]
    fn test_ingest_v3_skipping_v2_fails() {
        // v1 exists and is published, v2 does not exist.
        let err = check_ingest_allowed(9560, 3, None, None, false).unwrap_err();
        assert!(matches!(err, AppError::PreviousVersionDne { version: 3, .. }));
    }

    #[test]
    fn test_ingest_v2_with_unpublished_v1_fails_unless_forced() {
        let v1 = version_row(1, false);
        let err = check_ingest_allowed(9560, 2, None, Some(&v1), false).unwrap_err();
        assert!(matches!(err, AppError::PreviousVersionUnpublished { .. }));

        assert!(check_ingest_allowed(9560, 2, None, Some(&v1), true).is_ok());
    }

    #[test]
    fn test_ingest_v2_with_published_v1_is_allowed() {
        let v1 = version_row(1, true);
        assert!(check_ingest_allowed(9560, 2, None, Some(&v1), false).is_ok());
    }

    #[test]
    fn test_reingest_published_version_requires_force() {
        let v1 = version_row(1, true);
        let err = check_ingest_allowed(9560, 1, Some(&v1), None, false).unwrap_err();
        assert!(matches!(err, AppError::AlreadyPublished { version: 1, .. }));

        assert!(check_ingest_allowed(9560, 1, Some(&v1), None, true).is_ok());
    }

    #[test]
    fn test_reingest_unpublished_version_is_not_a_conflict() {
        // Re-ingesting identical content into an unpublished version
        // is not guarded; only "already published and new write
        // requested" is.
        let v1 = version_row(1, false);
        assert!(check_ingest_allowed(9560, 1, Some(&v1), None, false).is_ok());
    }

    #[test]
    fn test_publish_requires_prior_ingest() {
        let err = check_publish_allowed(9560, 1, None, false).unwrap_err();
        assert!(matches!(err, AppError::NoRecord { .. }));
    }

    #[test]
    fn test_publish_already_published_requires_force() {
        let v1 = version_row(1, true);
        let err = check_publish_allowed(9560, 1, Some(v1.clone()), false).unwrap_err();
        assert!(matches!(err, AppError::AlreadyPublished { .. }));

        // Forced publish overwrites the timestamp.
        assert!(check_publish_allowed(9560, 1, Some(v1), true).is_ok());
    }

    #[test]
    fn test_transition_report_shape() {
        let report = TransitionReport {
            status: TransitionStatus::Published,
            id: 9560,
            datetime: "2016-08-16T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "published");
        assert_eq!(json["id"], 9560);
        assert_eq!(json["datetime"], "2016-08-16T00:00:00Z");
    }
}
