//! Relationship resolver
//!
//! Computes internal, external, and reviewed-preprint relationships
//! for an article version. Relations are owned by the ingest path and
//! rebuilt wholesale (delete-then-recreate) inside its transaction.

use articleforge_common::config::AppConfig;
use articleforge_common::db::models::{Article, ArticleVersion};
use articleforge_common::db::repository;
use articleforge_common::errors::{AppError, Result};
use articleforge_common::ids::Msid;
use sea_orm::ConnectionTrait;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Manuscript ids named by the document's internal-relation list.
/// Entries may be numbers or zero-padded strings; anything else is a
/// structural error.
pub fn parse_internal_targets(doc: &Value) -> Result<Vec<Msid>> {
    let Some(entries) = doc.get("-related-articles-internal") else {
        return Ok(Vec::new());
    };
    let entries = entries.as_array().ok_or_else(|| AppError::Parse {
        message: "'-related-articles-internal' is not a list".to_string(),
    })?;

    let mut msids = Vec::with_capacity(entries.len());
    for entry in entries {
        let msid = match entry {
            Value::Number(n) => n.as_i64().filter(|m| *m > 0),
            Value::String(raw) => raw
                .trim_start_matches('0')
                .parse::<Msid>()
                .ok()
                .filter(|m| *m > 0),
            _ => None,
        }
        .ok_or_else(|| AppError::Parse {
            message: format!("bad internal relation target: {}", entry),
        })?;

        // The same pair related twice creates a single edge.
        if !msids.contains(&msid) {
            msids.push(msid);
        }
    }
    Ok(msids)
}

/// The URI a citation or reviewed-preprint record must carry.
pub fn relation_uri(record: &Value) -> Result<&str> {
    record
        .as_object()
        .and_then(|map| map.get("uri"))
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| AppError::Parse {
            message: "relation record has no 'uri'".to_string(),
        })
}

/// Replace every relation owned by this version with the ones named
/// in the document.
pub async fn rebuild_relations<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    av: &ArticleVersion,
    doc: &Value,
) -> Result<()> {
    repository::delete_relations_for_version(conn, av.id).await?;

    for target in parse_internal_targets(doc)? {
        relate_to_msid(conn, config, av.id, target, false).await?;
    }

    if let Some(citations) = doc
        .get("-related-articles-external")
        .and_then(Value::as_array)
    {
        for citation in citations {
            associate_external(conn, av.id, citation).await?;
        }
    }

    if let Some(records) = doc
        .get("-related-articles-reviewed-preprints")
        .and_then(Value::as_array)
    {
        for record in records {
            relation_uri(record)?;
            repository::insert_rp_relation(conn, av.id, record.clone()).await?;
        }
    }

    Ok(())
}

/// Create an internal relation edge to `msid`, creating a stub
/// article when the target does not exist and stubs are enabled.
///
/// With stubs disabled, a missing target is a `NoRecord` failure, or
/// a logged warning under `quiet`. Returns whether an edge was
/// created.
pub async fn relate_to_msid<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    version_id: Uuid,
    msid: Msid,
    quiet: bool,
) -> Result<bool> {
    let target = match repository::find_article(conn, msid).await? {
        Some(article) => article,
        None if config.features.related_article_stubs => {
            warn!(msid, "creating stub article for relation target");
            let journal = repository::get_or_create_journal(conn, &config.journal).await?;
            repository::create_stub_article(conn, msid, journal.id).await?
        }
        None if quiet => {
            warn!(msid, "skipping relation to unknown article");
            return Ok(false);
        }
        None => return Err(AppError::no_record("related article", msid)),
    };

    repository::insert_internal_relation(conn, version_id, target.manuscript_id).await?;
    Ok(true)
}

/// Attach an external citation, upserted by (version, uri).
pub async fn associate_external<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
    citation: &Value,
) -> Result<()> {
    let uri = relation_uri(citation)?;
    repository::upsert_ext_relation(conn, version_id, uri, citation.clone()).await?;
    Ok(())
}

/// All articles internally related to this version: forward edges
/// (this version points at them) plus reverse edges (any of their
/// versions points at this article), deduplicated and sorted
/// ascending by manuscript id.
pub async fn internal_relationships_for<C: ConnectionTrait>(
    conn: &C,
    av: &ArticleVersion,
) -> Result<Vec<Article>> {
    let mut msids = repository::forward_related_msids(conn, av.id).await?;
    msids.extend(repository::reverse_related_msids(conn, av.article_id).await?);

    msids.retain(|msid| *msid != av.article_id);
    msids.sort_unstable();
    msids.dedup();

    repository::articles_by_msids(conn, msids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_internal_targets() {
        let doc = json!({
            "-related-articles-internal": ["09561", 12, "09561"]
        });
        assert_eq!(parse_internal_targets(&doc).unwrap(), vec![9561, 12]);
    }

    #[test]
    fn test_parse_internal_targets_absent_is_empty() {
        assert!(parse_internal_targets(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_parse_internal_targets_rejects_garbage() {
        for doc in [
            json!({"-related-articles-internal": "09561"}),
            json!({"-related-articles-internal": [true]}),
            json!({"-related-articles-internal": ["not-an-id"]}),
            json!({"-related-articles-internal": [0]}),
        ] {
            assert!(
                matches!(parse_internal_targets(&doc), Err(AppError::Parse { .. })),
                "expected Parse error for {}",
                doc
            );
        }
    }

    #[test]
    fn test_relation_uri_required() {
        assert_eq!(
            relation_uri(&json!({"uri": "https://example.org/x", "type": "external-article"}))
                .unwrap(),
            "https://example.org/x"
        );
        assert!(relation_uri(&json!({"type": "external-article"})).is_err());
        assert!(relation_uri(&json!({"uri": ""})).is_err());
        assert!(relation_uri(&json!("https://example.org/x")).is_err());
    }
}
