//! Fragment merge engine
//!
//! Core logic for producing an article version's canonical document:
//! deep-merging its ordered fragments, deriving the publication date
//! fields, projecting the list-view snippet, and persisting the
//! result with a content hash for the idempotence short-circuit.

use articleforge_common::db::models::{ArticleFragment, ArticleStatus, ArticleVersion};
use articleforge_common::db::repository;
use articleforge_common::errors::{AppError, Result};
use articleforge_common::validate::{status_key_of, validate};
use articleforge_common::SchemaRegistry;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::ConnectionTrait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

/// Keys never exposed externally, stripped after the date fields are
/// derived.
const INTERNAL_KEYS: &[&str] = &[
    "-meta",
    "-history",
    "-related-articles-internal",
    "-related-articles-external",
    "-related-articles-reviewed-preprints",
];

/// Top-level keys projected into the list-view snippet.
const SNIPPET_KEYS: &[&str] = &[
    "abstract",
    "authorLine",
    "copyright",
    "doi",
    "elocationId",
    "id",
    "image",
    "impactStatement",
    "pdf",
    "published",
    "researchOrganisms",
    "stage",
    "status",
    "statusDate",
    "subjects",
    "title",
    "titlePrefix",
    "type",
    "version",
    "versionDate",
    "volume",
];

// ============================================================================
// Pure merge algorithm
// ============================================================================

/// Recursively merge `overlay` into `base`: object keys merge at
/// every depth, any other value fully replaces.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(slot) if slot.is_object() && value.is_object() => {
                        deep_merge(slot, value);
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Merge fragments left-to-right; later fragments override earlier
/// ones. The caller supplies them already ordered by position then
/// insertion sequence.
///
/// An article version with no fragments cannot be merged.
pub fn merge_fragments(fragments: &[ArticleFragment], msid: i64) -> Result<Value> {
    if fragments.is_empty() {
        return Err(AppError::no_record("article fragments", msid));
    }

    let mut doc = Value::Object(Map::new());
    for fragment in fragments {
        deep_merge(&mut doc, &fragment.fragment);
    }
    Ok(doc)
}

// ============================================================================
// Derived fields
// ============================================================================

/// The surrounding state needed to derive one version's publication
/// date fields.
#[derive(Debug, Clone)]
pub struct VersionContext {
    pub version: i32,
    pub status: ArticleStatus,
    /// This version's publication timestamp
    pub datetime_published: Option<DateTimeWithTimeZone>,
    /// The article's version-1 publication timestamp
    pub v1_published: Option<DateTimeWithTimeZone>,
    /// Publication timestamp of the article's earliest VOR version;
    /// outer `None` when no VOR exists in the article's history
    pub earliest_vor_published: Option<Option<DateTimeWithTimeZone>>,
}

fn format_timestamp(dt: &DateTimeWithTimeZone) -> String {
    dt.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn set_date_field(doc: &mut Map<String, Value>, key: &str, value: Option<&DateTimeWithTimeZone>) {
    match value {
        Some(dt) => {
            doc.insert(key.to_string(), Value::String(format_timestamp(dt)));
        }
        None => {
            doc.remove(key);
        }
    }
}

/// Inject the derived `published`, `versionDate`, `statusDate`, and
/// `stage` fields, then strip internal-only keys.
pub fn pre_process(ctx: &VersionContext, mut doc: Value) -> Value {
    let map = match doc {
        Value::Object(ref mut map) => map,
        // A non-object document cannot carry the derived fields;
        // validation rejects it downstream.
        _ => return doc,
    };

    // Version 1 carries its own date; later versions inherit the
    // article's original publication date.
    let published = if ctx.version == 1 {
        ctx.datetime_published
    } else {
        ctx.v1_published
    };

    // POA versions (and v1) date their status from the article's
    // publication; VOR versions date it from the earliest VOR. When
    // no VOR exists yet, this version is the earliest VOR-to-be.
    let status_date = if ctx.version == 1 || ctx.status == ArticleStatus::Poa {
        published
    } else {
        match ctx.earliest_vor_published {
            Some(earliest) => earliest,
            None => ctx.datetime_published,
        }
    };

    set_date_field(map, "published", published.as_ref());
    set_date_field(map, "versionDate", ctx.datetime_published.as_ref());
    set_date_field(map, "statusDate", status_date.as_ref());

    if ctx.datetime_published.is_some() {
        map.insert("stage".to_string(), Value::String("published".to_string()));
    } else {
        map.insert("stage".to_string(), Value::String("preview".to_string()));
        map.remove("versionDate");
        map.remove("statusDate");
        if ctx.version == 1 {
            map.remove("published");
        }
    }

    for key in INTERNAL_KEYS {
        map.remove(*key);
    }

    doc
}

/// Project the fixed allow-list of top-level keys for list views.
pub fn extract_snippet(doc: &Value) -> Option<Value> {
    let map = doc.as_object()?;
    if map.is_empty() {
        return None;
    }

    let mut snippet = Map::new();
    for key in SNIPPET_KEYS {
        if let Some(value) = map.get(*key) {
            snippet.insert((*key).to_string(), value.clone());
        }
    }
    Some(Value::Object(snippet))
}

// ============================================================================
// Content hash
// ============================================================================

/// Stable content hash of a document, independent of object key
/// order.
pub fn content_hash(doc: &Value) -> Result<String> {
    let mut canonical = String::new();
    write_canonical(doc, &mut canonical)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

// ============================================================================
// Database-backed pipeline
// ============================================================================

/// Build the context for deriving one version's date fields.
pub async fn version_context<C: ConnectionTrait>(
    conn: &C,
    av: &ArticleVersion,
) -> Result<VersionContext> {
    let status = av.article_status()?;

    let v1_published = if av.version == 1 {
        av.datetime_published
    } else {
        repository::find_version(conn, av.article_id, 1)
            .await?
            .and_then(|v1| v1.datetime_published)
    };

    let earliest_vor_published =
        repository::earliest_version_with_status(conn, av.article_id, ArticleStatus::Vor)
            .await?
            .map(|earliest| {
                if earliest.id == av.id {
                    av.datetime_published
                } else {
                    earliest.datetime_published
                }
            });

    Ok(VersionContext {
        version: av.version,
        status,
        datetime_published: av.datetime_published,
        v1_published,
        earliest_vor_published,
    })
}

/// Merge the version's fragments and derive its computed fields.
pub async fn merge_document<C: ConnectionTrait>(conn: &C, av: &ArticleVersion) -> Result<Value> {
    let fragments = repository::fragments_for_merge(conn, av.article_id, av.version).await?;
    let merged = merge_fragments(&fragments, av.article_id)?;
    let ctx = version_context(conn, av).await?;
    metrics::counter!("articleforge_merges_total").increment(1);
    Ok(pre_process(&ctx, merged))
}

/// Merge, derive, and validate. Returns `None` under `quiet` when no
/// schema version accepts the document; a document whose own status
/// cannot be determined is a hard error regardless of `quiet`.
pub async fn merge_if_valid<C: ConnectionTrait>(
    conn: &C,
    registry: &SchemaRegistry,
    av: &ArticleVersion,
    quiet: bool,
) -> Result<Option<Value>> {
    let doc = merge_document(conn, av).await?;
    let status = status_key_of(&doc)?;

    match validate(registry, &doc, status.as_str(), quiet)? {
        Some(schema_version) => {
            debug!(
                msid = av.article_id,
                version = av.version,
                status = status.as_str(),
                schema_version,
                "article document validated"
            );
            Ok(Some(doc))
        }
        None => {
            metrics::counter!("articleforge_validation_failures_total").increment(1);
            Ok(None)
        }
    }
}

/// Outcome of [`set_article_json`].
#[derive(Debug)]
pub enum SetOutcome {
    /// A valid document was produced and persisted
    Updated(Value),
    /// The merged document is byte-identical to the stored one;
    /// nothing was written
    Identical,
    /// No schema version accepts the document; the stored
    /// representation was cleared
    Cleared,
}

/// Run the merge pipeline for one version and persist
/// `{document, snippet, hash}` on it.
///
/// With `hash_check`, an unchanged document short-circuits without a
/// write — a distinct outcome from success or validation failure.
/// Total invalidation clears the stored document (the version is no
/// longer servable) and logs a critical condition rather than
/// failing.
pub async fn set_article_json<C: ConnectionTrait>(
    conn: &C,
    registry: &SchemaRegistry,
    av: &ArticleVersion,
    quiet: bool,
    hash_check: bool,
) -> Result<SetOutcome> {
    match merge_if_valid(conn, registry, av, quiet).await? {
        Some(doc) => {
            let hash = content_hash(&doc)?;
            if hash_check && av.article_json_hash.as_deref() == Some(hash.as_str()) {
                debug!(
                    msid = av.article_id,
                    version = av.version,
                    "merged document unchanged, skipping write"
                );
                return Ok(SetOutcome::Identical);
            }

            let snippet = match extract_snippet(&doc) {
                Some(snippet) => match validate(registry, &snippet, "list", quiet)? {
                    Some(_) => Some(snippet),
                    None => {
                        warn!(
                            msid = av.article_id,
                            version = av.version,
                            "snippet rejected by the list schema, storing without one"
                        );
                        None
                    }
                },
                None => None,
            };

            repository::store_article_json(conn, av.clone(), Some(doc.clone()), snippet, Some(hash))
                .await?;
            Ok(SetOutcome::Updated(doc))
        }
        None => {
            error!(
                msid = av.article_id,
                version = av.version,
                "no valid representation for article version, clearing stored article-json"
            );
            repository::store_article_json(conn, av.clone(), None, None, None).await?;
            Ok(SetOutcome::Cleared)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;
    use uuid::Uuid;

    fn frag(position: i32, sequence: i64, body: Value) -> ArticleFragment {
        let now = Utc::now().into();
        ArticleFragment {
            id: Uuid::new_v4(),
            article_id: 3,
            fragment_type: format!("frag-{}", sequence),
            version: None,
            fragment: body,
            position,
            sequence,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(raw: &str) -> DateTimeWithTimeZone {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    #[test]
    fn test_later_fragment_overrides_earlier() {
        let fragments = vec![
            frag(1, 1, json!({"title": "foo"})),
            frag(2, 2, json!({"title": "bar"})),
            frag(3, 3, json!({"title": "baz"})),
        ];
        let doc = merge_fragments(&fragments, 3).unwrap();
        assert_eq!(doc, json!({"title": "baz"}));
    }

    #[test]
    fn test_non_overlapping_keys_accumulate() {
        let fragments = vec![
            frag(1, 1, json!({"title": "foo"})),
            frag(2, 2, json!({"body": "bar"})),
            frag(3, 3, json!({"foot": "baz"})),
        ];
        let doc = merge_fragments(&fragments, 3).unwrap();
        assert_eq!(doc, json!({"title": "foo", "body": "bar", "foot": "baz"}));
    }

    #[test]
    fn test_merge_recurses_into_objects_and_replaces_scalars() {
        let mut base = json!({
            "image": {"banner": {"uri": "a"}, "thumbnail": {"uri": "b"}},
            "subjects": ["cell-biology"]
        });
        deep_merge(
            &mut base,
            &json!({
                "image": {"banner": {"uri": "c"}},
                "subjects": ["neuroscience"]
            }),
        );
        assert_eq!(
            base,
            json!({
                "image": {"banner": {"uri": "c"}, "thumbnail": {"uri": "b"}},
                "subjects": ["neuroscience"]
            })
        );
    }

    #[test]
    fn test_merge_is_deterministic() {
        let fragments = vec![
            frag(1, 1, json!({"title": "foo", "nested": {"a": 1}})),
            frag(2, 2, json!({"nested": {"b": 2}, "volume": 5})),
        ];
        let first = merge_fragments(&fragments, 3).unwrap();
        let second = merge_fragments(&fragments, 3).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            content_hash(&first).unwrap(),
            content_hash(&second).unwrap()
        );
    }

    #[test]
    fn test_zero_fragments_is_no_record() {
        let err = merge_fragments(&[], 3).unwrap_err();
        assert!(matches!(err, AppError::NoRecord { .. }));
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        // Same content expressed through different merge paths.
        let mut a = json!({});
        deep_merge(&mut a, &json!({"title": "x"}));
        deep_merge(&mut a, &json!({"volume": 5}));

        let mut b = json!({});
        deep_merge(&mut b, &json!({"volume": 5}));
        deep_merge(&mut b, &json!({"title": "x"}));

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
        assert_ne!(
            content_hash(&a).unwrap(),
            content_hash(&json!({"title": "y", "volume": 5})).unwrap()
        );
    }

    #[test]
    fn test_pre_process_v1_poa() {
        let ctx = VersionContext {
            version: 1,
            status: ArticleStatus::Poa,
            datetime_published: Some(date("2016-08-16T00:00:00+00:00")),
            v1_published: Some(date("2016-08-16T00:00:00+00:00")),
            earliest_vor_published: None,
        };
        let doc = pre_process(&ctx, json!({"title": "x"}));
        assert_eq!(doc["published"], "2016-08-16T00:00:00Z");
        assert_eq!(doc["versionDate"], "2016-08-16T00:00:00Z");
        assert_eq!(doc["statusDate"], "2016-08-16T00:00:00Z");
        assert_eq!(doc["stage"], "published");
    }

    #[test]
    fn test_pre_process_vor_status_date_tracks_earliest_vor() {
        // v1 POA published on the 16th, this v2 VOR published on the
        // 17th and is itself the earliest VOR.
        let ctx = VersionContext {
            version: 2,
            status: ArticleStatus::Vor,
            datetime_published: Some(date("2016-08-17T00:00:00+00:00")),
            v1_published: Some(date("2016-08-16T00:00:00+00:00")),
            earliest_vor_published: Some(Some(date("2016-08-17T00:00:00+00:00"))),
        };
        let doc = pre_process(&ctx, json!({"title": "x"}));
        assert_eq!(doc["published"], "2016-08-16T00:00:00Z");
        assert_eq!(doc["versionDate"], "2016-08-17T00:00:00Z");
        assert_eq!(doc["statusDate"], "2016-08-17T00:00:00Z");
    }

    #[test]
    fn test_pre_process_later_vor_keeps_earliest_vor_status_date() {
        // v3 VOR; the earliest VOR (v2) was published on the 17th.
        let ctx = VersionContext {
            version: 3,
            status: ArticleStatus::Vor,
            datetime_published: Some(date("2016-09-01T00:00:00+00:00")),
            v1_published: Some(date("2016-08-16T00:00:00+00:00")),
            earliest_vor_published: Some(Some(date("2016-08-17T00:00:00+00:00"))),
        };
        let doc = pre_process(&ctx, json!({"title": "x"}));
        assert_eq!(doc["statusDate"], "2016-08-17T00:00:00Z");
        assert_eq!(doc["versionDate"], "2016-09-01T00:00:00Z");
    }

    #[test]
    fn test_pre_process_vor_with_no_prior_vor_uses_own_date() {
        let ctx = VersionContext {
            version: 2,
            status: ArticleStatus::Vor,
            datetime_published: Some(date("2016-08-17T00:00:00+00:00")),
            v1_published: Some(date("2016-08-16T00:00:00+00:00")),
            earliest_vor_published: None,
        };
        let doc = pre_process(&ctx, json!({"title": "x"}));
        assert_eq!(doc["statusDate"], "2016-08-17T00:00:00Z");
    }

    #[test]
    fn test_pre_process_preview_strips_dates() {
        let ctx = VersionContext {
            version: 1,
            status: ArticleStatus::Poa,
            datetime_published: None,
            v1_published: None,
            earliest_vor_published: None,
        };
        let doc = pre_process(&ctx, json!({"title": "x"}));
        assert_eq!(doc["stage"], "preview");
        assert!(doc.get("published").is_none());
        assert!(doc.get("versionDate").is_none());
        assert!(doc.get("statusDate").is_none());
    }

    #[test]
    fn test_pre_process_preview_non_v1_keeps_published_but_not_status_date() {
        // Unpublished v2 of an article whose v1 (and earliest VOR)
        // are published: readers may know the article's publication
        // date, but not dates of this not-yet-published version.
        let ctx = VersionContext {
            version: 2,
            status: ArticleStatus::Vor,
            datetime_published: None,
            v1_published: Some(date("2016-08-16T00:00:00+00:00")),
            earliest_vor_published: Some(Some(date("2016-08-17T00:00:00+00:00"))),
        };
        let doc = pre_process(&ctx, json!({"title": "x"}));
        assert_eq!(doc["stage"], "preview");
        assert_eq!(doc["published"], "2016-08-16T00:00:00Z");
        assert!(doc.get("versionDate").is_none());
        assert!(doc.get("statusDate").is_none());
    }

    #[test]
    fn test_pre_process_strips_internal_keys() {
        let ctx = VersionContext {
            version: 1,
            status: ArticleStatus::Poa,
            datetime_published: Some(date("2016-08-16T00:00:00+00:00")),
            v1_published: Some(date("2016-08-16T00:00:00+00:00")),
            earliest_vor_published: None,
        };
        let doc = pre_process(
            &ctx,
            json!({
                "title": "x",
                "-meta": {"location": "s3://..."},
                "-history": {"received": "2016-01-01"},
                "-related-articles-internal": [9561],
                "-related-articles-external": [{"uri": "https://example.org"}],
                "-related-articles-reviewed-preprints": [{"uri": "https://example.org/rp"}]
            }),
        );
        for key in INTERNAL_KEYS {
            assert!(doc.get(*key).is_none(), "{} survived pre_process", key);
        }
        assert_eq!(doc["title"], "x");
    }

    #[test]
    fn test_snippet_projects_allow_list_only() {
        let doc = json!({
            "id": "09560",
            "title": "x",
            "status": "poa",
            "body": [{"type": "section"}],
            "references": [],
            "stage": "published"
        });
        let snippet = extract_snippet(&doc).unwrap();
        assert_eq!(snippet["id"], "09560");
        assert_eq!(snippet["title"], "x");
        assert_eq!(snippet["stage"], "published");
        assert!(snippet.get("body").is_none());
        assert!(snippet.get("references").is_none());
    }

    #[test]
    fn test_snippet_of_empty_or_non_object_is_none() {
        assert!(extract_snippet(&json!({})).is_none());
        assert!(extract_snippet(&Value::Null).is_none());
        assert!(extract_snippet(&json!([1, 2])).is_none());
    }
}
