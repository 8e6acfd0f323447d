//! Query functions over the article store.
//!
//! Plain async functions generic over the connection, so the same
//! queries run inside or outside a transaction. No behavior lives on
//! the entity models themselves.

use crate::config::JournalConfig;
use crate::errors::{AppError, Result};
use crate::ids::{msid_to_doi, Msid};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value;
use uuid::Uuid;

use super::models::*;

fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    Utc::now().into()
}

// ============================================================================
// Journal Operations
// ============================================================================

/// Find journal by name
pub async fn find_journal_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<Journal>> {
    JournalEntity::find()
        .filter(JournalColumn::Name.eq(name))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Get the configured journal, creating it lazily on first reference
pub async fn get_or_create_journal<C: ConnectionTrait>(
    conn: &C,
    config: &JournalConfig,
) -> Result<Journal> {
    if let Some(journal) = find_journal_by_name(conn, &config.name).await? {
        return Ok(journal);
    }

    let inception = config
        .inception
        .as_deref()
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw).map_err(|e| AppError::Configuration {
                message: format!("bad journal inception date {:?}: {}", raw, e),
            })
        })
        .transpose()?;

    let journal = JournalActiveModel {
        name: Set(config.name.clone()),
        inception: Set(inception),
        ..Default::default()
    };

    journal.insert(conn).await.map_err(Into::into)
}

// ============================================================================
// Article Operations
// ============================================================================

/// Find article by manuscript id
pub async fn find_article<C: ConnectionTrait>(conn: &C, msid: Msid) -> Result<Option<Article>> {
    ArticleEntity::find_by_id(msid)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Create or update an article row. The DOI is derived, never stored
/// from input; submission metadata is left untouched on update.
pub async fn upsert_article<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    journal_id: i32,
    volume: Option<i32>,
    article_type: Option<String>,
) -> Result<Article> {
    match find_article(conn, msid).await? {
        Some(existing) => {
            let mut article: ArticleActiveModel = existing.into();
            article.volume = Set(volume);
            article.article_type = Set(article_type);
            article.updated_at = Set(now());
            article.update(conn).await.map_err(Into::into)
        }
        None => {
            let article = ArticleActiveModel {
                manuscript_id: Set(msid),
                doi: Set(msid_to_doi(msid)?),
                journal_id: Set(journal_id),
                volume: Set(volume),
                article_type: Set(article_type),
                metadata: Set(Value::Object(Default::default())),
                created_at: Set(now()),
                updated_at: Set(now()),
            };
            article.insert(conn).await.map_err(Into::into)
        }
    }
}

/// Create a minimal stub article to satisfy a relation target.
pub async fn create_stub_article<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    journal_id: i32,
) -> Result<Article> {
    upsert_article(conn, msid, journal_id, None, None).await
}

/// Fetch articles by manuscript id, ascending.
pub async fn articles_by_msids<C: ConnectionTrait>(
    conn: &C,
    msids: Vec<Msid>,
) -> Result<Vec<Article>> {
    if msids.is_empty() {
        return Ok(Vec::new());
    }

    ArticleEntity::find()
        .filter(ArticleColumn::ManuscriptId.is_in(msids))
        .order_by_asc(ArticleColumn::ManuscriptId)
        .all(conn)
        .await
        .map_err(Into::into)
}

// ============================================================================
// Article Version Operations
// ============================================================================

/// Find a specific version of an article
pub async fn find_version<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    version: i32,
) -> Result<Option<ArticleVersion>> {
    ArticleVersionEntity::find()
        .filter(ArticleVersionColumn::ArticleId.eq(msid))
        .filter(ArticleVersionColumn::Version.eq(version))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Latest version of an article, optionally restricted to published versions
pub async fn latest_version<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    published_only: bool,
) -> Result<Option<ArticleVersion>> {
    let mut query = ArticleVersionEntity::find()
        .filter(ArticleVersionColumn::ArticleId.eq(msid));

    if published_only {
        query = query.filter(ArticleVersionColumn::DatetimePublished.is_not_null());
    }

    query
        .order_by_desc(ArticleVersionColumn::Version)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// All versions of an article in ascending version order
pub async fn list_versions<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    published_only: bool,
) -> Result<Vec<ArticleVersion>> {
    let mut query = ArticleVersionEntity::find()
        .filter(ArticleVersionColumn::ArticleId.eq(msid));

    if published_only {
        query = query.filter(ArticleVersionColumn::DatetimePublished.is_not_null());
    }

    query
        .order_by_asc(ArticleVersionColumn::Version)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Earliest version of an article with the given status
pub async fn earliest_version_with_status<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    status: ArticleStatus,
) -> Result<Option<ArticleVersion>> {
    ArticleVersionEntity::find()
        .filter(ArticleVersionColumn::ArticleId.eq(msid))
        .filter(ArticleVersionColumn::Status.eq(status.as_str()))
        .order_by_asc(ArticleVersionColumn::Version)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Create or update a version row. `datetime_published` is never
/// touched here; only `publish_version` sets it.
pub async fn upsert_version<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    version: i32,
    status: ArticleStatus,
) -> Result<ArticleVersion> {
    match find_version(conn, msid, version).await? {
        Some(existing) => {
            let mut row: ArticleVersionActiveModel = existing.into();
            row.status = Set(status.into());
            row.updated_at = Set(now());
            row.update(conn).await.map_err(Into::into)
        }
        None => {
            let row = ArticleVersionActiveModel {
                id: Set(Uuid::new_v4()),
                article_id: Set(msid),
                version: Set(version),
                status: Set(status.into()),
                datetime_published: Set(None),
                article_json: Set(None),
                article_json_snippet: Set(None),
                article_json_hash: Set(None),
                created_at: Set(now()),
                updated_at: Set(now()),
            };
            row.insert(conn).await.map_err(Into::into)
        }
    }
}

/// Persist the merged document, snippet, and content hash (all three
/// may be null — that clears a previously valid representation).
pub async fn store_article_json<C: ConnectionTrait>(
    conn: &C,
    av: ArticleVersion,
    doc: Option<Value>,
    snippet: Option<Value>,
    hash: Option<String>,
) -> Result<ArticleVersion> {
    let mut row: ArticleVersionActiveModel = av.into();
    row.article_json = Set(doc);
    row.article_json_snippet = Set(snippet);
    row.article_json_hash = Set(hash);
    row.updated_at = Set(now());
    row.update(conn).await.map_err(Into::into)
}

/// Set (or overwrite, under force) the publication timestamp.
pub async fn set_datetime_published<C: ConnectionTrait>(
    conn: &C,
    av: ArticleVersion,
    when: DateTime<Utc>,
) -> Result<ArticleVersion> {
    let mut row: ArticleVersionActiveModel = av.into();
    row.datetime_published = Set(Some(when.into()));
    row.updated_at = Set(now());
    row.update(conn).await.map_err(Into::into)
}

// ============================================================================
// Fragment Operations
// ============================================================================

/// All fragments participating in the merge for one version:
/// article-scoped rows plus rows scoped to exactly this version,
/// ordered by position then insertion sequence.
pub async fn fragments_for_merge<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    version: i32,
) -> Result<Vec<ArticleFragment>> {
    ArticleFragmentEntity::find()
        .filter(ArticleFragmentColumn::ArticleId.eq(msid))
        .filter(
            Condition::any()
                .add(ArticleFragmentColumn::Version.is_null())
                .add(ArticleFragmentColumn::Version.eq(version)),
        )
        .order_by_asc(ArticleFragmentColumn::Position)
        .order_by_asc(ArticleFragmentColumn::Sequence)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Find one fragment by key
pub async fn find_fragment<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    key: &str,
    version: Option<i32>,
) -> Result<Option<ArticleFragment>> {
    let version_cond = match version {
        Some(v) => Condition::all().add(ArticleFragmentColumn::Version.eq(v)),
        None => Condition::all().add(ArticleFragmentColumn::Version.is_null()),
    };

    ArticleFragmentEntity::find()
        .filter(ArticleFragmentColumn::ArticleId.eq(msid))
        .filter(ArticleFragmentColumn::FragmentType.eq(key))
        .filter(version_cond)
        .one(conn)
        .await
        .map_err(Into::into)
}

async fn next_fragment_sequence<C: ConnectionTrait>(conn: &C, msid: Msid) -> Result<i64> {
    let last = ArticleFragmentEntity::find()
        .filter(ArticleFragmentColumn::ArticleId.eq(msid))
        .order_by_desc(ArticleFragmentColumn::Sequence)
        .one(conn)
        .await?;

    Ok(last.map(|f| f.sequence + 1).unwrap_or(1))
}

/// Create or update a fragment. Updates keep the original sequence so
/// re-saving a fragment does not change its merge tiebreak.
pub async fn upsert_fragment<C: ConnectionTrait>(
    conn: &C,
    msid: Msid,
    key: &str,
    version: Option<i32>,
    body: Value,
    position: i32,
) -> Result<ArticleFragment> {
    match find_fragment(conn, msid, key, version).await? {
        Some(existing) => {
            let mut row: ArticleFragmentActiveModel = existing.into();
            row.fragment = Set(body);
            row.position = Set(position);
            row.updated_at = Set(now());
            row.update(conn).await.map_err(Into::into)
        }
        None => {
            let sequence = next_fragment_sequence(conn, msid).await?;
            let row = ArticleFragmentActiveModel {
                id: Set(Uuid::new_v4()),
                article_id: Set(msid),
                fragment_type: Set(key.to_string()),
                version: Set(version),
                fragment: Set(body),
                position: Set(position),
                sequence: Set(sequence),
                created_at: Set(now()),
                updated_at: Set(now()),
            };
            row.insert(conn).await.map_err(Into::into)
        }
    }
}

/// Delete an article-scoped fragment by key; returns whether a row existed.
pub async fn delete_fragment<C: ConnectionTrait>(conn: &C, msid: Msid, key: &str) -> Result<bool> {
    let result = ArticleFragmentEntity::delete_many()
        .filter(ArticleFragmentColumn::ArticleId.eq(msid))
        .filter(ArticleFragmentColumn::FragmentType.eq(key))
        .filter(ArticleFragmentColumn::Version.is_null())
        .exec(conn)
        .await?;

    Ok(result.rows_affected > 0)
}

// ============================================================================
// Relation Operations
// ============================================================================

/// Drop every relation row owned by a version; the ingest path
/// rebuilds them from scratch.
pub async fn delete_relations_for_version<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
) -> Result<()> {
    VersionRelationEntity::delete_many()
        .filter(VersionRelationColumn::ArticleVersionId.eq(version_id))
        .exec(conn)
        .await?;

    VersionExtRelationEntity::delete_many()
        .filter(VersionExtRelationColumn::ArticleVersionId.eq(version_id))
        .exec(conn)
        .await?;

    VersionRpRelationEntity::delete_many()
        .filter(VersionRpRelationColumn::ArticleVersionId.eq(version_id))
        .exec(conn)
        .await?;

    Ok(())
}

/// Insert an internal relation edge
pub async fn insert_internal_relation<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
    related_msid: Msid,
) -> Result<VersionRelation> {
    let row = VersionRelationActiveModel {
        id: Set(Uuid::new_v4()),
        article_version_id: Set(version_id),
        related_article_id: Set(related_msid),
    };
    row.insert(conn).await.map_err(Into::into)
}

/// Insert or replace an external citation, keyed by (version, uri)
pub async fn upsert_ext_relation<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
    uri: &str,
    citation: Value,
) -> Result<VersionExtRelation> {
    let existing = VersionExtRelationEntity::find()
        .filter(VersionExtRelationColumn::ArticleVersionId.eq(version_id))
        .filter(VersionExtRelationColumn::Uri.eq(uri))
        .one(conn)
        .await?;

    match existing {
        Some(row) => {
            let mut row: VersionExtRelationActiveModel = row.into();
            row.citation = Set(citation);
            row.update(conn).await.map_err(Into::into)
        }
        None => {
            let row = VersionExtRelationActiveModel {
                id: Set(Uuid::new_v4()),
                article_version_id: Set(version_id),
                uri: Set(uri.to_string()),
                citation: Set(citation),
            };
            row.insert(conn).await.map_err(Into::into)
        }
    }
}

/// Insert a reviewed-preprint relation
pub async fn insert_rp_relation<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
    content: Value,
) -> Result<VersionRpRelation> {
    let row = VersionRpRelationActiveModel {
        id: Set(Uuid::new_v4()),
        article_version_id: Set(version_id),
        content: Set(content),
    };
    row.insert(conn).await.map_err(Into::into)
}

/// Manuscript ids this version points at
pub async fn forward_related_msids<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
) -> Result<Vec<Msid>> {
    let rows = VersionRelationEntity::find()
        .filter(VersionRelationColumn::ArticleVersionId.eq(version_id))
        .all(conn)
        .await?;

    Ok(rows.into_iter().map(|r| r.related_article_id).collect())
}

/// Manuscript ids of articles whose versions point at this article
pub async fn reverse_related_msids<C: ConnectionTrait>(conn: &C, msid: Msid) -> Result<Vec<Msid>> {
    let edges = VersionRelationEntity::find()
        .filter(VersionRelationColumn::RelatedArticleId.eq(msid))
        .all(conn)
        .await?;

    if edges.is_empty() {
        return Ok(Vec::new());
    }

    let version_ids: Vec<Uuid> = edges.into_iter().map(|e| e.article_version_id).collect();

    let versions = ArticleVersionEntity::find()
        .filter(ArticleVersionColumn::Id.is_in(version_ids))
        .all(conn)
        .await?;

    let mut msids: Vec<Msid> = versions.into_iter().map(|v| v.article_id).collect();
    msids.sort_unstable();
    msids.dedup();
    Ok(msids)
}

/// External citations attached to a version
pub async fn ext_relations_for_version<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
) -> Result<Vec<VersionExtRelation>> {
    VersionExtRelationEntity::find()
        .filter(VersionExtRelationColumn::ArticleVersionId.eq(version_id))
        .order_by_asc(VersionExtRelationColumn::Uri)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Reviewed-preprint records attached to a version
pub async fn rp_relations_for_version<C: ConnectionTrait>(
    conn: &C,
    version_id: Uuid,
) -> Result<Vec<VersionRpRelation>> {
    VersionRpRelationEntity::find()
        .filter(VersionRpRelationColumn::ArticleVersionId.eq(version_id))
        .all(conn)
        .await
        .map_err(Into::into)
}
