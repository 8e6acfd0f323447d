//! Article read handlers
//!
//! Serve the stored, pre-rendered article-json with a negotiated
//! content type. Unpublished versions are visible only to privileged
//! callers; a version without a valid representation is simply not
//! found.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::negotiate::{negotiate, Negotiated};
use crate::AppState;
use articleforge_common::{
    auth::AuthContext,
    db::models::ArticleStatus,
    db::repository,
    errors::{AppError, Result},
    ids::Msid,
    XML2JSON_KEY,
};
use articleforge_ingestion::relations;

fn accept_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ACCEPT).and_then(|v| v.to_str().ok())
}

/// Attach the negotiated content type (and deprecation warning, when
/// applicable) to a JSON response.
fn negotiated_response(negotiated: &Negotiated, body: Value) -> Result<Response> {
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();

    let content_type = negotiated
        .content_type()
        .parse()
        .map_err(|e| anyhow::anyhow!("bad content-type header: {}", e))?;
    headers.insert(header::CONTENT_TYPE, content_type);

    if let Some(warning) = negotiated.deprecation_warning() {
        let warning = warning
            .parse()
            .map_err(|e| anyhow::anyhow!("bad warning header: {}", e))?;
        headers.insert(header::WARNING, warning);
    }

    Ok(response)
}

/// Latest visible version of an article
pub async fn latest_article(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(msid): Path<Msid>,
    headers: HeaderMap,
) -> Result<Response> {
    let conn = state.db.read();

    let av = repository::latest_version(conn, msid, !auth.can_view_unpublished)
        .await?
        .ok_or_else(|| AppError::no_record("article", msid))?;

    let doc = av
        .article_json
        .clone()
        .ok_or_else(|| AppError::no_record("article", msid))?;

    let status = av.article_status()?;
    let negotiated = negotiate(accept_header(&headers), status.as_str(), &state.registry)
        .ok_or(AppError::NotAcceptable)?;

    negotiated_response(&negotiated, doc)
}

/// A specific version of an article
pub async fn article_version(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((msid, version)): Path<(Msid, i32)>,
    headers: HeaderMap,
) -> Result<Response> {
    let conn = state.db.read();

    let av = repository::find_version(conn, msid, version)
        .await?
        .filter(|av| av.is_published() || auth.can_view_unpublished)
        .ok_or_else(|| AppError::no_record("article version", format!("{}/{}", msid, version)))?;

    let doc = av
        .article_json
        .clone()
        .ok_or_else(|| AppError::no_record("article version", format!("{}/{}", msid, version)))?;

    let status = av.article_status()?;
    let negotiated = negotiate(accept_header(&headers), status.as_str(), &state.registry)
        .ok_or(AppError::NotAcceptable)?;

    negotiated_response(&negotiated, doc)
}

/// Publication history of an article.
///
/// Protocol version 1 lists article versions only; version 2 also
/// includes the preprint events recorded in the source document.
pub async fn version_history(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(msid): Path<Msid>,
    headers: HeaderMap,
) -> Result<Response> {
    let negotiated = negotiate(accept_header(&headers), "history", &state.registry)
        .ok_or(AppError::NotAcceptable)?;

    let conn = state.db.read();

    repository::find_article(conn, msid)
        .await?
        .ok_or_else(|| AppError::no_record("article", msid))?;

    let versions = repository::list_versions(conn, msid, !auth.can_view_unpublished).await?;
    if versions.is_empty() {
        return Err(AppError::no_record("article", msid));
    }

    let mut entries: Vec<Value> = Vec::new();

    if negotiated.version >= 2 {
        if let Some(fragment) = repository::find_fragment(conn, msid, XML2JSON_KEY, None).await? {
            if let Some(preprints) = fragment
                .fragment
                .get("-history")
                .and_then(|history| history.get("preprints"))
                .and_then(Value::as_array)
            {
                entries.extend(preprints.iter().cloned());
            }
        }
    }

    for av in versions {
        let entry = av.article_json_snippet.clone().unwrap_or_else(|| {
            json!({
                "status": av.status,
                "stage": if av.is_published() { "published" } else { "preview" },
                "version": av.version,
            })
        });
        entries.push(entry);
    }

    negotiated_response(&negotiated, json!({ "versions": entries }))
}

/// Everything related to an article: internal relation snippets,
/// external citations, and (protocol version 2) reviewed preprints,
/// with a VOR preferred over a reviewed preprint for the same target.
pub async fn related_articles(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(msid): Path<Msid>,
    headers: HeaderMap,
) -> Result<Response> {
    let negotiated = negotiate(accept_header(&headers), "related", &state.registry)
        .ok_or(AppError::NotAcceptable)?;

    let conn = state.db.read();

    repository::find_article(conn, msid)
        .await?
        .ok_or_else(|| AppError::no_record("article", msid))?;

    let mut items: Vec<Value> = Vec::new();

    // Relations hang off the latest visible version; an article with
    // no visible version has no visible relations.
    if let Some(av) = repository::latest_version(conn, msid, !auth.can_view_unpublished).await? {
        let mut vor_targets: HashSet<Msid> = HashSet::new();

        for target in relations::internal_relationships_for(conn, &av).await? {
            let Some(target_version) =
                repository::latest_version(conn, target.manuscript_id, !auth.can_view_unpublished)
                    .await?
            else {
                continue;
            };
            let Some(snippet) = target_version.article_json_snippet.clone() else {
                continue;
            };
            if target_version.article_status()? == ArticleStatus::Vor {
                vor_targets.insert(target.manuscript_id);
            }
            items.push(snippet);
        }

        for ext in repository::ext_relations_for_version(conn, av.id).await? {
            items.push(ext.citation);
        }

        if negotiated.version >= 2 {
            for rp in repository::rp_relations_for_version(conn, av.id).await? {
                if let Some(target) = rp_target_msid(&rp.content) {
                    if vor_targets.contains(&target) {
                        continue;
                    }
                }
                items.push(rp.content);
            }
        }
    }

    negotiated_response(&negotiated, Value::Array(items))
}

fn rp_target_msid(content: &Value) -> Option<Msid> {
    match content.get("id")? {
        Value::Number(n) => n.as_i64().filter(|m| *m > 0),
        Value::String(raw) => raw
            .trim_start_matches('0')
            .parse::<Msid>()
            .ok()
            .filter(|m| *m > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rp_target_msid() {
        assert_eq!(rp_target_msid(&json!({"id": "09560"})), Some(9560));
        assert_eq!(rp_target_msid(&json!({"id": 12})), Some(12));
        assert_eq!(rp_target_msid(&json!({"id": true})), None);
        assert_eq!(rp_target_msid(&json!({"uri": "https://x"})), None);
    }
}
