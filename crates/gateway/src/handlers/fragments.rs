//! Fragment write handlers
//!
//! Fragment mutation requires the privileged caller flag injected by
//! the external gateway; the reserved primordial fragment is
//! untouchable regardless.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;

use crate::AppState;
use articleforge_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    ids::Msid,
};
use articleforge_ingestion::fragments;

fn require_privileged(auth: &AuthContext) -> Result<()> {
    if auth.can_view_unpublished {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: "not authorized to modify article fragments".to_string(),
        })
    }
}

fn require_json_body(headers: &HeaderMap) -> Result<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|mime| mime.eq_ignore_ascii_case("application/json"))
    {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType {
            mime: content_type.to_string(),
        })
    }
}

/// Store (create or replace) a fragment, re-rendering every version
/// of the article
pub async fn add_fragment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((msid, key)): Path<(Msid, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    require_privileged(&auth)?;
    require_json_body(&headers)?;

    let fragment: Value = serde_json::from_slice(&body).map_err(|e| AppError::BadRequest {
        message: format!("fragment body is not valid JSON: {}", e),
    })?;

    let stored =
        fragments::add_fragment(&state.db, &state.registry, &state.events, msid, &key, fragment)
            .await?;

    Ok(Json(stored))
}

/// Delete a fragment, re-rendering every version of the article
pub async fn delete_fragment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((msid, key)): Path<(Msid, String)>,
) -> Result<StatusCode> {
    require_privileged(&auth)?;

    fragments::delete_fragment(&state.db, &state.registry, &state.events, msid, &key).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprivileged_mutation_is_forbidden() {
        let err = require_privileged(&AuthContext::default()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert!(require_privileged(&AuthContext::privileged()).is_ok());
    }

    #[test]
    fn test_json_content_type_required() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            require_json_body(&headers),
            Err(AppError::UnsupportedMediaType { .. })
        ));

        headers.insert(header::CONTENT_TYPE, "text/xml".parse().unwrap());
        assert!(require_json_body(&headers).is_err());

        headers.insert(
            header::CONTENT_TYPE,
            "application/json; charset=utf-8".parse().unwrap(),
        );
        assert!(require_json_body(&headers).is_ok());
    }
}
