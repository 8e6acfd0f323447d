//! Article-json validation against the schema registry.
//!
//! A document is "valid" when the newest schema version that accepts
//! it accepts it — the scan runs strictly newest-to-oldest and stops
//! at the first success, with no assumption that schema versions are
//! monotonically compatible.

use crate::errors::{AppError, Result, SchemaAttempt, ValidationFailure};
use crate::schemas::SchemaRegistry;
use serde_json::Value;

use crate::db::models::ArticleStatus;

/// Determine the content-type key for an article document from its
/// top-level `status`.
///
/// A missing or non-string `status` means the document is
/// structurally unusable — a data-corruption error that propagates
/// regardless of `quiet`.
pub fn status_key_of(doc: &Value) -> Result<ArticleStatus> {
    doc.get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Parse {
            message: "document has no top-level 'status' key".to_string(),
        })?
        .parse()
}

/// Validate `doc` against the registered schemas for `key`, newest to
/// oldest.
///
/// Returns the version number of the first (newest) schema that
/// accepts the document. When every version rejects it: `Ok(None)`
/// under `quiet`, otherwise an `Invalid` error carrying the newest
/// attempt first plus every other attempt, each individually
/// addressable.
///
/// An unregistered `key` is a deployment error and propagates
/// unconditionally.
pub fn validate(
    registry: &SchemaRegistry,
    doc: &Value,
    key: &str,
    quiet: bool,
) -> Result<Option<u32>> {
    let versions = registry.versions_for(key).ok_or_else(|| AppError::SchemaLoad {
        message: format!("no schemas registered for content type {:?}", key),
    })?;

    let mut attempts = Vec::with_capacity(versions.len());

    for schema in versions {
        if schema.is_valid(doc) {
            return Ok(Some(schema.version));
        }
        attempts.push(SchemaAttempt {
            schema_version: schema.version,
            errors: schema.errors(doc),
        });
    }

    if quiet {
        tracing::debug!(
            content_type = %key,
            attempts = attempts.len(),
            "document rejected by every schema version"
        );
        return Ok(None);
    }

    Err(AppError::Invalid(ValidationFailure {
        content_type: key.to_string(),
        attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_schemas([
            (
                "poa".to_string(),
                1,
                json!({"type": "object", "required": ["title"]}),
            ),
            (
                "poa".to_string(),
                2,
                json!({"type": "object", "required": ["title", "abstract"]}),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_newest_accepting_schema_wins() {
        let registry = registry();
        let doc = json!({"title": "a", "abstract": "b"});
        assert_eq!(validate(&registry, &doc, "poa", false).unwrap(), Some(2));
    }

    #[test]
    fn test_falls_back_to_older_schema() {
        let registry = registry();
        // Satisfies v1 but not v2 — negotiates down silently.
        let doc = json!({"title": "a"});
        assert_eq!(validate(&registry, &doc, "poa", false).unwrap(), Some(1));
    }

    #[test]
    fn test_quiet_swallows_total_rejection() {
        let registry = registry();
        let doc = json!({"volume": 5});
        assert_eq!(validate(&registry, &doc, "poa", true).unwrap(), None);
    }

    #[test]
    fn test_loud_rejection_carries_every_attempt() {
        let registry = registry();
        let doc = json!({"volume": 5});
        let err = validate(&registry, &doc, "poa", false).unwrap_err();
        let AppError::Invalid(failure) = err else {
            panic!("expected Invalid, got {:?}", err);
        };
        assert_eq!(failure.attempts.len(), 2);
        // Newest attempt first
        assert_eq!(failure.attempts[0].schema_version, 2);
        assert!(!failure.attempts[0].errors.is_empty());
        assert!(failure.first_error().is_some());
    }

    #[test]
    fn test_unknown_key_is_deployment_error_even_when_quiet() {
        let registry = registry();
        let doc = json!({});
        let err = validate(&registry, &doc, "vor", true).unwrap_err();
        assert!(matches!(err, AppError::SchemaLoad { .. }));
    }

    #[test]
    fn test_status_key_of() {
        assert_eq!(
            status_key_of(&json!({"status": "poa"})).unwrap(),
            ArticleStatus::Poa
        );
        assert_eq!(
            status_key_of(&json!({"status": "vor"})).unwrap(),
            ArticleStatus::Vor
        );
        assert!(matches!(
            status_key_of(&json!({"title": "x"})),
            Err(AppError::Parse { .. })
        ));
        assert!(matches!(
            status_key_of(&json!({"status": 7})),
            Err(AppError::Parse { .. })
        ));
    }
}
