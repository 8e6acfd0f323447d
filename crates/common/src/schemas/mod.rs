//! Schema registry: versioned article-json schemas keyed by content type.
//!
//! Built once at process start from a directory of
//! `<key>.v<version>.json` files and passed by reference to the
//! validator and the content-negotiation layer. Read-only after
//! construction, safe for unsynchronized concurrent reads.

use crate::errors::{AppError, Result, SubError};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// The closed set of content-type keys.
pub const CONTENT_TYPES: &[&str] = &["poa", "vor", "history", "list", "related"];

/// Canonical mime type for a content-type key.
pub fn canonical_mime(key: &str) -> Option<&'static str> {
    match key {
        "poa" => Some("application/vnd.elife.article-poa+json"),
        "vor" => Some("application/vnd.elife.article-vor+json"),
        "history" => Some("application/vnd.elife.article-history+json"),
        "list" => Some("application/vnd.elife.article-list+json"),
        "related" => Some("application/vnd.elife.article-related+json"),
        _ => None,
    }
}

/// One compiled schema version.
pub struct VersionedSchema {
    pub version: u32,
    validator: jsonschema::Validator,
}

impl VersionedSchema {
    fn compile(key: &str, version: u32, schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema).map_err(|e| AppError::SchemaLoad {
            message: format!("cannot compile schema {}.v{}: {}", key, version, e),
        })?;
        Ok(Self { version, validator })
    }

    pub fn is_valid(&self, doc: &Value) -> bool {
        self.validator.is_valid(doc)
    }

    /// Every violation of this schema, individually addressable.
    pub fn errors(&self, doc: &Value) -> Vec<SubError> {
        self.validator
            .iter_errors(doc)
            .map(|e| SubError {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }
}

/// Per content-type-key ordered lists of compiled schemas, newest first.
pub struct SchemaRegistry {
    entries: HashMap<String, Vec<VersionedSchema>>,
}

impl SchemaRegistry {
    /// Build a registry from `(key, version, schema)` triples.
    pub fn from_schemas(
        schemas: impl IntoIterator<Item = (String, u32, Value)>,
    ) -> Result<Self> {
        let mut entries: HashMap<String, Vec<VersionedSchema>> = HashMap::new();

        for (key, version, schema) in schemas {
            let compiled = VersionedSchema::compile(&key, version, &schema)?;
            entries.entry(key).or_default().push(compiled);
        }

        for versions in entries.values_mut() {
            versions.sort_by(|a, b| b.version.cmp(&a.version));
        }

        Ok(Self { entries })
    }

    /// Load every `<key>.v<version>.json` file under `dir`.
    ///
    /// An unreadable or uncompilable schema file aborts boot; that is
    /// a deployment error, not a validation failure.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut schemas = Vec::new();

        let listing = std::fs::read_dir(dir).map_err(|e| AppError::SchemaLoad {
            message: format!("cannot read schema directory {}: {}", dir.display(), e),
        })?;

        for entry in listing {
            let entry = entry.map_err(|e| AppError::SchemaLoad {
                message: format!("cannot read schema directory {}: {}", dir.display(), e),
            })?;
            let path = entry.path();

            let Some((key, version)) = parse_schema_filename(&path) else {
                continue;
            };

            if !CONTENT_TYPES.contains(&key.as_str()) {
                tracing::warn!(file = %path.display(), "skipping schema for unknown content type");
                continue;
            }

            let raw = std::fs::read_to_string(&path).map_err(|e| AppError::SchemaLoad {
                message: format!("cannot read schema file {}: {}", path.display(), e),
            })?;
            let schema: Value = serde_json::from_str(&raw).map_err(|e| AppError::SchemaLoad {
                message: format!("schema file {} is not JSON: {}", path.display(), e),
            })?;

            schemas.push((key, version, schema));
        }

        if schemas.is_empty() {
            return Err(AppError::SchemaLoad {
                message: format!("no schema files found in {}", dir.display()),
            });
        }

        let registry = Self::from_schemas(schemas)?;
        for key in registry.entries.keys() {
            tracing::info!(
                key = %key,
                versions = registry.entries[key].len(),
                "loaded schemas"
            );
        }
        Ok(registry)
    }

    /// Ordered list of schema versions for a key, newest first.
    pub fn versions_for(&self, key: &str) -> Option<&[VersionedSchema]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    /// The newest registered version number for a key.
    pub fn current_version(&self, key: &str) -> Option<u32> {
        self.entries.get(key).and_then(|v| v.first()).map(|v| v.version)
    }
}

/// `poa.v2.json` → `("poa", 2)`
fn parse_schema_filename(path: &Path) -> Option<(String, u32)> {
    if path.extension()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (key, version) = stem.rsplit_once(".v")?;
    let version: u32 = version.parse().ok()?;
    if key.is_empty() || version == 0 {
        return None;
    }
    Some((key.to_string(), version))
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
                3,
                json!({"type": "object", "required": ["title", "abstract"]}),
            ),
            (
                "poa".to_string(),
                2,
                json!({"type": "object", "required": ["title", "version"]}),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_versions_newest_first() {
        let registry = registry();
        let versions: Vec<u32> = registry
            .versions_for("poa")
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    #[test]
    fn test_current_version() {
        assert_eq!(registry().current_version("poa"), Some(3));
        assert_eq!(registry().current_version("vor"), None);
    }

    #[test]
    fn test_bad_schema_is_load_error() {
        let result = SchemaRegistry::from_schemas([(
            "poa".to_string(),
            1,
            json!({"type": 42}),
        )]);
        assert!(matches!(result, Err(AppError::SchemaLoad { .. })));
    }

    #[test]
    fn test_parse_schema_filename() {
        assert_eq!(
            parse_schema_filename(Path::new("schemas/poa.v2.json")),
            Some(("poa".to_string(), 2))
        );
        assert_eq!(
            parse_schema_filename(Path::new("schemas/article-list.v10.json")),
            Some(("article-list".to_string(), 10))
        );
        assert_eq!(parse_schema_filename(Path::new("schemas/readme.md")), None);
        assert_eq!(parse_schema_filename(Path::new("schemas/poa.json")), None);
        assert_eq!(parse_schema_filename(Path::new("schemas/poa.v0.json")), None);
    }

    #[test]
    fn test_canonical_mime() {
        assert_eq!(
            canonical_mime("poa"),
            Some("application/vnd.elife.article-poa+json")
        );
        assert_eq!(canonical_mime("unknown"), None);
    }
}
