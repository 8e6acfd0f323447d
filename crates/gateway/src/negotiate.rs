//! Content-type negotiation
//!
//! Maps Accept headers onto concrete schema versions for a content
//! type. When a client lists several acceptable versions, the highest
//! one the registry can serve wins; a negotiated version older than
//! the current one is flagged so the response carries a deprecation
//! warning.

use articleforge_common::schemas::{canonical_mime, SchemaRegistry};

/// Mime entries that accept anything we serve.
const WILDCARDS: &[&str] = &["*/*", "application/*", "application/json"];

/// A successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    pub mime: &'static str,
    pub version: u32,
    /// The negotiated version is older than the newest registered one
    pub deprecated: bool,
}

impl Negotiated {
    /// Value for the response `content-type` header.
    pub fn content_type(&self) -> String {
        format!("{}; version={}", self.mime, self.version)
    }

    /// Value for the `warning` header on deprecated responses.
    pub fn deprecation_warning(&self) -> Option<String> {
        self.deprecated.then(|| {
            format!(
                "299 articleforge \"Deprecation: Support for version {} will be removed\"",
                self.version
            )
        })
    }
}

#[derive(Debug)]
struct AcceptEntry {
    mime: String,
    version: Option<u32>,
}

/// Negotiate the response representation for `key` against an Accept
/// header. `None` means no mutually acceptable version exists and the
/// caller must answer 406.
pub fn negotiate(
    accept: Option<&str>,
    key: &str,
    registry: &SchemaRegistry,
) -> Option<Negotiated> {
    let mime = canonical_mime(key)?;
    let current = registry.current_version(key)?;

    let newest = Negotiated {
        mime,
        version: current,
        deprecated: false,
    };

    let header = match accept.map(str::trim) {
        None | Some("") => return Some(newest),
        Some(header) => header,
    };

    let mut requested = Vec::new();

    for entry in header.split(',').filter_map(parse_entry) {
        // A wildcard accepts the newest version, wherever it appears.
        if WILDCARDS.contains(&entry.mime.as_str()) {
            return Some(newest);
        }

        if entry.mime == mime {
            match entry.version {
                // No version parameter means "accept current".
                None => return Some(newest),
                Some(version) if version <= current => requested.push(version),
                // A requested version we do not serve is not an
                // acceptable entry.
                Some(_) => {}
            }
        }
    }

    let version = requested.into_iter().max()?;
    Some(Negotiated {
        mime,
        version,
        deprecated: version < current,
    })
}

/// Parse one Accept entry; malformed entries are dropped, not fatal.
fn parse_entry(raw: &str) -> Option<AcceptEntry> {
    let mut parts = raw.split(';');

    let mime = parts.next()?.trim().to_ascii_lowercase();
    if mime.is_empty() || !mime.contains('/') {
        return None;
    }

    let mut version = None;
    for param in parts {
        let (name, value) = param.split_once('=')?;
        if name.trim() == "version" {
            match value.trim().parse::<u32>() {
                Ok(n) if n >= 1 => version = Some(n),
                // An unparseable version makes the whole entry
                // malformed.
                _ => return None,
            }
        }
    }

    Some(AcceptEntry { mime, version })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const POA_MIME: &str = "application/vnd.elife.article-poa+json";

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_schemas([
            ("poa".to_string(), 1, json!({"type": "object"})),
            ("poa".to_string(), 2, json!({"type": "object"})),
            ("poa".to_string(), 3, json!({"type": "object"})),
            ("vor".to_string(), 1, json!({"type": "object"})),
        ])
        .unwrap()
    }

    #[test]
    fn test_absent_header_serves_newest() {
        let negotiated = negotiate(None, "poa", &registry()).unwrap();
        assert_eq!(negotiated.version, 3);
        assert_eq!(negotiated.mime, POA_MIME);
        assert!(!negotiated.deprecated);
    }

    #[test]
    fn test_wildcards_serve_newest() {
        for header in ["*/*", "application/*", "application/json"] {
            let negotiated = negotiate(Some(header), "poa", &registry()).unwrap();
            assert_eq!(negotiated.version, 3, "header {:?}", header);
        }
    }

    #[test]
    fn test_versionless_specific_match_serves_newest() {
        let negotiated = negotiate(Some(POA_MIME), "poa", &registry()).unwrap();
        assert_eq!(negotiated.version, 3);
        assert!(!negotiated.deprecated);
    }

    #[test]
    fn test_highest_offered_version_wins() {
        let header = format!("{m}; version=1, {m}; version=2", m = POA_MIME);
        let negotiated = negotiate(Some(&header), "poa", &registry()).unwrap();
        assert_eq!(negotiated.version, 2);
        assert!(negotiated.deprecated);
    }

    #[test]
    fn test_foreign_mime_only_is_not_acceptable() {
        let header = "application/vnd.elife.article-vor+json";
        assert_eq!(negotiate(Some(header), "poa", &registry()), None);
    }

    #[test]
    fn test_overshooting_version_is_not_acceptable() {
        let header = format!("{}; version=9", POA_MIME);
        assert_eq!(negotiate(Some(&header), "poa", &registry()), None);
    }

    #[test]
    fn test_overshooting_version_falls_back_to_other_offers() {
        let header = format!("{m}; version=9, {m}; version=1", m = POA_MIME);
        let negotiated = negotiate(Some(&header), "poa", &registry()).unwrap();
        assert_eq!(negotiated.version, 1);
        assert!(negotiated.deprecated);
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let header = format!("garbage, {m}; version=x, {m}; version=2", m = POA_MIME);
        let negotiated = negotiate(Some(&header), "poa", &registry()).unwrap();
        assert_eq!(negotiated.version, 2);
    }

    #[test]
    fn test_wildcard_anywhere_short_circuits() {
        let header = format!("{}; version=1, */*", POA_MIME);
        let negotiated = negotiate(Some(&header), "poa", &registry()).unwrap();
        assert_eq!(negotiated.version, 3);
    }

    #[test]
    fn test_deprecation_warning_text() {
        let header = format!("{}; version=1", POA_MIME);
        let negotiated = negotiate(Some(&header), "poa", &registry()).unwrap();
        assert!(negotiated.deprecated);
        let warning = negotiated.deprecation_warning().unwrap();
        assert!(warning.starts_with("299 "));
        assert!(warning.contains("version 1"));

        assert_eq!(
            negotiate(None, "poa", &registry()).unwrap().deprecation_warning(),
            None
        );
    }

    #[test]
    fn test_content_type_header_value() {
        let negotiated = negotiate(None, "vor", &registry()).unwrap();
        assert_eq!(
            negotiated.content_type(),
            "application/vnd.elife.article-vor+json; version=1"
        );
    }
}
