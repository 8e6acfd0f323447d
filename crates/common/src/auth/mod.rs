//! Authentication signal extraction
//!
//! The service sits behind an external gateway that authenticates
//! callers and injects a consumer-group header; the core never
//! computes authorization itself. The only signal it consumes is
//! "may this caller see (and mutate) unpublished content".

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Header injected by the external gateway.
pub const CONSUMER_GROUPS_HEADER: &str = "x-consumer-groups";

/// Group granting access to unpublished content.
pub const VIEW_UNPUBLISHED_GROUP: &str = "view-unpublished-content";

/// Extracted authentication context available to handlers
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthContext {
    /// Whether the caller may see unpublished article versions and
    /// mutate fragments
    pub can_view_unpublished: bool,
}

impl AuthContext {
    pub fn privileged() -> Self {
        Self {
            can_view_unpublished: true,
        }
    }

    /// Parse the gateway's consumer-group header value.
    pub fn from_header_value(value: Option<&str>) -> Self {
        let can_view_unpublished = value
            .map(|groups| {
                groups
                    .split(',')
                    .any(|group| group.trim() == VIEW_UNPUBLISHED_GROUP)
            })
            .unwrap_or(false);

        Self {
            can_view_unpublished,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CONSUMER_GROUPS_HEADER)
            .and_then(|v| v.to_str().ok());

        Ok(AuthContext::from_header_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_header_is_unprivileged() {
        assert!(!AuthContext::from_header_value(None).can_view_unpublished);
    }

    #[test]
    fn test_matching_group() {
        let ctx = AuthContext::from_header_value(Some("admin, view-unpublished-content"));
        assert!(ctx.can_view_unpublished);
    }

    #[test]
    fn test_other_groups_do_not_grant() {
        let ctx = AuthContext::from_header_value(Some("admin, reporting"));
        assert!(!ctx.can_view_unpublished);
    }

    #[test]
    fn test_substring_does_not_grant() {
        let ctx = AuthContext::from_header_value(Some("view-unpublished-content-ish"));
        assert!(!ctx.can_view_unpublished);
    }
}
