//! ArticleForge Common Library
//!
//! Shared code for the ArticleForge services including:
//! - Database entities and repository queries
//! - Schema registry and article-json validation
//! - Error types and handling
//! - Configuration management
//! - Outbound event notifications
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod ids;
pub mod metrics;
pub mod schemas;
pub mod validate;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::DbPool;
pub use errors::{AppError, ErrorCode, Result};
pub use ids::Msid;
pub use schemas::SchemaRegistry;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reserved fragment key holding the full parsed source document.
///
/// Every ingest rewrites this fragment; it can never be deleted
/// through the fragment API.
pub const XML2JSON_KEY: &str = "xml2json";
