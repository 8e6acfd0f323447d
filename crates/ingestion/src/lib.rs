//! ArticleForge ingestion library
//!
//! The fragment-merge-and-validate engine together with the article
//! publication state machine:
//! - [`merge`] — deterministic deep-merge of ordered fragments and
//!   derivation of the publication date fields
//! - [`publisher`] — ingest/publish transitions with version
//!   sequencing and force semantics
//! - [`relations`] — internal/external/reviewed-preprint relationship
//!   resolution
//! - [`fragments`] — fragment add/remove with whole-article
//!   re-validation

pub mod errors;
pub mod fragments;
pub mod merge;
pub mod publisher;
pub mod relations;
