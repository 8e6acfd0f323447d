//! Article version entity
//!
//! A version row with `datetime_published` set is PUBLISHED and
//! immutable except via an explicit forced correction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Publication status of an article version
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Publish Online Ahead of print
    Poa,
    /// Version of Record
    Vor,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Poa => "poa",
            ArticleStatus::Vor => "vor",
        }
    }
}

impl From<ArticleStatus> for String {
    fn from(status: ArticleStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poa" => Ok(ArticleStatus::Poa),
            "vor" => Ok(ArticleStatus::Vor),
            other => Err(AppError::Parse {
                message: format!("unknown article status: {:?}", other),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub article_id: i64,

    /// Positive, strictly sequential per article
    pub version: i32,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Null means unpublished ("preview" stage)
    pub datetime_published: Option<DateTimeWithTimeZone>,

    /// The merged, validated document; null when no valid
    /// representation exists
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub article_json: Option<Json>,

    /// Subset of the document used in list views
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub article_json_snippet: Option<Json>,

    /// Content hash of the document, used for the idempotence
    /// short-circuit
    #[sea_orm(column_type = "Text", nullable)]
    pub article_json_hash: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the status as an enum
    pub fn article_status(&self) -> Result<ArticleStatus, AppError> {
        self.status.parse()
    }

    pub fn is_published(&self) -> bool {
        self.datetime_published.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article::Entity",
        from = "Column::ArticleId",
        to = "super::article::Column::ManuscriptId"
    )]
    Article,

    #[sea_orm(has_many = "super::relation::Entity")]
    Relations,

    #[sea_orm(has_many = "super::ext_relation::Entity")]
    ExtRelations,

    #[sea_orm(has_many = "super::rp_relation::Entity")]
    RpRelations,
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Article.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!("poa".parse::<ArticleStatus>().unwrap(), ArticleStatus::Poa);
        assert_eq!("vor".parse::<ArticleStatus>().unwrap(), ArticleStatus::Vor);
        assert_eq!(String::from(ArticleStatus::Vor), "vor");
    }

    #[test]
    fn test_unknown_status_is_parse_error() {
        let err = "preprint".parse::<ArticleStatus>().unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }
}
