//! Article fragment entity
//!
//! A named, ordered, partial JSON document. `version = null` applies
//! to every version of the article; `version = N` applies only to
//! version N. Merge order is `position` then `sequence` — never
//! storage iteration order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_fragments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub article_id: i64,

    /// Fragment key, unique per (article, version)
    #[sea_orm(column_name = "type", column_type = "Text")]
    pub fragment_type: String,

    /// Null scopes the fragment to the whole article
    pub version: Option<i32>,

    #[sea_orm(column_type = "JsonBinary")]
    pub fragment: Json,

    /// Merge priority; lower merges first
    pub position: i32,

    /// Monotonic insertion counter, breaks position ties
    pub sequence: i64,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article::Entity",
        from = "Column::ArticleId",
        to = "super::article::Column::ManuscriptId"
    )]
    Article,
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Article.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
