//! Internal article relation entity
//!
//! A directed edge from an article version to another article.
//! Rebuilt wholesale on every ingest.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_version_relations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub article_version_id: Uuid,

    pub related_article_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article_version::Entity",
        from = "Column::ArticleVersionId",
        to = "super::article_version::Column::Id"
    )]
    ArticleVersion,

    #[sea_orm(
        belongs_to = "super::article::Entity",
        from = "Column::RelatedArticleId",
        to = "super::article::Column::ManuscriptId"
    )]
    RelatedArticle,
}

impl Related<super::article_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArticleVersion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
