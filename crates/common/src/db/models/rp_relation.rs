//! Reviewed-preprint relation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_version_rp_relations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub article_version_id: Uuid,

    /// Reviewed-preprint record; must carry a `uri`
    #[sea_orm(column_type = "JsonBinary")]
    pub content: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article_version::Entity",
        from = "Column::ArticleVersionId",
        to = "super::article_version::Column::Id"
    )]
    ArticleVersion,
}

impl Related<super::article_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArticleVersion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
