//! External citation relation entity
//!
//! Keyed by (article version, uri); the citation payload is served
//! verbatim in relation listings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_version_ext_relations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub article_version_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub uri: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub citation: Json,
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
