//! Article entity
//!
//! The primary key is the manuscript id itself; the DOI is a
//! reversible transform of it and stored only for lookups.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub manuscript_id: i64,

    #[sea_orm(column_type = "Text", unique)]
    pub doi: String,

    pub journal_id: i32,

    pub volume: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub article_type: Option<String>,

    /// Slow-changing submission metadata (decision dates/codes),
    /// opaque to the publishing core
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal::Entity",
        from = "Column::JournalId",
        to = "super::journal::Column::Id"
    )]
    Journal,

    #[sea_orm(has_many = "super::article_version::Entity")]
    Versions,

    #[sea_orm(has_many = "super::article_fragment::Entity")]
    Fragments,
}

impl Related<super::journal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journal.def()
    }
}

impl Related<super::article_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl Related<super::article_fragment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fragments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
