//! SeaORM entity models
//!
//! Database entities for the article store.

mod article;
mod article_fragment;
mod article_version;
mod ext_relation;
mod journal;
mod relation;
mod rp_relation;

pub use journal::{
    Entity as JournalEntity,
    Model as Journal,
    ActiveModel as JournalActiveModel,
    Column as JournalColumn,
};

pub use article::{
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
};

pub use article_version::{
    ArticleStatus,
    Entity as ArticleVersionEntity,
    Model as ArticleVersion,
    ActiveModel as ArticleVersionActiveModel,
    Column as ArticleVersionColumn,
};

pub use article_fragment::{
    Entity as ArticleFragmentEntity,
    Model as ArticleFragment,
    ActiveModel as ArticleFragmentActiveModel,
    Column as ArticleFragmentColumn,
};

pub use relation::{
    Entity as VersionRelationEntity,
    Model as VersionRelation,
    ActiveModel as VersionRelationActiveModel,
    Column as VersionRelationColumn,
};

pub use ext_relation::{
    Entity as VersionExtRelationEntity,
    Model as VersionExtRelation,
    ActiveModel as VersionExtRelationActiveModel,
    Column as VersionExtRelationColumn,
};

pub use rp_relation::{
    Entity as VersionRpRelationEntity,
    Model as VersionRpRelation,
    ActiveModel as VersionRpRelationActiveModel,
    Column as VersionRpRelationColumn,
};
