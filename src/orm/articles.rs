//! SeaORM Entity for articles table
//!
//! Root articles and replies share this table. `reply_to` is 0 for roots;
//! `reply_root_id` points at the tree root (0 for roots themselves) so
//! subtree queries do not need to walk the chain.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Empty for replies
    pub title: String,
    pub author_id: i32,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// Optional external link for root articles
    pub link: Option<String>,
    pub category: Option<String>,
    /// Parent article id, 0 for roots
    pub reply_to: i32,
    /// Nesting depth, 0 for roots
    pub reply_depth: i32,
    /// Tree root id, 0 for roots
    pub reply_root_id: i32,
    /// Front-page ranking score, refreshed on vote activity
    pub list_weight: f64,
    /// Sibling ordering score for "best" reply sort
    pub reply_weight: f64,
    /// Distinct users who authored, voted, saved or reacted in the tree
    pub participate_count: i32,
    pub deleted: bool,
    pub locked: bool,
    pub pinned_expire_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Author,
    #[sea_orm(has_many = "super::article_votes::Entity")]
    Vote,
    #[sea_orm(has_many = "super::article_reacts::Entity")]
    React,
    #[sea_orm(has_many = "super::article_saves::Entity")]
    Save,
    #[sea_orm(has_many = "super::article_subs::Entity")]
    Subscription,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::article_votes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
