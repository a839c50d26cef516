//! SeaORM Entity for notifications table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    /// Notification kind, e.g. "reply"
    pub kind: String,
    pub message: String,
    pub source_user_id: Option<i32>,
    pub source_article_id: Option<i32>,
    pub is_read: bool,
    pub created_at: DateTime,
    pub read_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SourceUserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    SourceUser,
    #[sea_orm(
        belongs_to = "super::articles::Entity",
        from = "Column::SourceArticleId",
        to = "super::articles::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    SourceArticle,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::articles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SourceArticle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
