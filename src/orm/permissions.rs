//! SeaORM Entity for permissions table
//!
//! Rows mirror the builtin catalog so the management surface can list them
//! and roles can reference them; evaluation itself goes through the typed
//! catalog, not this table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Stable identifier, e.g. "article_create"
    #[sea_orm(unique)]
    pub front_id: String,
    /// Owning module name, e.g. "article"
    pub module: String,
    /// Human-readable label
    pub name: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::role_permissions::Entity")]
    RolePermission,
}

impl Related<super::role_permissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RolePermission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
