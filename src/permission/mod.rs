pub mod catalog;
mod test;

pub use catalog::{
    ArticleAction, CatalogEntry, Module, PermissionAction, PermissionId, RoleAction, RouteTable,
    UserAction, CATALOG,
};

use std::collections::{HashMap, HashSet};

/// Front id of the role new registrations receive.
pub const DEFAULT_ROLE_FRONT_ID: &str = "common_user";
/// Front id of the role assigned when a user is banned.
pub const BANNED_ROLE_FRONT_ID: &str = "banned_user";

const COMMON_USER_GRANTS: &[&str] = &[
    "article_create",
    "article_reply",
    "article_edit_mine",
    "article_delete_mine",
    "article_vote_up",
    "article_vote_down",
    "article_react",
    "article_save",
    "article_subscribe",
    "user_update_intro_mine",
];

const MODERATOR_GRANTS: &[&str] = &[
    "article_create",
    "article_reply",
    "article_edit_mine",
    "article_edit_others",
    "article_delete_mine",
    "article_delete_others",
    "article_vote_up",
    "article_vote_down",
    "article_react",
    "article_save",
    "article_subscribe",
    "article_lock",
    "article_pin",
    "user_update_intro_mine",
    "user_manage",
    "user_list_access",
    "user_ban",
];

/// A user's evaluated permission snapshot. Built fresh for each request by
/// the client context middleware; nothing here outlives the request.
#[derive(Clone, Debug, Default)]
pub struct PermissionData {
    /// Catalog id -> enabled. The default (empty) map is the guest
    /// snapshot and denies everything.
    enabled: HashMap<PermissionId, bool>,
}

impl PermissionData {
    /// Rebuilds a snapshot from a role's granted front ids. Always a full
    /// rebuild, never incremental; grants from a previous role must not
    /// survive into the new snapshot.
    pub fn update(granted_front_ids: &HashSet<String>, is_super: bool) -> PermissionData {
        let mut enabled = HashMap::with_capacity(CATALOG.len());

        for entry in CATALOG {
            enabled.insert(
                entry.id,
                is_super || granted_front_ids.contains(entry.front_id),
            );
        }

        PermissionData { enabled }
    }

    /// Permission check by typed id. Absent keys deny.
    pub fn permit(&self, id: PermissionId) -> bool {
        self.enabled.get(&id).copied().unwrap_or(false)
    }

    /// Permission check by module/action names. Unknown names deny, even
    /// for super admins.
    pub fn permit_named(&self, module: &str, action: &str) -> bool {
        match PermissionId::parse(module, action) {
            Some(id) => self.permit(id),
            None => {
                log::warn!(
                    "Bad permission check on '{}.{}', which is not present in the catalog.",
                    module,
                    action
                );
                false
            }
        }
    }

    /// Front ids enabled in this snapshot, in catalog order. Role editing
    /// uses this to limit grants to what the granter holds.
    pub fn enabled_front_ids(&self) -> Vec<&'static str> {
        CATALOG
            .iter()
            .filter(|entry| self.permit(entry.id))
            .map(|entry| entry.front_id)
            .collect()
    }
}

pub fn valid_module(name: &str) -> bool {
    Module::parse(name).is_some()
}

pub fn module_list() -> Vec<&'static str> {
    Module::ALL.iter().map(|m| m.as_str()).collect()
}

/// Catalog entries belonging to one module, in catalog order.
pub fn catalog_entries_for_module(
    module: &str,
) -> impl Iterator<Item = &'static CatalogEntry> + '_ {
    CATALOG
        .iter()
        .filter(move |entry| entry.id.module().as_str() == module)
}

/// Builds the per-request snapshot for a logged-in user. Guests take
/// `PermissionData::default()` instead. Banned users keep their session but
/// evaluate with no grants at all.
pub async fn snapshot_for_user(
    user: &crate::orm::users::Model,
) -> Result<PermissionData, sea_orm::error::DbErr> {
    if user.banned {
        return Ok(PermissionData::update(&HashSet::new(), false));
    }

    let granted = granted_front_ids_for_role(user.role_id).await?;
    Ok(PermissionData::update(&granted, user.super_admin))
}

/// Inserts catalog rows missing from the permissions table. The table
/// backs management listings and role grants; evaluation itself reads the
/// builtin catalog and never queries here.
pub async fn sync_catalog() -> Result<(), sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::permissions;
    use sea_orm::entity::*;

    let existing: HashSet<String> = permissions::Entity::find()
        .all(get_db_pool())
        .await?
        .into_iter()
        .map(|p| p.front_id)
        .collect();

    let mut inserted = 0;
    for entry in CATALOG {
        if existing.contains(entry.front_id) {
            continue;
        }

        permissions::ActiveModel {
            front_id: Set(entry.front_id.to_owned()),
            module: Set(entry.id.module().as_str().to_owned()),
            name: Set(entry.name.to_owned()),
            created_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(get_db_pool())
        .await?;
        inserted += 1;
    }

    if inserted > 0 {
        log::info!("Seeded {} permission rows from the builtin catalog.", inserted);
    }

    Ok(())
}

/// Front ids granted to a role, resolved through the role_permissions
/// join table.
pub async fn granted_front_ids_for_role(
    role_id: i32,
) -> Result<HashSet<String>, sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::{permissions, role_permissions};
    use sea_orm::entity::*;
    use sea_orm::QueryFilter;

    let rows = role_permissions::Entity::find()
        .filter(role_permissions::Column::RoleId.eq(role_id))
        .find_also_related(permissions::Entity)
        .all(get_db_pool())
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(_, permission)| permission.map(|p| p.front_id))
        .collect())
}

/// Replaces a role's grants inside one transaction. Front ids the catalog
/// does not know are dropped with a warning rather than failing the write.
pub async fn update_role_grants(
    role_id: i32,
    front_ids: &[String],
) -> Result<(), sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::{permissions, role_permissions};
    use sea_orm::entity::*;
    use sea_orm::{QueryFilter, TransactionTrait};

    let mut valid: Vec<&str> = Vec::new();
    for front_id in front_ids {
        if PermissionId::parse_front_id(front_id).is_some() {
            valid.push(front_id);
        } else {
            log::warn!(
                "Dropping unknown front id '{}' from the grant update for role {}.",
                front_id,
                role_id
            );
        }
    }

    let rows = permissions::Entity::find()
        .filter(permissions::Column::FrontId.is_in(valid))
        .all(get_db_pool())
        .await?;

    let txn = get_db_pool().begin().await?;

    role_permissions::Entity::delete_many()
        .filter(role_permissions::Column::RoleId.eq(role_id))
        .exec(&txn)
        .await?;

    for row in rows {
        role_permissions::ActiveModel {
            role_id: Set(role_id),
            permission_id: Set(row.id),
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(())
}

/// Roles in creation order for the management pages.
pub async fn list_roles() -> Result<Vec<crate::orm::roles::Model>, sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::roles;
    use sea_orm::entity::*;
    use sea_orm::query::*;

    roles::Entity::find()
        .order_by_asc(roles::Column::Id)
        .all(get_db_pool())
        .await
}

pub async fn find_role(
    role_id: i32,
) -> Result<Option<crate::orm::roles::Model>, sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::roles;
    use sea_orm::entity::*;

    roles::Entity::find_by_id(role_id).one(get_db_pool()).await
}

pub async fn find_role_by_front_id(
    front_id: &str,
) -> Result<Option<crate::orm::roles::Model>, sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::roles;
    use sea_orm::entity::*;
    use sea_orm::QueryFilter;

    roles::Entity::find()
        .filter(roles::Column::FrontId.eq(front_id))
        .one(get_db_pool())
        .await
}

/// Creates an operator-defined role with the given grant set.
pub async fn create_role(
    front_id: &str,
    name: &str,
    grant_front_ids: &[String],
) -> Result<crate::orm::roles::Model, sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::roles;
    use sea_orm::entity::*;
    use sea_orm::error::DbErr;

    if find_role_by_front_id(front_id).await?.is_some() {
        return Err(DbErr::Custom("That role already exists.".to_owned()));
    }

    let role = roles::ActiveModel {
        front_id: Set(front_id.to_owned()),
        name: Set(name.to_owned()),
        is_default: Set(false),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(get_db_pool())
    .await?;

    update_role_grants(role.id, grant_front_ids).await?;
    Ok(role)
}

/// Renames a role and replaces its grant set. The front id never changes
/// after creation. Callers are expected to reject builtin roles first.
pub async fn update_role(
    role_id: i32,
    name: &str,
    grant_front_ids: &[String],
) -> Result<(), sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::roles;
    use sea_orm::entity::*;
    use sea_orm::query::*;
    use sea_orm::sea_query::Expr;

    roles::Entity::update_many()
        .col_expr(roles::Column::Name, Expr::value(name.to_owned()))
        .filter(roles::Column::Id.eq(role_id))
        .exec(get_db_pool())
        .await?;

    update_role_grants(role_id, grant_front_ids).await
}

/// Creates the builtin roles on first boot. Existing rows are left alone,
/// so operator edits to grants survive restarts.
pub async fn seed_roles() -> Result<(), sea_orm::error::DbErr> {
    use crate::db::get_db_pool;
    use crate::orm::roles;
    use sea_orm::entity::*;
    use sea_orm::QueryFilter;

    let admin_grants: Vec<String> = CATALOG.iter().map(|e| e.front_id.to_owned()).collect();
    let to_strings = |grants: &[&str]| grants.iter().map(|g| (*g).to_owned()).collect();

    let seeds: Vec<(&str, &str, Vec<String>)> = vec![
        ("admin", "Admin", admin_grants),
        ("moderator", "Moderator", to_strings(MODERATOR_GRANTS)),
        (DEFAULT_ROLE_FRONT_ID, "Member", to_strings(COMMON_USER_GRANTS)),
        (BANNED_ROLE_FRONT_ID, "Banned", Vec::new()),
    ];

    for (front_id, name, grants) in seeds {
        let existing = roles::Entity::find()
            .filter(roles::Column::FrontId.eq(front_id))
            .one(get_db_pool())
            .await?;
        if existing.is_some() {
            continue;
        }

        let role = roles::ActiveModel {
            front_id: Set(front_id.to_owned()),
            name: Set(name.to_owned()),
            is_default: Set(true),
            created_at: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(get_db_pool())
        .await?;

        update_role_grants(role.id, &grants).await?;
        log::info!("Seeded builtin role '{}'.", front_id);
    }

    Ok(())
}
