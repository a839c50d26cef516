//! Administration and moderation endpoints under `/manage`, plus the
//! user ban and role-assignment routes.
//!
//! The `/manage` scope requires the manage permission as a whole; pages
//! with their own permission add a second guard. Where one path carries
//! different permissions per method, the handlers check directly.

use super::{db_error, redirect_to};
use crate::middleware::{ClientCtx, RequirePermission};
use crate::permission::{
    self, catalog_entries_for_module, module_list, valid_module, PermissionAction, PermissionId,
    RoleAction, UserAction,
};
use crate::settings::{get_settings, SettingValue};
use crate::user;
use actix_web::{error, web, Error, HttpResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

const MANAGE: &[PermissionId] = &[PermissionId::User(UserAction::Manage)];
const USER_LIST: &[PermissionId] = &[PermissionId::User(UserAction::ListAccess)];
const PERMISSION_ACCESS: &[PermissionId] =
    &[PermissionId::Permission(PermissionAction::Access)];
const ROLE_EDIT: &[PermissionId] = &[PermissionId::Role(RoleAction::Edit)];
const BAN: &[PermissionId] = &[
    PermissionId::User(UserAction::Manage),
    PermissionId::User(UserAction::Ban),
];
const SET_ROLE: &[PermissionId] = &[
    PermissionId::User(UserAction::Manage),
    PermissionId::User(UserAction::UpdateRole),
];

static ROLE_FRONT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{1,50}$").expect("invalid role front id pattern"));

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(
        web::scope("/manage")
            .wrap(RequirePermission::new(MANAGE))
            .service(web::resource("").route(web::get().to(view_manage_index)))
            .service(
                web::resource("/settings")
                    .route(web::get().to(view_settings))
                    .route(web::post().to(update_setting)),
            )
            .service(
                web::resource("/users")
                    .wrap(RequirePermission::new(USER_LIST))
                    .route(web::get().to(view_users)),
            )
            .service(
                web::resource("/permissions")
                    .wrap(RequirePermission::new(PERMISSION_ACCESS))
                    .route(web::get().to(view_permissions)),
            )
            .service(
                web::resource("/roles")
                    .route(web::get().to(view_roles))
                    .route(web::post().to(create_role)),
            )
            .service(
                web::resource("/roles/{role_id}/edit")
                    .wrap(RequirePermission::new(ROLE_EDIT))
                    .route(web::get().to(view_role_edit))
                    .route(web::post().to(update_role)),
            ),
    )
    .service(
        web::resource("/users/{user_id}/ban")
            .wrap(RequirePermission::new(BAN))
            .route(web::post().to(ban_user)),
    )
    .service(
        web::resource("/users/{user_id}/set_role")
            .wrap(RequirePermission::new(SET_ROLE))
            .route(web::post().to(set_user_role)),
    );
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u64>,
}

#[derive(Deserialize)]
struct ModuleQuery {
    module: Option<String>,
}

#[derive(Deserialize)]
struct SettingForm {
    key: String,
    value: String,
    value_type: String,
}

/// Role forms submit grants as a comma-separated front id list, since
/// urlencoded bodies cannot carry repeated fields through `web::Form`.
#[derive(Deserialize)]
struct RoleCreateForm {
    front_id: String,
    name: String,
    #[serde(default)]
    permissions: String,
}

#[derive(Deserialize)]
struct RoleUpdateForm {
    name: String,
    #[serde(default)]
    permissions: String,
}

#[derive(Deserialize)]
struct BanForm {
    banned: bool,
}

#[derive(Deserialize)]
struct SetRoleForm {
    role_front_id: String,
}

async fn view_manage_index() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "sections": ["users", "permissions", "roles", "settings"],
    })))
}

async fn view_settings() -> Result<HttpResponse, Error> {
    let rows = get_settings().all().await.map_err(db_error)?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn update_setting(form: web::Form<SettingForm>) -> Result<HttpResponse, Error> {
    let key = form.key.trim();
    if key.is_empty() {
        return Err(error::ErrorBadRequest("Setting key is required."));
    }

    let value = SettingValue::parse(&form.value, &form.value_type)
        .ok_or_else(|| error::ErrorBadRequest("Unknown setting type or unusable value."))?;

    get_settings()
        .set_value(key, value)
        .await
        .map_err(db_error)?;

    Ok(redirect_to("/manage/settings"))
}

async fn view_users(query: web::Query<PageQuery>) -> Result<HttpResponse, Error> {
    let page = query.page.unwrap_or(1).max(1);
    let users = user::list_users_page(page).await.map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "page": page,
        "users": users,
    })))
}

/// The permission catalog grouped by module, with the requester's own
/// enabled state attached. Role forms only offer what the requester holds.
async fn view_permissions(
    client: ClientCtx,
    query: web::Query<ModuleQuery>,
) -> Result<HttpResponse, Error> {
    let filter = match query.module.as_deref() {
        Some("all") | None => None,
        Some(module) if valid_module(module) => Some(module),
        Some(_) => return Err(error::ErrorBadRequest("Unknown module.")),
    };

    let mut groups = Vec::new();
    for module in module_list() {
        if let Some(filter) = filter {
            if module != filter {
                continue;
            }
        }
        let items: Vec<serde_json::Value> = catalog_entries_for_module(module)
            .map(|entry| {
                serde_json::json!({
                    "id": entry.id.to_string(),
                    "front_id": entry.front_id,
                    "name": entry.name,
                    "enabled_for_me": client.permit(entry.id),
                })
            })
            .collect();
        groups.push(serde_json::json!({ "module": module, "items": items }));
    }

    Ok(HttpResponse::Ok().json(groups))
}

async fn view_roles(client: ClientCtx) -> Result<HttpResponse, Error> {
    client.require_permission(PermissionId::Role(RoleAction::Access))?;

    let roles = permission::list_roles().await.map_err(db_error)?;

    let mut out = Vec::with_capacity(roles.len());
    for role in roles {
        let granted = permission::granted_front_ids_for_role(role.id)
            .await
            .map_err(db_error)?;
        let mut granted: Vec<String> = granted.into_iter().collect();
        granted.sort_unstable();

        out.push(serde_json::json!({
            "id": role.id,
            "front_id": role.front_id,
            "name": role.name,
            "is_default": role.is_default,
            "created_at": role.created_at,
            "permissions": granted,
        }));
    }

    Ok(HttpResponse::Ok().json(out))
}

/// Splits a submitted grant list and keeps only front ids the requester
/// holds. Nobody hands out permissions they do not have themselves.
fn filtered_grants(client: &ClientCtx, submitted: &str) -> Vec<String> {
    let mine = client.permissions().enabled_front_ids();
    submitted
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty() && mine.contains(id))
        .map(str::to_owned)
        .collect()
}

async fn create_role(
    client: ClientCtx,
    form: web::Form<RoleCreateForm>,
) -> Result<HttpResponse, Error> {
    client.require_permission(PermissionId::Role(RoleAction::Add))?;

    let front_id = form.front_id.trim();
    let name = form.name.trim();
    if !ROLE_FRONT_ID_RE.is_match(front_id) {
        return Err(error::ErrorBadRequest(
            "Role front id must be 1-50 lowercase letters, digits, or underscores.",
        ));
    }
    if name.is_empty() || name.chars().count() > 50 {
        return Err(error::ErrorBadRequest("Role name must be 1-50 characters."));
    }

    let grants = filtered_grants(&client, &form.permissions);
    permission::create_role(front_id, name, &grants)
        .await
        .map_err(db_error)?;

    Ok(redirect_to("/manage/roles"))
}

async fn view_role_edit(path: web::Path<i32>) -> Result<HttpResponse, Error> {
    let role_id = path.into_inner();

    let role = permission::find_role(role_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Role not found."))?;

    let granted = permission::granted_front_ids_for_role(role.id)
        .await
        .map_err(db_error)?;
    let mut granted: Vec<String> = granted.into_iter().collect();
    granted.sort_unstable();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": role.id,
        "front_id": role.front_id,
        "name": role.name,
        "is_default": role.is_default,
        "permissions": granted,
    })))
}

async fn update_role(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<RoleUpdateForm>,
) -> Result<HttpResponse, Error> {
    let role_id = path.into_inner();

    let role = permission::find_role(role_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Role not found."))?;

    // Builtin roles keep their seeded shape.
    if role.is_default {
        return Err(error::ErrorForbidden("Builtin roles cannot be edited."));
    }

    let name = form.name.trim();
    if name.is_empty() || name.chars().count() > 50 {
        return Err(error::ErrorBadRequest("Role name must be 1-50 characters."));
    }

    let grants = filtered_grants(&client, &form.permissions);
    permission::update_role(role_id, name, &grants)
        .await
        .map_err(db_error)?;

    Ok(redirect_to("/manage/roles"))
}

async fn ban_user(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<BanForm>,
) -> Result<HttpResponse, Error> {
    let actor_id = client.require_login()?;
    let target_id = path.into_inner();

    if actor_id == target_id {
        return Err(error::ErrorBadRequest("You cannot ban yourself."));
    }

    user::set_banned(target_id, form.banned)
        .await
        .map_err(db_error)?;

    log::info!(
        "User {} set banned={} on user {}.",
        actor_id,
        form.banned,
        target_id
    );
    Ok(redirect_to("/manage/users"))
}

async fn set_user_role(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<SetRoleForm>,
) -> Result<HttpResponse, Error> {
    let actor_id = client.require_login()?;
    let target_id = path.into_inner();

    let role = permission::find_role_by_front_id(form.role_front_id.trim())
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorBadRequest("Unknown role."))?;

    // Promoting into the builtin elevated roles takes its own permission.
    match role.front_id.as_str() {
        "moderator" => {
            client.require_permission(PermissionId::User(UserAction::SetModerator))?
        }
        "admin" => client.require_permission(PermissionId::User(UserAction::SetAdmin))?,
        _ => {}
    }

    user::set_role(target_id, &role).await.map_err(db_error)?;

    log::info!(
        "User {} moved user {} onto role '{}'.",
        actor_id,
        target_id,
        role.front_id
    );
    Ok(redirect_to("/manage/users"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::ClientCtxInner;
    use crate::permission::PermissionData;
    use actix_web::dev::Extensions;
    use actix_web::web::Data;
    use std::collections::HashSet;

    fn ctx_holding(front_ids: &[&str], is_super: bool) -> ClientCtx {
        let grants: HashSet<String> = front_ids.iter().map(|id| id.to_string()).collect();
        let mut extensions = Extensions::new();
        extensions.insert(Data::new(ClientCtxInner {
            user: None,
            permissions: PermissionData::update(&grants, is_super),
        }));
        ClientCtx::get_or_default_from_extensions(&mut extensions)
    }

    #[test]
    fn role_front_ids_are_short_snake_case() {
        assert!(ROLE_FRONT_ID_RE.is_match("moderator"));
        assert!(ROLE_FRONT_ID_RE.is_match("tier_2_support"));
        assert!(!ROLE_FRONT_ID_RE.is_match(""));
        assert!(!ROLE_FRONT_ID_RE.is_match("Moderator"));
        assert!(!ROLE_FRONT_ID_RE.is_match("two words"));
        assert!(!ROLE_FRONT_ID_RE.is_match(&"a".repeat(51)));
    }

    #[test]
    fn grants_are_limited_to_what_the_granter_holds() {
        let client = ctx_holding(&["article_create", "article_update"], false);

        let grants = filtered_grants(&client, " article_create ,user_ban,, article_update");
        assert_eq!(grants, vec!["article_create", "article_update"]);

        let nothing = ctx_holding(&[], false);
        assert!(filtered_grants(&nothing, "article_create").is_empty());
    }

    #[test]
    fn super_admins_can_hand_out_anything_in_the_catalog() {
        let client = ctx_holding(&[], true);

        let grants = filtered_grants(&client, "article_create,user_ban");
        assert_eq!(grants, vec!["article_create", "user_ban"]);
    }
}
