//! User account services: registration, credential checks, bans, and
//! role assignment. Handlers in `web::account` and `web::admin` sit on
//! top of these.

use crate::db::get_db_pool;
use crate::orm::{roles, users};
use crate::permission::{BANNED_ROLE_FRONT_ID, DEFAULT_ROLE_FRONT_ID};
use crate::session::get_argon2;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{PasswordHasher, PasswordVerifier};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DbErr, FromQueryResult};
use serde::Serialize;

const USERS_PER_PAGE: u64 = 50;

/// A user's public profile with relational information.
#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct Profile {
    pub id: i32,
    pub name: String,
    pub created_at: chrono::NaiveDateTime,
    pub introduction: Option<String>,
    pub banned: bool,
    pub role_name: Option<String>,
    pub article_count: i64,
}

impl Profile {
    /// Returns a profile by id, or None for missing and deleted accounts.
    pub async fn get_by_id(id: i32) -> Result<Option<Self>, DbErr> {
        use sea_orm::{DbBackend, Statement};

        let sql = r#"
            SELECT
                u.id,
                u.name,
                u.created_at,
                u.introduction,
                u.banned,
                r.name AS role_name,
                (SELECT COUNT(*)
                   FROM articles a
                  WHERE a.author_id = u.id AND NOT a.deleted) AS article_count
            FROM users u
            LEFT JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1 AND NOT u.deleted
        "#;

        Profile::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![id.into()],
        ))
        .one(get_db_pool())
        .await
    }
}

/// Hash a plaintext password with the process-wide argon2 instance.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(get_argon2()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            log::error!("Stored password hash failed to parse: {}", err);
            false
        }
    }
}

/// Registers an account on the default member role.
pub async fn create_user(name: &str, email: &str, password: &str) -> Result<users::Model, DbErr> {
    let db = get_db_pool();

    let name_taken = users::Entity::find()
        .filter(users::Column::Name.eq(name))
        .count(db)
        .await?
        > 0;
    if name_taken {
        return Err(DbErr::Custom("Username is already taken.".to_owned()));
    }

    let email_taken = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .count(db)
        .await?
        > 0;
    if email_taken {
        return Err(DbErr::Custom("Email is already registered.".to_owned()));
    }

    let role = roles::Entity::find()
        .filter(roles::Column::FrontId.eq(DEFAULT_ROLE_FRONT_ID))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::Custom("Default member role is missing.".to_owned()))?;

    let hash = hash_password(password)
        .map_err(|err| DbErr::Custom(format!("Password hashing failed: {}", err)))?;

    users::ActiveModel {
        created_at: Set(Utc::now().naive_utc()),
        name: Set(name.to_owned()),
        email: Set(email.to_owned()),
        password: Set(hash),
        role_id: Set(role.id),
        super_admin: Set(false),
        banned: Set(false),
        deleted: Set(false),
        introduction: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
}

#[derive(Debug, PartialEq, Eq)]
pub enum LoginResultStatus {
    Success,
    BadName,
    BadPassword,
}

pub struct LoginResult {
    pub result: LoginResultStatus,
    pub user: Option<users::Model>,
}

impl LoginResult {
    fn success(user: users::Model) -> Self {
        Self {
            result: LoginResultStatus::Success,
            user: Some(user),
        }
    }
    fn fail(result: LoginResultStatus) -> Self {
        Self { result, user: None }
    }
}

/// Checks credentials against a username or an email address. Deleted
/// accounts cannot sign in; banned accounts can, they just hold no grants.
pub async fn login(name_or_email: &str, pass: &str) -> Result<LoginResult, DbErr> {
    let db = get_db_pool();

    let user = users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Name.eq(name_or_email))
                .add(users::Column::Email.eq(name_or_email)),
        )
        .one(db)
        .await?;

    let user = match user {
        Some(user) if !user.deleted => user,
        _ => return Ok(LoginResult::fail(LoginResultStatus::BadName)),
    };

    if !verify_password(&user.password, pass) {
        return Ok(LoginResult::fail(LoginResultStatus::BadPassword));
    }

    Ok(LoginResult::success(user))
}

pub async fn update_introduction(
    user_id: i32,
    introduction: Option<String>,
) -> Result<(), DbErr> {
    users::Entity::update_many()
        .col_expr(users::Column::Introduction, Expr::value(introduction))
        .filter(users::Column::Id.eq(user_id))
        .exec(get_db_pool())
        .await
        .map(|_| ())
}

/// Bans or unbans an account. The role swaps with the flag so the next
/// request's permission snapshot reflects the change.
pub async fn set_banned(target_id: i32, banned: bool) -> Result<(), DbErr> {
    let db = get_db_pool();

    let user = users::Entity::find_by_id(target_id)
        .one(db)
        .await?
        .filter(|user| !user.deleted)
        .ok_or_else(|| DbErr::Custom("User not found.".to_owned()))?;

    let front_id = if banned {
        BANNED_ROLE_FRONT_ID
    } else {
        DEFAULT_ROLE_FRONT_ID
    };
    let role = roles::Entity::find()
        .filter(roles::Column::FrontId.eq(front_id))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::Custom("Builtin role is missing.".to_owned()))?;

    let mut active: users::ActiveModel = user.into();
    active.banned = Set(banned);
    active.role_id = Set(role.id);
    active.update(db).await.map(|_| ())
}

/// Moves an account onto the given role. Assigning the banned role sets
/// the ban flag; any other role clears it.
pub async fn set_role(target_id: i32, role: &roles::Model) -> Result<(), DbErr> {
    let db = get_db_pool();

    let user = users::Entity::find_by_id(target_id)
        .one(db)
        .await?
        .filter(|user| !user.deleted)
        .ok_or_else(|| DbErr::Custom("User not found.".to_owned()))?;

    let mut active: users::ActiveModel = user.into();
    active.role_id = Set(role.id);
    active.banned = Set(role.front_id == BANNED_ROLE_FRONT_ID);
    active.update(db).await.map(|_| ())
}

/// One row of the management user list.
#[derive(Debug, Serialize)]
pub struct UserOverview {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: chrono::NaiveDateTime,
    pub role_id: i32,
    pub role_name: String,
    pub banned: bool,
    pub super_admin: bool,
}

/// Pages through accounts for the management list, oldest first.
pub async fn list_users_page(page: u64) -> Result<Vec<UserOverview>, DbErr> {
    let page = page.max(1);
    let rows = users::Entity::find()
        .find_also_related(roles::Entity)
        .filter(users::Column::Deleted.eq(false))
        .order_by_asc(users::Column::Id)
        .offset((page - 1) * USERS_PER_PAGE)
        .limit(USERS_PER_PAGE)
        .all(get_db_pool())
        .await?;

    Ok(rows
        .into_iter()
        .map(|(user, role)| UserOverview {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            role_id: user.role_id,
            role_name: role.map(|role| role.name).unwrap_or_default(),
            banned: user.banned,
            super_admin: user.super_admin,
        })
        .collect())
}
