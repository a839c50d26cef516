//! Reply notifications for subscribed users.

use crate::db::get_db_pool;
use crate::orm::{articles, notifications, users};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ConnectionTrait, DbBackend, DbErr, Statement,
};

pub const KIND_REPLY: &str = "reply";

/// Fans a new reply out to everyone subscribed anywhere on its ancestor
/// chain, the direct parent included. The author never notifies
/// themselves, and a user subscribed at several levels still gets one row.
/// Returns how many notifications were written.
pub async fn notify_reply(reply: &articles::Model) -> Result<u64, DbErr> {
    let db = get_db_pool();

    let author = users::Entity::find_by_id(reply.author_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::Custom("Reply author not found.".to_owned()))?;

    let message = format!("{} replied to an article you follow.", author.name);

    let sql = r#"
        WITH RECURSIVE chain AS (
            SELECT id, reply_to FROM articles WHERE id = $1
            UNION ALL
            SELECT a.id, a.reply_to FROM articles a
            JOIN chain c ON a.id = c.reply_to
        )
        INSERT INTO notifications
            (user_id, kind, message, source_user_id, source_article_id, is_read, created_at)
        SELECT DISTINCT s.user_id, $3, $4, $2, $5, FALSE, NOW()
        FROM article_subs s
        JOIN chain c ON s.article_id = c.id
        WHERE s.user_id <> $2
    "#;

    let result = db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![
                reply.reply_to.into(),
                reply.author_id.into(),
                KIND_REPLY.into(),
                message.into(),
                reply.id.into(),
            ],
        ))
        .await?;

    Ok(result.rows_affected())
}

/// Count unread notifications for a user.
pub async fn count_unread(user_id: i32) -> Result<i64, DbErr> {
    let count = notifications::Entity::find()
        .filter(notifications::Column::UserId.eq(user_id))
        .filter(notifications::Column::IsRead.eq(false))
        .count(get_db_pool())
        .await?;

    Ok(count as i64)
}

/// One page of a user's notifications, newest first.
pub async fn list_page(user_id: i32, page: u64) -> Result<Vec<notifications::Model>, DbErr> {
    let per_page = crate::app_config::limits().notifications_per_page as u64;
    let offset = (page.max(1) - 1) * per_page;

    notifications::Entity::find()
        .filter(notifications::Column::UserId.eq(user_id))
        .order_by_desc(notifications::Column::CreatedAt)
        .order_by_desc(notifications::Column::Id)
        .offset(offset)
        .limit(per_page)
        .all(get_db_pool())
        .await
}

/// Marks the given notifications read, scoped to the owner so one user
/// cannot clear another's.
pub async fn mark_read(user_id: i32, ids: &[i32]) -> Result<(), DbErr> {
    if ids.is_empty() {
        return Ok(());
    }

    notifications::Entity::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .col_expr(
            notifications::Column::ReadAt,
            Expr::value(chrono::Utc::now().naive_utc()),
        )
        .filter(notifications::Column::UserId.eq(user_id))
        .filter(notifications::Column::Id.is_in(ids.to_vec()))
        .filter(notifications::Column::IsRead.eq(false))
        .exec(get_db_pool())
        .await?;

    Ok(())
}

/// Marks every unread notification read for a user.
pub async fn mark_all_read(user_id: i32) -> Result<(), DbErr> {
    notifications::Entity::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .col_expr(
            notifications::Column::ReadAt,
            Expr::value(chrono::Utc::now().naive_utc()),
        )
        .filter(notifications::Column::UserId.eq(user_id))
        .filter(notifications::Column::IsRead.eq(false))
        .exec(get_db_pool())
        .await?;

    Ok(())
}
