//! Article service layer: fetching, posting, replying and moderation.

pub mod tree;
pub mod vote;

use crate::db::get_db_pool;
use crate::orm::articles;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ConnectionTrait, DatabaseTransaction, DbBackend, DbErr,
    FromQueryResult, Statement,
};
use serde::Serialize;
use tree::ArticleNode;

/// One row of the article page fetch: the article joined with its author
/// name, aggregate counters and the viewer's own state.
#[derive(Clone, Debug, Serialize, FromQueryResult)]
pub struct ArticleRow {
    pub id: i32,
    pub title: String,
    pub author_id: i32,
    pub author_name: String,
    pub content: String,
    pub link: Option<String>,
    pub category: Option<String>,
    pub reply_to: i32,
    pub reply_depth: i32,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub vote_up_count: i64,
    pub vote_down_count: i64,
    pub participate_count: i32,
    pub children_count: i64,
    pub viewer_vote: Option<String>,
    pub viewer_react: Option<String>,
    pub viewer_saved: bool,
    pub viewer_subscribed: bool,
    pub locked: bool,
}

/// One row of the front page listing.
#[derive(Clone, Debug, Serialize, FromQueryResult)]
pub struct ArticleSummary {
    pub id: i32,
    pub title: String,
    pub author_id: i32,
    pub author_name: String,
    pub link: Option<String>,
    pub category: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub participate_count: i32,
    pub children_count: i64,
    pub vote_up_count: i64,
    pub vote_down_count: i64,
    pub pinned: bool,
    pub locked: bool,
}

const TREE_SQL: &str = r#"
    WITH RECURSIVE tree AS (
        SELECT a.id, a.title, a.author_id, a.content, a.link, a.category,
               a.reply_to, a.reply_depth, a.created_at, a.updated_at,
               a.participate_count, a.locked, 0 AS cur_depth
        FROM articles a
        WHERE a.id = $1 AND a.deleted = FALSE
        UNION ALL
        SELECT c.id, c.title, c.author_id, c.content, c.link, c.category,
               c.reply_to, c.reply_depth, c.created_at, c.updated_at,
               c.participate_count, c.locked, t.cur_depth + 1
        FROM articles c
        JOIN tree t ON c.reply_to = t.id
        WHERE c.deleted = FALSE AND t.cur_depth < $3
    )
    SELECT t.id, t.title, t.author_id, u.name AS author_name, t.content,
           t.link, t.category, t.reply_to, t.reply_depth, t.created_at,
           t.updated_at, t.participate_count, t.locked,
           (SELECT COUNT(*) FROM article_votes v
             WHERE v.article_id = t.id AND v.vote_type = 'up') AS vote_up_count,
           (SELECT COUNT(*) FROM article_votes v
             WHERE v.article_id = t.id AND v.vote_type = 'down') AS vote_down_count,
           (SELECT COUNT(*) FROM articles c
             WHERE c.reply_to = t.id AND c.deleted = FALSE) AS children_count,
           (SELECT v.vote_type FROM article_votes v
             WHERE v.article_id = t.id AND v.user_id = $2) AS viewer_vote,
           (SELECT r.react_id FROM article_reacts r
             WHERE r.article_id = t.id AND r.user_id = $2) AS viewer_react,
           EXISTS (SELECT 1 FROM article_saves s
             WHERE s.article_id = t.id AND s.user_id = $2) AS viewer_saved,
           EXISTS (SELECT 1 FROM article_subs s
             WHERE s.article_id = t.id AND s.user_id = $2) AS viewer_subscribed
    FROM tree t
    JOIN users u ON u.id = t.author_id
    ORDER BY t.cur_depth ASC, t.created_at ASC, t.id ASC
"#;

const LIST_SQL: &str = r#"
    SELECT a.id, a.title, a.author_id, u.name AS author_name, a.link,
           a.category, a.created_at, a.participate_count, a.locked,
           (a.pinned_expire_at IS NOT NULL AND a.pinned_expire_at > NOW()) AS pinned,
           (SELECT COUNT(*) FROM articles c
             WHERE c.reply_to = a.id AND c.deleted = FALSE) AS children_count,
           (SELECT COUNT(*) FROM article_votes v
             WHERE v.article_id = a.id AND v.vote_type = 'up') AS vote_up_count,
           (SELECT COUNT(*) FROM article_votes v
             WHERE v.article_id = a.id AND v.vote_type = 'down') AS vote_down_count
    FROM articles a
    JOIN users u ON u.id = a.author_id
    WHERE a.reply_to = 0 AND a.deleted = FALSE
      AND ($1 = '' OR a.category = $1)
    ORDER BY pinned DESC, a.list_weight DESC, a.id DESC
    LIMIT $2 OFFSET $3
"#;

const SAVED_SQL: &str = r#"
    SELECT a.id, a.title, a.author_id, u.name AS author_name, a.link,
           a.category, a.created_at, a.participate_count, a.locked,
           FALSE AS pinned,
           (SELECT COUNT(*) FROM articles c
             WHERE c.reply_to = a.id AND c.deleted = FALSE) AS children_count,
           (SELECT COUNT(*) FROM article_votes v
             WHERE v.article_id = a.id AND v.vote_type = 'up') AS vote_up_count,
           (SELECT COUNT(*) FROM article_votes v
             WHERE v.article_id = a.id AND v.vote_type = 'down') AS vote_down_count
    FROM article_saves s
    JOIN articles a ON a.id = s.article_id AND a.deleted = FALSE
    JOIN users u ON u.id = a.author_id
    WHERE s.user_id = $1
    ORDER BY s.created_at DESC
    LIMIT $2 OFFSET $3
"#;

/// Fetches an article with its reply tree, evaluated for `viewer_id`.
/// Guests pass 0 and get empty viewer state. Returns None for unknown or
/// deleted articles.
pub async fn fetch_article_tree(
    article_id: i32,
    viewer_id: i32,
) -> Result<Option<ArticleNode>, DbErr> {
    let rows = ArticleRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        TREE_SQL,
        vec![
            article_id.into(),
            viewer_id.into(),
            (tree::REPLY_DEPTH_LIMIT as i32).into(),
        ],
    ))
    .all(get_db_pool())
    .await?;

    let root = match rows.iter().find(|r| r.id == article_id) {
        Some(root) => root.clone(),
        None => return Ok(None),
    };

    Ok(Some(tree::build(root, rows)))
}

/// The front page listing: pinned articles first, then by decayed score.
pub async fn fetch_article_list(
    category: Option<&str>,
    page: u64,
) -> Result<Vec<ArticleSummary>, DbErr> {
    let per_page = crate::app_config::limits().articles_per_page as i64;
    let offset = (page.max(1) as i64 - 1) * per_page;

    ArticleSummary::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        LIST_SQL,
        vec![
            category.unwrap_or("").to_owned().into(),
            per_page.into(),
            offset.into(),
        ],
    ))
    .all(get_db_pool())
    .await
}

/// Articles the user saved, newest save first.
pub async fn fetch_saved_list(user_id: i32, page: u64) -> Result<Vec<ArticleSummary>, DbErr> {
    let per_page = crate::app_config::limits().articles_per_page as i64;
    let offset = (page.max(1) as i64 - 1) * per_page;

    ArticleSummary::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        SAVED_SQL,
        vec![user_id.into(), per_page.into(), offset.into()],
    ))
    .all(get_db_pool())
    .await
}

/// The bare article row, without counters. None for unknown or deleted.
pub async fn get_article(article_id: i32) -> Result<Option<articles::Model>, DbErr> {
    articles::Entity::find_by_id(article_id)
        .one(get_db_pool())
        .await
        .map(|article| article.filter(|a| !a.deleted))
}

/// Creates a top-level article and subscribes the author to it.
pub async fn create_article(
    author_id: i32,
    title: &str,
    content: &str,
    link: Option<&str>,
    category: Option<&str>,
) -> Result<i32, DbErr> {
    let db = get_db_pool();
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let article = articles::ActiveModel {
        title: Set(title.to_owned()),
        author_id: Set(author_id),
        content: Set(content.to_owned()),
        link: Set(link.map(|s| s.to_owned())),
        category: Set(category.map(|s| s.to_owned())),
        reply_to: Set(0),
        reply_depth: Set(0),
        reply_root_id: Set(0),
        list_weight: Set(0.0),
        reply_weight: Set(0.0),
        participate_count: Set(1),
        deleted: Set(false),
        locked: Set(false),
        pinned_expire_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let article = article.insert(&txn).await?;

    // The author follows their own article from the start.
    vote::subscribe(&txn, article.id, author_id).await?;

    txn.commit().await?;
    Ok(article.id)
}

/// Creates a reply beneath `parent_id` and returns the new article id.
///
/// Rejects replies into locked threads and replies that would nest past
/// the display depth limit. Subscription and notification follow-ups are
/// best effort once the reply row is committed.
pub async fn create_reply(author_id: i32, parent_id: i32, content: &str) -> Result<i32, DbErr> {
    let db = get_db_pool();

    let parent = articles::Entity::find_by_id(parent_id)
        .one(db)
        .await?
        .filter(|a| !a.deleted)
        .ok_or_else(|| DbErr::Custom("Article not found.".to_owned()))?;

    if parent.reply_depth as usize >= tree::REPLY_DEPTH_LIMIT {
        return Err(DbErr::Custom("Reply depth limit reached.".to_owned()));
    }

    let root_id = if parent.reply_to == 0 {
        parent.id
    } else {
        parent.reply_root_id
    };

    // The lock lives on the thread root.
    let locked = if parent.reply_to == 0 {
        parent.locked
    } else {
        articles::Entity::find_by_id(root_id)
            .one(db)
            .await?
            .map(|a| a.locked)
            .unwrap_or(false)
    };
    if locked {
        return Err(DbErr::Custom("Article is locked.".to_owned()));
    }

    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let reply = articles::ActiveModel {
        title: Set(String::new()),
        author_id: Set(author_id),
        content: Set(content.to_owned()),
        link: Set(None),
        category: Set(None),
        reply_to: Set(parent.id),
        reply_depth: Set(parent.reply_depth + 1),
        reply_root_id: Set(root_id),
        list_weight: Set(0.0),
        reply_weight: Set(0.0),
        participate_count: Set(0),
        deleted: Set(false),
        locked: Set(false),
        pinned_expire_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let reply = reply.insert(&txn).await?;

    refresh_participants(&txn, root_id).await?;
    txn.commit().await?;

    // Follow the reply unless an ancestor subscription already covers it.
    match vote::subscribed_in_chain(parent.id, author_id).await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(err) = vote::subscribe(db, reply.id, author_id).await {
                log::warn!(
                    "Failed to auto-subscribe user {} to article {}: {}",
                    author_id,
                    reply.id,
                    err
                );
            }
        }
        Err(err) => {
            log::warn!(
                "Failed to check subscriptions for user {}: {}",
                author_id,
                err
            );
        }
    }

    if let Err(err) = crate::notifications::notify_reply(&reply).await {
        log::warn!(
            "Failed to deliver reply notifications for article {}: {}",
            reply.id,
            err
        );
    }

    Ok(reply.id)
}

/// Applies an edit. Replies keep their empty title and carry no link or
/// category, no matter what the form sent.
pub async fn update_article(
    article_id: i32,
    title: &str,
    content: &str,
    link: Option<&str>,
    category: Option<&str>,
) -> Result<(), DbErr> {
    let db = get_db_pool();

    let article = articles::Entity::find_by_id(article_id)
        .one(db)
        .await?
        .filter(|a| !a.deleted)
        .ok_or_else(|| DbErr::Custom("Article not found.".to_owned()))?;

    let is_root = article.reply_to == 0;
    let mut active: articles::ActiveModel = article.into();

    if is_root {
        active.title = Set(title.to_owned());
        active.link = Set(link.map(|s| s.to_owned()));
        active.category = Set(category.map(|s| s.to_owned()));
    }
    active.content = Set(content.to_owned());
    active.updated_at = Set(Utc::now().naive_utc());
    active.update(db).await?;

    Ok(())
}

/// Soft deletion. The reply chain below a deleted article drops out of
/// the page fetch with it.
pub async fn delete_article(article_id: i32) -> Result<(), DbErr> {
    let db = get_db_pool();

    let result = articles::Entity::update_many()
        .col_expr(articles::Column::Deleted, Expr::value(true))
        .col_expr(
            articles::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(articles::Column::Id.eq(article_id))
        .filter(articles::Column::Deleted.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(DbErr::Custom("Article not found.".to_owned()));
    }
    Ok(())
}

/// Locks or unlocks a thread root against new replies.
pub async fn set_locked(article_id: i32, locked: bool) -> Result<(), DbErr> {
    let db = get_db_pool();

    let result = articles::Entity::update_many()
        .col_expr(articles::Column::Locked, Expr::value(locked))
        .filter(articles::Column::Id.eq(article_id))
        .filter(articles::Column::ReplyTo.eq(0))
        .filter(articles::Column::Deleted.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(DbErr::Custom("Only thread roots can be locked.".to_owned()));
    }
    Ok(())
}

/// Pins an article to the top of the list until the expiry passes. Zero
/// hours unpins.
pub async fn set_pinned(article_id: i32, hours: i64) -> Result<(), DbErr> {
    let db = get_db_pool();

    let expire = if hours > 0 {
        Some(Utc::now().naive_utc() + chrono::Duration::hours(hours))
    } else {
        None
    };

    let result = articles::Entity::update_many()
        .col_expr(articles::Column::PinnedExpireAt, Expr::value(expire))
        .filter(articles::Column::Id.eq(article_id))
        .filter(articles::Column::ReplyTo.eq(0))
        .filter(articles::Column::Deleted.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(DbErr::Custom("Only thread roots can be pinned.".to_owned()));
    }
    Ok(())
}

/// Recounts the distinct authors in a thread onto its root.
async fn refresh_participants(txn: &DatabaseTransaction, root_id: i32) -> Result<(), DbErr> {
    let sql = r#"
        UPDATE articles SET participate_count = (
            SELECT COUNT(DISTINCT author_id)::INT FROM articles
            WHERE (id = $1 OR reply_root_id = $1) AND deleted = FALSE
        )
        WHERE id = $1
    "#;

    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![root_id.into()],
    ))
    .await?;

    Ok(())
}
