//! Vote, react, save and subscribe toggles.
//!
//! Every toggle runs inside one transaction and reports what it did with a
//! small signal the frontend can apply without refetching the page.

use crate::db::get_db_pool;
use crate::orm::{article_reacts, article_saves, article_subs, article_votes};
use article_votes::VoteType;
use chrono::Utc;
use sea_orm::entity::*;
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbBackend, DbErr, QueryFilter, Statement,
    TransactionTrait,
};

/// React identifiers the frontend knows how to render.
pub const REACT_IDS: &[&str] = &["grinning", "confused", "eyes", "party", "thanks"];

pub fn valid_react_id(react_id: &str) -> bool {
    REACT_IDS.contains(&react_id)
}

/// What a toggle did. Serialized as 1 (added), 2 (updated) and -1
/// (canceled) on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleSignal {
    Added,
    Updated,
    Canceled,
}

impl ToggleSignal {
    pub fn as_i8(self) -> i8 {
        match self {
            ToggleSignal::Added => 1,
            ToggleSignal::Updated => 2,
            ToggleSignal::Canceled => -1,
        }
    }
}

/// The three-way toggle rule shared by votes and reacts. Kept apart from
/// the storage calls so it can be checked on its own.
fn toggle_outcome<T: PartialEq + ?Sized>(previous: Option<&T>, requested: &T) -> ToggleSignal {
    match previous {
        None => ToggleSignal::Added,
        Some(prev) if prev == requested => ToggleSignal::Canceled,
        Some(_) => ToggleSignal::Updated,
    }
}

/// Casts or toggles a vote. Voting the same way twice cancels the vote;
/// voting the other way flips the existing row, so a user can never hold
/// two votes on one article.
pub async fn toggle_vote(
    article_id: i32,
    user_id: i32,
    vote_type: VoteType,
) -> Result<ToggleSignal, DbErr> {
    let db = get_db_pool();
    let txn = db.begin().await?;

    let existing = article_votes::Entity::find_by_id((article_id, user_id))
        .one(&txn)
        .await?;

    let signal = toggle_outcome(existing.as_ref().map(|row| &row.vote_type), &vote_type);

    match (existing, signal) {
        (Some(row), ToggleSignal::Canceled) => {
            row.delete(&txn).await?;
        }
        (Some(row), _) => {
            let mut active: article_votes::ActiveModel = row.into();
            active.vote_type = Set(vote_type);
            active.update(&txn).await?;
        }
        (None, _) => {
            article_votes::ActiveModel {
                article_id: Set(article_id),
                user_id: Set(user_id),
                vote_type: Set(vote_type),
                created_at: Set(Utc::now().naive_utc()),
            }
            .insert(&txn)
            .await?;
        }
    }

    refresh_weights(&txn, article_id).await?;
    txn.commit().await?;

    Ok(signal)
}

/// Sets or toggles a react. Returns the signal together with the react id
/// the user held before, empty when there was none, so the frontend can
/// move its highlight without refetching.
pub async fn toggle_react(
    article_id: i32,
    user_id: i32,
    react_id: &str,
) -> Result<(ToggleSignal, String), DbErr> {
    let db = get_db_pool();
    let txn = db.begin().await?;

    let existing = article_reacts::Entity::find_by_id((article_id, user_id))
        .one(&txn)
        .await?;

    let previous = existing.as_ref().map(|row| row.react_id.clone());
    let signal = toggle_outcome(previous.as_deref(), react_id);

    match (existing, signal) {
        (Some(row), ToggleSignal::Canceled) => {
            row.delete(&txn).await?;
        }
        (Some(row), _) => {
            let mut active: article_reacts::ActiveModel = row.into();
            active.react_id = Set(react_id.to_owned());
            active.update(&txn).await?;
        }
        (None, _) => {
            article_reacts::ActiveModel {
                article_id: Set(article_id),
                user_id: Set(user_id),
                react_id: Set(react_id.to_owned()),
                created_at: Set(Utc::now().naive_utc()),
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;
    Ok((signal, previous.unwrap_or_default()))
}

/// Saves an article to the user's list, or takes it back out.
pub async fn toggle_save(article_id: i32, user_id: i32) -> Result<ToggleSignal, DbErr> {
    let db = get_db_pool();

    let deleted = article_saves::Entity::delete_many()
        .filter(article_saves::Column::ArticleId.eq(article_id))
        .filter(article_saves::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    if deleted.rows_affected > 0 {
        return Ok(ToggleSignal::Canceled);
    }

    article_saves::ActiveModel {
        article_id: Set(article_id),
        user_id: Set(user_id),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?;

    Ok(ToggleSignal::Added)
}

/// Subscribes the user to an article's replies, or unsubscribes them.
pub async fn toggle_subscribe(article_id: i32, user_id: i32) -> Result<ToggleSignal, DbErr> {
    let db = get_db_pool();

    let deleted = article_subs::Entity::delete_many()
        .filter(article_subs::Column::ArticleId.eq(article_id))
        .filter(article_subs::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    if deleted.rows_affected > 0 {
        return Ok(ToggleSignal::Canceled);
    }

    subscribe(db, article_id, user_id).await?;
    Ok(ToggleSignal::Added)
}

/// Inserts a subscription row. Callers decide whether one is wanted.
pub async fn subscribe<C>(db: &C, article_id: i32, user_id: i32) -> Result<(), DbErr>
where
    C: sea_orm::ConnectionTrait,
{
    article_subs::ActiveModel {
        article_id: Set(article_id),
        user_id: Set(user_id),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?;

    Ok(())
}

/// True when the user already subscribes to `article_id` or any article
/// above it in the reply chain.
pub async fn subscribed_in_chain(article_id: i32, user_id: i32) -> Result<bool, DbErr> {
    let db = get_db_pool();

    let sql = r#"
        WITH RECURSIVE chain AS (
            SELECT id, reply_to FROM articles WHERE id = $1
            UNION ALL
            SELECT a.id, a.reply_to FROM articles a
            JOIN chain c ON a.id = c.reply_to
        )
        SELECT EXISTS (
            SELECT 1 FROM article_subs s
            JOIN chain c ON s.article_id = c.id
            WHERE s.user_id = $2
        ) AS subscribed
    "#;

    let row = db
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![article_id.into(), user_id.into()],
        ))
        .await?;

    match row {
        Some(row) => row.try_get("", "subscribed"),
        None => Ok(false),
    }
}

/// Recomputes the article's score and its decayed front page weight from
/// the vote rows. Runs inside the toggle's transaction so the counters can
/// never drift from the rows.
async fn refresh_weights(txn: &DatabaseTransaction, article_id: i32) -> Result<(), DbErr> {
    let sql = r#"
        UPDATE articles SET
            reply_weight = v.score,
            list_weight = v.score / POWER(
                (EXTRACT(EPOCH FROM (NOW() - created_at)) / 3600.0) + 2.0, 1.8
            )
        FROM (
            SELECT
                COALESCE(SUM(CASE WHEN vote_type = 'up' THEN 1 ELSE 0 END), 0)
                - COALESCE(SUM(CASE WHEN vote_type = 'down' THEN 1 ELSE 0 END), 0) AS score
            FROM article_votes WHERE article_id = $1
        ) v
        WHERE id = $1
    "#;

    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![article_id.into()],
    ))
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_match_the_wire_values() {
        assert_eq!(ToggleSignal::Added.as_i8(), 1);
        assert_eq!(ToggleSignal::Updated.as_i8(), 2);
        assert_eq!(ToggleSignal::Canceled.as_i8(), -1);
    }

    #[test]
    fn toggle_outcome_covers_the_three_ways() {
        use VoteType::{Down, Up};

        assert_eq!(toggle_outcome(None, &Up), ToggleSignal::Added);
        assert_eq!(toggle_outcome(Some(&Up), &Up), ToggleSignal::Canceled);
        assert_eq!(toggle_outcome(Some(&Down), &Up), ToggleSignal::Updated);
        assert_eq!(toggle_outcome(Some(&Up), &Down), ToggleSignal::Updated);
    }

    #[test]
    fn toggle_outcome_compares_react_ids() {
        assert_eq!(toggle_outcome(None, "eyes"), ToggleSignal::Added);
        assert_eq!(toggle_outcome(Some("eyes"), "eyes"), ToggleSignal::Canceled);
        assert_eq!(toggle_outcome(Some("party"), "eyes"), ToggleSignal::Updated);
    }

    #[test]
    fn react_ids_are_recognized() {
        for id in REACT_IDS {
            assert!(valid_react_id(id));
        }
        assert!(!valid_react_id("rocket"));
        assert!(!valid_react_id(""));
    }
}
