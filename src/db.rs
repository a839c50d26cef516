use crate::app_config;
use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Connects to the database and stores the pool for the process lifetime.
/// Panics if called twice or if the connection cannot be established.
pub async fn init_db(database_url: String) {
    let db_config = app_config::database();

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(db_config.max_connections)
        .connect_timeout(Duration::from_secs(
            db_config.connect_timeout_seconds.into(),
        ))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let pool = Database::connect(options)
        .await
        .expect("Failed to connect to database.");

    DB_POOL
        .set(pool)
        .expect("init_db() called more than once.");
}

pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("Database pool is not initialized.")
}
