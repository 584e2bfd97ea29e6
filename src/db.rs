use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use time::OffsetDateTime;

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    Ok(db_pool)
}

/// A migrated in-memory database on a single, never-recycled connection.
/// Every connection to `sqlite::memory:` is its own database, hence the pin.
pub async fn memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    Ok(db_pool)
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_ms(ms: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Inserts the user unless the id is already taken. Returns whether a row was created.
pub async fn insert_user(db_pool: &SqlitePool, user_id: &str, alias: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT OR IGNORE INTO users (id,alias,created_at) VALUES (?,?,?)")
        .bind(user_id)
        .bind(alias)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn user_exists(db_pool: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id=?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    Ok(row.is_some())
}
