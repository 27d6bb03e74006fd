//! Settings key/value accessors
//!
//! The vision API key configured through the HTTP API lives here; the
//! database value takes priority over the environment at resolution time.

use parkwatch_common::Result;
use sqlx::SqlitePool;

pub const VISION_API_KEY: &str = "vision_api_key";

/// Get the stored vision API key, if any
pub async fn get_vision_api_key(db: &SqlitePool) -> Result<Option<String>> {
    get_setting(db, VISION_API_KEY).await
}

/// Store the vision API key
pub async fn set_vision_api_key(db: &SqlitePool, key: String) -> Result<()> {
    set_setting(db, VISION_API_KEY, key).await
}

async fn get_setting(db: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|(value,)| value))
}

async fn set_setting(db: &SqlitePool, key: &str, value: String) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;

    Ok(())
}
