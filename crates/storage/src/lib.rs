//! SQLite pool setup and migrations for the media catalog.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Open a pool from either a plain filesystem path or a full sqlite URL.
/// Plain paths get their parent directory created and the database file
/// created on first use.
pub async fn connect(database: &str) -> anyhow::Result<SqlitePool> {
    let url = if database.starts_with("sqlite:") {
        database.to_string()
    } else {
        let path = std::path::PathBuf::from(database);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            format!("sqlite:///{}", norm.trim_start_matches('/'))
        } else {
            format!("sqlite://{norm}")
        }
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    // Shared-cache in-memory databases vanish when their last connection
    // closes, so those pools stay at a single connection.
    let max_connections = if url.contains("memory") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Apply the schema migrations under crates/storage/migrations.
/// Idempotent.
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
