//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date.
//! Every statement is idempotent, so starting against an existing database
//! is always safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Default for `progress_persist_window_secs`
pub const DEFAULT_PERSIST_WINDOW_SECS: &str = "30";
/// Default for `structural_loss_threshold`
pub const DEFAULT_STRUCTURAL_LOSS_THRESHOLD: &str = "1.0";
/// Default for `sentence_final_spacing`
pub const DEFAULT_SENTENCE_FINAL_SPACING: &str = "true";
/// Default for `alignment_cache_capacity`
pub const DEFAULT_ALIGNMENT_CACHE_CAPACITY: &str = "64";
/// Default for `alignment_cache_ttl_secs`
pub const DEFAULT_ALIGNMENT_CACHE_TTL_SECS: &str = "600";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL lets progress writes proceed while alignment reads are in flight
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and seed default settings
///
/// Split out from [`init_database`] so tests can run it against
/// `sqlite::memory:` pools.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_chapter_alignments_table(pool).await?;
    create_reading_progress_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (1)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime tunables as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the chapter_alignments table
///
/// One row per (book, chapter). `words_json` holds the ordered word spans.
pub async fn create_chapter_alignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapter_alignments (
            book_id TEXT NOT NULL,
            chapter_id TEXT NOT NULL,
            full_text TEXT NOT NULL,
            words_json TEXT NOT NULL,
            loss_score REAL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (book_id, chapter_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the reading_progress table
///
/// The unique key is what makes the progress write a single upsert.
pub async fn create_reading_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reading_progress (
            profile_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            chapter_id TEXT NOT NULL,
            position_seconds REAL NOT NULL CHECK (position_seconds >= 0),
            last_updated_at TEXT NOT NULL,
            UNIQUE (profile_id, book_id, chapter_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_reading_progress_profile_book
        ON reading_progress (profile_id, book_id, last_updated_at)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or repair default settings
///
/// Missing keys are created; keys whose value is NULL are reset.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "progress_persist_window_secs", DEFAULT_PERSIST_WINDOW_SECS).await?;
    ensure_setting(pool, "structural_loss_threshold", DEFAULT_STRUCTURAL_LOSS_THRESHOLD).await?;
    ensure_setting(pool, "sentence_final_spacing", DEFAULT_SENTENCE_FINAL_SPACING).await?;
    ensure_setting(pool, "alignment_cache_capacity", DEFAULT_ALIGNMENT_CACHE_CAPACITY).await?;
    ensure_setting(pool, "alignment_cache_ttl_secs", DEFAULT_ALIGNMENT_CACHE_TTL_SECS).await?;

    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE tolerates two services initializing at once
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if reset > 0 {
        info!("Reset NULL setting '{}' to default value: {}", key, default_value);
    }

    Ok(())
}
