//! Settings database access
//!
//! Read/write runtime tunables from the settings table (key-value store).
//! All settings are global (not per profile). Defaults are seeded by
//! `lingua_common::db::create_schema`; loaders still fall back to compiled
//! defaults when a key is missing and clamp values to a sane range.

use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::playback::tracker::StructuralRule;
use crate::progress::PersistConfig;
use crate::render::RenderOptions;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// Load progress_persist_window_secs
///
/// # Returns
/// Throttling window (default 30s, clamped to 1-3600s)
pub async fn load_persist_window(db: &Pool<Sqlite>) -> Result<Duration> {
    let secs = match get_setting::<u64>(db, "progress_persist_window_secs").await? {
        Some(secs) => secs.clamp(1, 3600),
        None => PersistConfig::DEFAULT_WINDOW.as_secs(),
    };
    Ok(Duration::from_secs(secs))
}

/// Load structural_loss_threshold
///
/// Non-finite values fall back to the default (1.0); others clamp to 0-100.
pub async fn load_structural_loss_threshold(db: &Pool<Sqlite>) -> Result<f64> {
    match get_setting::<f64>(db, "structural_loss_threshold").await? {
        Some(threshold) if threshold.is_finite() => Ok(threshold.clamp(0.0, 100.0)),
        _ => Ok(StructuralRule::DEFAULT_LOSS_THRESHOLD),
    }
}

/// Load sentence_final_spacing (default: true)
pub async fn load_sentence_final_spacing(db: &Pool<Sqlite>) -> Result<bool> {
    Ok(get_setting::<bool>(db, "sentence_final_spacing")
        .await?
        .unwrap_or(true))
}

/// Load alignment_cache_capacity (default 64, clamped to 0-4096)
pub async fn load_alignment_cache_capacity(db: &Pool<Sqlite>) -> Result<usize> {
    match get_setting::<usize>(db, "alignment_cache_capacity").await? {
        Some(capacity) => Ok(capacity.min(4096)),
        None => Ok(SyncSettings::DEFAULT_CACHE_CAPACITY),
    }
}

/// Load alignment_cache_ttl_secs (default 600s, clamped to 1-86400s)
pub async fn load_alignment_cache_ttl(db: &Pool<Sqlite>) -> Result<Duration> {
    match get_setting::<u64>(db, "alignment_cache_ttl_secs").await? {
        Some(secs) => Ok(Duration::from_secs(secs.clamp(1, 86_400))),
        None => Ok(SyncSettings::DEFAULT_CACHE_TTL),
    }
}

/// Load every read-along tunable in one pass
pub async fn load_sync_settings(db: &Pool<Sqlite>) -> Result<SyncSettings> {
    Ok(SyncSettings {
        persist: PersistConfig {
            window: load_persist_window(db).await?,
        },
        render: RenderOptions {
            structural: StructuralRule::new(load_structural_loss_threshold(db).await?),
            suppress_space_after_sentence_end: load_sentence_final_spacing(db).await?,
        },
        alignment_cache_capacity: load_alignment_cache_capacity(db).await?,
        alignment_cache_ttl: load_alignment_cache_ttl(db).await?,
    })
}

/// Generic setting getter
///
/// Returns None if the key doesn't exist or its value is NULL.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value.flatten() {
        Some(s) => match s.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}
