//! Reading progress queries
//!
//! One row per `(profile_id, book_id, chapter_id)`. Writes are a single
//! upsert; rows are never deleted here.

use crate::error::{Error, Result};
use crate::progress::ProgressStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingua_common::db::ReadingProgress;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// Progress store backed by the service database
#[derive(Clone)]
pub struct SqliteProgressStore {
    db: Pool<Sqlite>,
}

impl SqliteProgressStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Most recently updated chapter of a book, used to resume playback
    pub async fn latest_for_book(
        &self,
        profile_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<ReadingProgress>> {
        let row = sqlx::query(
            r#"
            SELECT profile_id, book_id, chapter_id, position_seconds, last_updated_at
            FROM reading_progress
            WHERE profile_id = ? AND book_id = ?
            ORDER BY last_updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(profile_id.to_string())
        .bind(book_id.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(progress_from_row).transpose()
    }

    /// Saved position of one chapter, if any
    pub async fn get(
        &self,
        profile_id: Uuid,
        book_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Option<ReadingProgress>> {
        let row = sqlx::query(
            r#"
            SELECT profile_id, book_id, chapter_id, position_seconds, last_updated_at
            FROM reading_progress
            WHERE profile_id = ? AND book_id = ? AND chapter_id = ?
            "#,
        )
        .bind(profile_id.to_string())
        .bind(book_id.to_string())
        .bind(chapter_id.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(progress_from_row).transpose()
    }
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.get(column);
    Uuid::parse_str(&raw)
        .map_err(|e| Error::Internal(format!("Corrupt {} '{}' in reading_progress: {}", column, raw, e)))
}

fn progress_from_row(row: &SqliteRow) -> Result<ReadingProgress> {
    let raw_timestamp: String = row.get("last_updated_at");
    let last_updated_at = DateTime::parse_from_rfc3339(&raw_timestamp)
        .map_err(|e| {
            Error::Internal(format!(
                "Corrupt last_updated_at '{}' in reading_progress: {}",
                raw_timestamp, e
            ))
        })?
        .with_timezone(&Utc);

    Ok(ReadingProgress {
        profile_id: parse_uuid(row, "profile_id")?,
        book_id: parse_uuid(row, "book_id")?,
        chapter_id: parse_uuid(row, "chapter_id")?,
        position_seconds: row.get("position_seconds"),
        last_updated_at,
    })
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn upsert(&self, progress: &ReadingProgress) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reading_progress
                (profile_id, book_id, chapter_id, position_seconds, last_updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(profile_id, book_id, chapter_id) DO UPDATE SET
                position_seconds = excluded.position_seconds,
                last_updated_at = excluded.last_updated_at
            "#,
        )
        .bind(progress.profile_id.to_string())
        .bind(progress.book_id.to_string())
        .bind(progress.chapter_id.to_string())
        .bind(progress.position_seconds)
        .bind(progress.last_updated_at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn fetch_for_book(&self, profile_id: Uuid, book_id: Uuid) -> Result<Vec<ReadingProgress>> {
        let rows = sqlx::query(
            r#"
            SELECT profile_id, book_id, chapter_id, position_seconds, last_updated_at
            FROM reading_progress
            WHERE profile_id = ? AND book_id = ?
            ORDER BY last_updated_at DESC
            "#,
        )
        .bind(profile_id.to_string())
        .bind(book_id.to_string())
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(progress_from_row).collect()
    }
}
