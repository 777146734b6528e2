//! Chapter alignment queries
//!
//! Rows live in `chapter_alignments`; the word list is stored as a JSON
//! array of `{text, start, end, loss}` objects and validated into an
//! [`AlignmentTable`] on every read.

use crate::alignment::{AlignmentError, AlignmentLookup, AlignmentProvider, AlignmentTable, WordSpan};
use crate::error::Result;
use async_trait::async_trait;
use lingua_common::db::ChapterAlignmentRow;
use sqlx::{Pool, Row, Sqlite};
use std::sync::Arc;
use uuid::Uuid;

/// Alignment provider backed by the service database
#[derive(Clone)]
pub struct SqliteAlignmentProvider {
    db: Pool<Sqlite>,
}

impl SqliteAlignmentProvider {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    async fn fetch_row(
        &self,
        book_id: Uuid,
        chapter_id: Uuid,
    ) -> std::result::Result<Option<ChapterAlignmentRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT full_text, words_json, loss_score
            FROM chapter_alignments
            WHERE book_id = ? AND chapter_id = ?
            "#,
        )
        .bind(book_id.to_string())
        .bind(chapter_id.to_string())
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|row| ChapterAlignmentRow {
            book_id,
            chapter_id,
            full_text: row.get("full_text"),
            words_json: row.get("words_json"),
            loss_score: row.get("loss_score"),
        }))
    }
}

/// Decode a stored row into a validated table
fn decode_row(row: ChapterAlignmentRow) -> std::result::Result<AlignmentTable, AlignmentError> {
    let words: Vec<WordSpan> = serde_json::from_str(&row.words_json)
        .map_err(|e| AlignmentError::Malformed(format!("words_json: {}", e)))?;
    AlignmentTable::new(row.full_text, words, row.loss_score)
}

#[async_trait]
impl AlignmentProvider for SqliteAlignmentProvider {
    async fn fetch(
        &self,
        book_id: Uuid,
        chapter_id: Uuid,
    ) -> std::result::Result<AlignmentLookup, AlignmentError> {
        let row = self
            .fetch_row(book_id, chapter_id)
            .await
            .map_err(|e| AlignmentError::Unavailable(e.to_string()))?;

        match row {
            Some(row) => Ok(AlignmentLookup::Found(Arc::new(decode_row(row)?))),
            None => Ok(AlignmentLookup::NotFound),
        }
    }
}

/// Insert or replace a chapter's alignment
pub async fn save_alignment(
    db: &Pool<Sqlite>,
    book_id: Uuid,
    chapter_id: Uuid,
    table: &AlignmentTable,
) -> Result<()> {
    let words_json = serde_json::to_string(table.words())?;

    sqlx::query(
        r#"
        INSERT INTO chapter_alignments (book_id, chapter_id, full_text, words_json, loss_score)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(book_id, chapter_id) DO UPDATE SET
            full_text = excluded.full_text,
            words_json = excluded.words_json,
            loss_score = excluded.loss_score,
            created_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(book_id.to_string())
    .bind(chapter_id.to_string())
    .bind(table.full_text())
    .bind(words_json)
    .bind(table.loss_score())
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a chapter's alignment
///
/// # Returns
/// `true` if a row was deleted
pub async fn delete_alignment(db: &Pool<Sqlite>, book_id: Uuid, chapter_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM chapter_alignments WHERE book_id = ? AND chapter_id = ?")
        .bind(book_id.to_string())
        .bind(chapter_id.to_string())
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}
