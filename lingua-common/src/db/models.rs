//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A `chapter_alignments` row with the word list still JSON-encoded
#[derive(Debug, Clone)]
pub struct ChapterAlignmentRow {
    pub book_id: Uuid,
    pub chapter_id: Uuid,
    pub full_text: String,
    pub words_json: String,
    pub loss_score: Option<f64>,
}

/// Durable playback position for one (profile, book, chapter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub profile_id: Uuid,
    pub book_id: Uuid,
    pub chapter_id: Uuid,
    pub position_seconds: f64,
    pub last_updated_at: DateTime<Utc>,
}
