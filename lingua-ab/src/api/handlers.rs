//! HTTP request handlers
//!
//! Alignment ingest/lookup, highlight snapshots and reading progress.

use super::profile::ProfileId;
use crate::alignment::{AlignmentError, AlignmentLookup, AlignmentProvider, AlignmentTable};
use crate::db::{delete_alignment, save_alignment};
use crate::error::{Error, Result};
use crate::playback::{Persistence, PlaybackPosition, ProgressEvent};
use crate::progress::ProgressStore;
use crate::render::RenderedText;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use lingua_common::db::ReadingProgress;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

/// Tagged alignment lookup result
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlignmentResponse {
    Found { table: AlignmentTable },
    NotFound,
}

#[derive(Debug, Serialize)]
pub struct DeletedAlignmentResponse {
    deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct StoredAlignmentResponse {
    status: String,
    word_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct HighlightQuery {
    /// Playback time in seconds
    t: f64,
}

#[derive(Debug, Serialize)]
pub struct HighlightResponse {
    current_word_index: i64,
    next_word_index: usize,
    text: RenderedText,
}

/// Tagged saved-position lookup result
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChapterProgressResponse {
    Found { progress: ReadingProgress },
    NotFound,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    position_seconds: f64,
    event: ProgressEvent,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "lingua-ab".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Alignment Endpoints
// ============================================================================

/// PUT /api/v1/books/:book_id/chapters/:chapter_id/alignment
///
/// Body is validated against the table invariants before storage; data that
/// fails decoding or validation is answered with 422.
pub async fn put_alignment(
    State(state): State<AppState>,
    Path((book_id, chapter_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<Json<StoredAlignmentResponse>> {
    let table: AlignmentTable = serde_json::from_slice(&body)
        .map_err(|e| Error::Alignment(AlignmentError::Malformed(e.to_string())))?;

    save_alignment(&state.db, book_id, chapter_id, &table).await?;
    state.alignments.invalidate(book_id, chapter_id).await;

    info!(%book_id, %chapter_id, words = table.len(), "Stored chapter alignment");

    Ok(Json(StoredAlignmentResponse {
        status: "stored".to_string(),
        word_count: table.len(),
    }))
}

/// DELETE /api/v1/books/:book_id/chapters/:chapter_id/alignment
pub async fn remove_alignment(
    State(state): State<AppState>,
    Path((book_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeletedAlignmentResponse>> {
    let deleted = delete_alignment(&state.db, book_id, chapter_id).await?;
    state.alignments.invalidate(book_id, chapter_id).await;

    info!(%book_id, %chapter_id, deleted, "Removed chapter alignment");
    Ok(Json(DeletedAlignmentResponse { deleted }))
}

/// Alignment for display, if usable
///
/// Readers always get a response: a malformed or unreachable alignment
/// degrades to unsynchronized text exactly like a missing one, and only
/// the log tells them apart.
async fn display_alignment(state: &AppState, book_id: Uuid, chapter_id: Uuid) -> Option<Arc<AlignmentTable>> {
    match state.alignments.fetch(book_id, chapter_id).await {
        Ok(AlignmentLookup::Found(table)) => Some(table),
        Ok(AlignmentLookup::NotFound) | Err(AlignmentError::NotFound { .. }) => {
            debug!(%book_id, %chapter_id, "No alignment; serving plain text");
            None
        }
        Err(e) => {
            warn!(%book_id, %chapter_id, error = %e, "Unusable alignment; serving plain text");
            None
        }
    }
}

/// GET /api/v1/books/:book_id/chapters/:chapter_id/alignment
pub async fn get_alignment(
    State(state): State<AppState>,
    Path((book_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Json<AlignmentResponse> {
    Json(match display_alignment(&state, book_id, chapter_id).await {
        Some(table) => AlignmentResponse::Found {
            table: AlignmentTable::clone(&table),
        },
        None => AlignmentResponse::NotFound,
    })
}

/// GET /api/v1/books/:book_id/chapters/:chapter_id/highlight?t=SECONDS
///
/// Without a usable alignment the snapshot has no highlighted word and
/// empty plain text; the reader shows its own chapter script.
pub async fn get_highlight(
    State(state): State<AppState>,
    Path((book_id, chapter_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<HighlightQuery>,
) -> Json<HighlightResponse> {
    let Some(table) = display_alignment(&state, book_id, chapter_id).await else {
        let position = PlaybackPosition::at(&[], query.t);
        return Json(HighlightResponse {
            current_word_index: position.current_word_index(),
            next_word_index: position.next_word_index(),
            text: RenderedText::Plain {
                text: String::new(),
            },
        });
    };

    let position = PlaybackPosition::at(table.words(), query.t);
    debug!(
        %book_id,
        %chapter_id,
        t = query.t,
        current = position.current_word_index(),
        "Highlight snapshot"
    );

    Json(HighlightResponse {
        current_word_index: position.current_word_index(),
        next_word_index: position.next_word_index(),
        text: state.renderer.render(&table, &position),
    })
}

// ============================================================================
// Progress Endpoints
// ============================================================================

/// POST /api/v1/books/:book_id/chapters/:chapter_id/progress
///
/// `time_update` reports are throttled; every other event is written
/// before the response is sent.
pub async fn post_progress(
    State(state): State<AppState>,
    ProfileId(profile_id): ProfileId,
    Path((book_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ProgressRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    let persister = state.persisters.for_profile(profile_id);

    match request.event.persistence() {
        Persistence::Skip => {}
        Persistence::Throttled => persister.report(book_id, chapter_id, request.position_seconds),
        Persistence::Immediate => {
            persister
                .report_immediate(book_id, chapter_id, request.position_seconds)
                .await
        }
    }

    (
        StatusCode::ACCEPTED,
        Json(StatusResponse {
            status: "accepted".to_string(),
        }),
    )
}

/// GET /api/v1/books/:book_id/progress
///
/// The caller's saved positions for a book, most recent chapter first.
pub async fn get_book_progress(
    State(state): State<AppState>,
    ProfileId(profile_id): ProfileId,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<ReadingProgress>>> {
    Ok(Json(state.progress.fetch_for_book(profile_id, book_id).await?))
}

/// GET /api/v1/books/:book_id/chapters/:chapter_id/progress
pub async fn get_chapter_progress(
    State(state): State<AppState>,
    ProfileId(profile_id): ProfileId,
    Path((book_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ChapterProgressResponse>> {
    Ok(Json(match state.progress.get(profile_id, book_id, chapter_id).await? {
        Some(progress) => ChapterProgressResponse::Found { progress },
        None => ChapterProgressResponse::NotFound,
    }))
}

/// GET /api/v1/books/:book_id/progress/latest
///
/// Where to resume the book: the most recently saved chapter position.
pub async fn get_resume_point(
    State(state): State<AppState>,
    ProfileId(profile_id): ProfileId,
    Path(book_id): Path<Uuid>,
) -> Result<Json<ChapterProgressResponse>> {
    Ok(Json(match state.progress.latest_for_book(profile_id, book_id).await? {
        Some(progress) => ChapterProgressResponse::Found { progress },
        None => ChapterProgressResponse::NotFound,
    }))
}
