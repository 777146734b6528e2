//! Durable progress storage boundary

use crate::error::Result;
use async_trait::async_trait;
use lingua_common::db::ReadingProgress;
use std::sync::Arc;
use uuid::Uuid;

/// Where reading progress is persisted
///
/// `upsert` must be a single atomic insert-or-update keyed by
/// `(profile_id, book_id, chapter_id)`; callers never read before writing.
#[async_trait]
pub trait ProgressStore: Send + Sync + 'static {
    async fn upsert(&self, progress: &ReadingProgress) -> Result<()>;

    /// All chapter rows of one book for a profile, most recently updated first
    async fn fetch_for_book(&self, profile_id: Uuid, book_id: Uuid)
        -> Result<Vec<ReadingProgress>>;
}

#[async_trait]
impl<S: ProgressStore + ?Sized> ProgressStore for Arc<S> {
    async fn upsert(&self, progress: &ReadingProgress) -> Result<()> {
        (**self).upsert(progress).await
    }

    async fn fetch_for_book(
        &self,
        profile_id: Uuid,
        book_id: Uuid,
    ) -> Result<Vec<ReadingProgress>> {
        (**self).fetch_for_book(profile_id, book_id).await
    }
}
