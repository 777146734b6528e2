//! Alignment table holder for one reading session
//!
//! Holds exactly one chapter's table at a time. Loading another chapter
//! discards the previous table before the fetch starts, so a failed load
//! never leaves a stale table from a different chapter in place.

use super::{AlignmentError, AlignmentLookup, AlignmentProvider, AlignmentTable};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct LoadedChapter {
    book_id: Uuid,
    chapter_id: Uuid,
    table: Arc<AlignmentTable>,
}

/// Current chapter's alignment
pub struct AlignmentStore<P> {
    provider: P,
    current: Option<LoadedChapter>,
}

impl<P: AlignmentProvider> AlignmentStore<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            current: None,
        }
    }

    /// Load the alignment for a chapter, replacing whatever was held
    ///
    /// On error the store is left empty; callers fall back to the plain
    /// chapter script.
    pub async fn load(
        &mut self,
        book_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<Arc<AlignmentTable>, AlignmentError> {
        self.current = None;

        match self.provider.fetch(book_id, chapter_id).await {
            Ok(AlignmentLookup::Found(table)) => {
                info!(
                    %book_id,
                    %chapter_id,
                    words = table.len(),
                    loss_score = ?table.loss_score(),
                    "Loaded chapter alignment"
                );
                self.current = Some(LoadedChapter {
                    book_id,
                    chapter_id,
                    table: Arc::clone(&table),
                });
                Ok(table)
            }
            Ok(AlignmentLookup::NotFound) => {
                debug!(%book_id, %chapter_id, "No alignment for chapter, using plain text");
                Err(AlignmentError::NotFound {
                    book_id,
                    chapter_id,
                })
            }
            Err(e @ AlignmentError::Malformed(_)) => {
                warn!(%book_id, %chapter_id, error = %e, "Rejected malformed alignment, using plain text");
                Err(e)
            }
            Err(e) => {
                warn!(%book_id, %chapter_id, error = %e, "Alignment lookup failed, using plain text");
                Err(e)
            }
        }
    }

    /// Table of the loaded chapter, if any
    pub fn current(&self) -> Option<&Arc<AlignmentTable>> {
        self.current.as_ref().map(|c| &c.table)
    }

    /// `(book_id, chapter_id)` of the loaded chapter, if any
    pub fn current_chapter(&self) -> Option<(Uuid, Uuid)> {
        self.current.as_ref().map(|c| (c.book_id, c.chapter_id))
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
