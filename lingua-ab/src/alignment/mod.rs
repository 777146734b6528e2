//! Chapter alignment data
//!
//! - [`table`]: the immutable [`AlignmentTable`] and its invariants
//! - [`AlignmentProvider`]: where tables come from (database, cache)
//! - [`store`]: the per-session holder of the current chapter's table
//!
//! A missing alignment is a normal outcome, not a failure: it is expressed
//! as [`AlignmentLookup::NotFound`] so callers must handle it explicitly and
//! fall back to the plain chapter script.

pub mod cache;
pub mod store;
pub mod table;

pub use cache::CachedAlignmentProvider;
pub use store::AlignmentStore;
pub use table::{AlignmentTable, WordSpan};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Why a chapter has no usable alignment
///
/// Every variant degrades to unsynchronized text; they differ only in how
/// they are logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    /// No alignment has been generated for the chapter
    #[error("No alignment for book {book_id} chapter {chapter_id}")]
    NotFound { book_id: Uuid, chapter_id: Uuid },

    /// Stored alignment breaks the table invariants or cannot be decoded
    #[error("Malformed alignment data: {0}")]
    Malformed(String),

    /// The provider could not be reached
    #[error("Alignment provider unavailable: {0}")]
    Unavailable(String),
}

/// Result of asking a provider for a chapter's alignment
#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentLookup {
    Found(Arc<AlignmentTable>),
    NotFound,
}

/// Source of alignment tables
#[async_trait]
pub trait AlignmentProvider: Send + Sync {
    /// Fetch the alignment for one chapter
    ///
    /// Returns `Ok(AlignmentLookup::NotFound)` when no alignment exists;
    /// `Err` is reserved for malformed data and provider failures.
    async fn fetch(&self, book_id: Uuid, chapter_id: Uuid)
        -> Result<AlignmentLookup, AlignmentError>;
}

#[async_trait]
impl<P: AlignmentProvider + ?Sized> AlignmentProvider for Arc<P> {
    async fn fetch(
        &self,
        book_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<AlignmentLookup, AlignmentError> {
        (**self).fetch(book_id, chapter_id).await
    }
}
