//! Database access layer
//!
//! Provides queries for alignments, reading progress and settings. Schema
//! creation lives in `lingua_common::db`.

pub mod alignments;
pub mod progress;
pub mod settings;

pub use alignments::{delete_alignment, save_alignment, SqliteAlignmentProvider};
pub use progress::SqliteProgressStore;
