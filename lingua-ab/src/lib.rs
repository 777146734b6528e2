//! # Lingua Read-Along Service (lingua-ab)
//!
//! Synchronizes audiobook playback with the chapter script: word-level
//! highlighting driven by playback time, and throttled persistence of each
//! listener's reading position.
//!
//! **Pipeline:** [`alignment`] tables feed the [`playback`] position
//! tracker, the [`render`] module turns positions into styled paragraphs,
//! and [`progress`] writes positions to the database.

pub mod alignment;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod playback;
pub mod progress;
pub mod render;
pub mod state;

pub use api::create_router as build_router;
pub use error::{Error, Result};
pub use state::AppState;
