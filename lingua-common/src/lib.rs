//! # Lingua Common Library
//!
//! Shared code for Lingua services:
//! - Database schema, initialization and row models
//! - Configuration loading and root folder resolution
//! - Common error type
//! - Time utilities

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
