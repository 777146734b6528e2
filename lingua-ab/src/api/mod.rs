//! REST API for the read-along service
//!
//! - [`handlers`]: endpoint implementations
//! - [`profile`]: listener identity extractor
//! - [`server`]: router assembly and HTTP server

pub mod handlers;
pub mod profile;
pub mod server;

pub use profile::{ProfileId, PROFILE_HEADER};
pub use server::{create_router, run};
