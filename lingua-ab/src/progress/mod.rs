//! Reading progress
//!
//! - [`store`]: the durable upsert boundary
//! - [`persister`]: per-profile throttled writer in front of a store

pub mod persister;
pub mod store;

pub use persister::{PersistConfig, ProgressKey, ProgressPersister};
pub use store::ProgressStore;
