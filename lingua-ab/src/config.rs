//! lingua-ab specific configuration

use crate::progress::PersistConfig;
use crate::render::RenderOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Read-along service configuration (resolved at startup)
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub port: u16,
}

/// Runtime tunables loaded from the settings table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub persist: PersistConfig,
    pub render: RenderOptions,
    /// 0 disables the alignment cache
    pub alignment_cache_capacity: usize,
    pub alignment_cache_ttl: Duration,
}

impl SyncSettings {
    pub const DEFAULT_CACHE_CAPACITY: usize = 64;
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            persist: PersistConfig::default(),
            render: RenderOptions::default(),
            alignment_cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            alignment_cache_ttl: Self::DEFAULT_CACHE_TTL,
        }
    }
}
