//! Shared application state
//!
//! Cloned into every HTTP handler. Progress persisters are kept per
//! profile so throttling windows survive across requests.

use crate::alignment::CachedAlignmentProvider;
use crate::config::SyncSettings;
use crate::db::{SqliteAlignmentProvider, SqliteProgressStore};
use crate::progress::{PersistConfig, ProgressPersister};
use crate::render::HighlightRenderer;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Alignment source used by the service: database behind a bounded cache
pub type AlignmentSource = CachedAlignmentProvider<SqliteAlignmentProvider>;

pub type SqlitePersister = ProgressPersister<SqliteProgressStore>;

struct RegistryEntry {
    persister: Arc<SqlitePersister>,
    last_used: Instant,
}

/// One progress persister per listener profile
///
/// A profile's persister is evicted once it has gone unused for the idle
/// TTL with no write outstanding and no handler holding it.
pub struct PersisterRegistry {
    store: SqliteProgressStore,
    config: PersistConfig,
    idle_ttl: Duration,
    persisters: Mutex<HashMap<Uuid, RegistryEntry>>,
}

impl PersisterRegistry {
    pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(600);

    pub fn new(store: SqliteProgressStore, config: PersistConfig) -> Self {
        Self::with_idle_ttl(store, config, Self::DEFAULT_IDLE_TTL)
    }

    pub fn with_idle_ttl(store: SqliteProgressStore, config: PersistConfig, idle_ttl: Duration) -> Self {
        Self {
            store,
            config,
            idle_ttl,
            persisters: Mutex::new(HashMap::new()),
        }
    }

    /// Persister for a profile, created on first use
    pub fn for_profile(&self, profile_id: Uuid) -> Arc<SqlitePersister> {
        let now = Instant::now();
        let mut persisters = self.persisters.lock().unwrap_or_else(PoisonError::into_inner);

        let before = persisters.len();
        persisters.retain(|id, entry| *id == profile_id || !self.is_evictable(entry, now));
        let evicted = before - persisters.len();
        if evicted > 0 {
            debug!("Evicted {} idle progress persister(s)", evicted);
        }

        let entry = persisters.entry(profile_id).or_insert_with(|| RegistryEntry {
            persister: Arc::new(ProgressPersister::new(self.store.clone(), profile_id, self.config)),
            last_used: now,
        });
        entry.last_used = now;
        Arc::clone(&entry.persister)
    }

    fn is_evictable(&self, entry: &RegistryEntry, now: Instant) -> bool {
        now.duration_since(entry.last_used) >= self.idle_ttl
            && Arc::strong_count(&entry.persister) == 1
            && entry.persister.is_idle()
    }

    pub fn len(&self) -> usize {
        self.persisters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush every profile's pending writes
    pub async fn close_all(&self) {
        let persisters: Vec<Arc<SqlitePersister>> = {
            let mut map = self.persisters.lock().unwrap_or_else(PoisonError::into_inner);
            map.drain().map(|(_, entry)| entry.persister).collect()
        };

        info!("Flushing reading progress for {} profile(s)", persisters.len());
        for persister in persisters {
            persister.close().await;
        }
    }
}

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub alignments: Arc<AlignmentSource>,
    pub progress: SqliteProgressStore,
    pub persisters: Arc<PersisterRegistry>,
    pub renderer: HighlightRenderer,
    pub settings: SyncSettings,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, settings: SyncSettings) -> Self {
        let alignments = CachedAlignmentProvider::new(
            SqliteAlignmentProvider::new(db.clone()),
            settings.alignment_cache_capacity,
            settings.alignment_cache_ttl,
        );
        let progress = SqliteProgressStore::new(db.clone());

        Self {
            db,
            alignments: Arc::new(alignments),
            persisters: Arc::new(PersisterRegistry::new(progress.clone(), settings.persist)),
            progress,
            renderer: HighlightRenderer::new(settings.render),
            settings,
        }
    }
}
