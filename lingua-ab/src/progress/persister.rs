//! Debounced reading-progress persistence
//!
//! Playback emits time updates several times per second; writing each one
//! would hammer the store. The persister throttles writes per
//! `(book_id, chapter_id)` key:
//!
//! - at most one write per key per window (default 30s)
//! - the first report for a key, and every report inside an open window,
//!   replaces the pending deferred write; the deferred write fires at the
//!   window's end carrying the most recent position
//! - a report arriving after the window has elapsed commits right away and
//!   opens a new window
//! - [`ProgressPersister::report_immediate`] bypasses the window, cancels any
//!   pending deferred write for the key and awaits its own write
//!
//! Write failures are logged and dropped. Progress is a convenience; the
//! next successful write supersedes a lost one.
//!
//! A deferred write that has reached its deadline is committing and can no
//! longer be replaced; later reports schedule the next write behind it.
//! Writes for one key are serialized by a per-key lock, so they never land
//! out of order. Keys with nothing outstanding are forgotten once their
//! window has elapsed.

use super::store::ProgressStore;
use lingua_common::db::ReadingProgress;
use lingua_common::time::sanitize_position;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// `(book_id, chapter_id)`
pub type ProgressKey = (Uuid, Uuid);

/// Throttling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistConfig {
    pub window: Duration,
}

impl PersistConfig {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            window: Self::DEFAULT_WINDOW,
        }
    }
}

struct ScheduledWrite {
    generation: u64,
    position: f64,
    handle: JoinHandle<()>,
}

struct KeySlot {
    /// Start of the current throttling window
    window_start: Instant,
    /// Deferred write still waiting for its deadline
    pending: Option<ScheduledWrite>,
    /// Deferred write whose upsert is in flight
    committing: Option<ScheduledWrite>,
    /// Held for the duration of every upsert of this key
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl KeySlot {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            pending: None,
            committing: None,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn is_outstanding(&self) -> bool {
        self.pending.is_some() || self.committing.is_some()
    }

    /// Nothing scheduled, nobody writing, window over
    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        !self.is_outstanding()
            && Arc::strong_count(&self.write_lock) == 1
            && now >= self.window_start + window
    }
}

struct Shared<S> {
    store: S,
    profile_id: Uuid,
    window: Duration,
    slots: Mutex<HashMap<ProgressKey, KeySlot>>,
    generation: AtomicU64,
}

impl<S: ProgressStore> Shared<S> {
    fn slots(&self) -> MutexGuard<'_, HashMap<ProgressKey, KeySlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Slot for `key`, forgetting idle slots of every other key
    fn slot<'a>(
        &self,
        slots: &'a mut HashMap<ProgressKey, KeySlot>,
        key: ProgressKey,
        now: Instant,
    ) -> &'a mut KeySlot {
        slots.retain(|k, slot| *k == key || !slot.is_idle(now, self.window));
        slots.entry(key).or_insert_with(|| KeySlot::new(now))
    }

    /// Write one record; failures are logged, never returned
    async fn commit(&self, (book_id, chapter_id): ProgressKey, position_seconds: f64) -> bool {
        let record = ReadingProgress {
            profile_id: self.profile_id,
            book_id,
            chapter_id,
            position_seconds,
            last_updated_at: lingua_common::time::now(),
        };

        match self.store.upsert(&record).await {
            Ok(()) => {
                debug!(
                    profile_id = %self.profile_id,
                    %book_id,
                    %chapter_id,
                    position_seconds,
                    "Persisted reading progress"
                );
                true
            }
            Err(e) => {
                warn!(
                    profile_id = %self.profile_id,
                    %book_id,
                    %chapter_id,
                    error = %e,
                    "Failed to persist reading progress"
                );
                false
            }
        }
    }

    /// Body of a scheduled write
    async fn run_scheduled(self: Arc<Self>, key: ProgressKey, generation: u64, deadline: Instant, position: f64) {
        tokio::time::sleep_until(deadline).await;

        // Past this point the write is committing and no report replaces it
        let write_lock = {
            let mut slots = self.slots();
            match slots.get_mut(&key) {
                Some(slot) if slot.pending.as_ref().map(|p| p.generation) == Some(generation) => {
                    slot.window_start = Instant::now();
                    slot.committing = slot.pending.take();
                    Arc::clone(&slot.write_lock)
                }
                _ => return,
            }
        };

        {
            let _guard = write_lock.lock().await;
            self.commit(key, position).await;
        }

        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(&key) {
            if slot.committing.as_ref().map(|c| c.generation) == Some(generation) {
                slot.committing = None;
            }
        }
    }
}

/// Per-profile progress writer
///
/// Dropping the persister aborts every deferred write without writing it;
/// call [`close`](Self::close) first to flush them.
pub struct ProgressPersister<S: ProgressStore> {
    shared: Arc<Shared<S>>,
}

impl<S: ProgressStore> ProgressPersister<S> {
    pub fn new(store: S, profile_id: Uuid, config: PersistConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                profile_id,
                window: config.window,
                slots: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn profile_id(&self) -> Uuid {
        self.shared.profile_id
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }

    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// Report a playback position, subject to throttling
    ///
    /// Returns immediately; the write happens on a background task.
    /// Negative or non-finite positions are stored as zero.
    pub fn report(&self, book_id: Uuid, chapter_id: Uuid, position_seconds: f64) {
        let key = (book_id, chapter_id);
        let position = sanitize_position(position_seconds);
        let now = Instant::now();
        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed);

        let mut slots = self.shared.slots();
        let slot = self.shared.slot(&mut slots, key, now);

        let window_end = slot.window_start + self.shared.window;
        let deadline = if now >= window_end {
            // Window over: this write opens the next one
            slot.window_start = now;
            now
        } else {
            window_end
        };

        if let Some(previous) = slot.pending.take() {
            previous.handle.abort();
        }

        let handle = tokio::spawn(Arc::clone(&self.shared).run_scheduled(key, generation, deadline, position));

        slot.pending = Some(ScheduledWrite {
            generation,
            position,
            handle,
        });
    }

    /// Persist a position now, outside the throttling window
    ///
    /// Used for pause, seek, chapter end and navigation. Any deferred write
    /// pending for the key is cancelled before and after this write, so a
    /// stale deferred value can never overwrite it. A deferred write already
    /// in flight finishes first.
    pub async fn report_immediate(&self, book_id: Uuid, chapter_id: Uuid, position_seconds: f64) {
        let key = (book_id, chapter_id);
        let position = sanitize_position(position_seconds);

        let write_lock = {
            let mut slots = self.shared.slots();
            let slot = self.shared.slot(&mut slots, key, Instant::now());
            if let Some(previous) = slot.pending.take() {
                previous.handle.abort();
            }
            Arc::clone(&slot.write_lock)
        };

        {
            let _guard = write_lock.lock().await;
            self.shared.commit(key, position).await;
        }

        let stale = {
            let now = Instant::now();
            let mut slots = self.shared.slots();
            let slot = self.shared.slot(&mut slots, key, now);
            slot.window_start = now;
            slot.pending.take()
        };
        drop(write_lock);

        if let Some(stale) = stale {
            debug!(%book_id, %chapter_id, "Dropped deferred progress write superseded by immediate write");
            stale.handle.abort();
        }
    }

    /// Drop the pending deferred write for a key without writing it
    pub fn cancel(&self, book_id: Uuid, chapter_id: Uuid) {
        let pending = self
            .shared
            .slots()
            .get_mut(&(book_id, chapter_id))
            .and_then(|slot| slot.pending.take());
        if let Some(pending) = pending {
            pending.handle.abort();
        }
    }

    /// Keys with a deferred write still outstanding (waiting or in flight)
    pub fn pending_keys(&self) -> Vec<ProgressKey> {
        self.shared
            .slots()
            .iter()
            .filter(|(_, slot)| slot.is_outstanding())
            .map(|(key, _)| *key)
            .collect()
    }

    /// Number of keys whose throttling state is still held
    pub fn tracked_keys(&self) -> usize {
        self.shared.slots().len()
    }

    /// No deferred write waiting or in flight
    pub fn is_idle(&self) -> bool {
        !self.shared.slots().values().any(KeySlot::is_outstanding)
    }

    /// Flush every pending deferred write immediately
    ///
    /// Called when a session ends or the service shuts down. Writes already
    /// in flight are awaited rather than repeated.
    pub async fn close(&self) {
        let (pending, committing): (Vec<(ProgressKey, ScheduledWrite)>, Vec<ScheduledWrite>) = {
            let mut slots = self.shared.slots();
            let mut pending = Vec::new();
            let mut committing = Vec::new();
            for (key, slot) in slots.iter_mut() {
                if let Some(write) = slot.pending.take() {
                    pending.push((*key, write));
                }
                if let Some(write) = slot.committing.take() {
                    committing.push(write);
                }
            }
            (pending, committing)
        };

        for write in committing {
            let _ = write.handle.await;
        }

        for ((book_id, chapter_id), write) in pending {
            write.handle.abort();
            let _ = write.handle.await;
            self.report_immediate(book_id, chapter_id, write.position).await;
        }
    }
}

impl<S: ProgressStore> Drop for ProgressPersister<S> {
    fn drop(&mut self) {
        let mut slots = self.shared.slots();
        for slot in slots.values_mut() {
            for write in [slot.pending.take(), slot.committing.take()].into_iter().flatten() {
                write.handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    /// Store that records every write
    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<ReadingProgress>>,
        fail: AtomicBool,
        /// Time each upsert spends before it lands
        latency: Duration,
    }

    impl RecordingStore {
        fn slow(latency: Duration) -> Self {
            Self {
                latency,
                ..Self::default()
            }
        }

        fn writes(&self) -> Vec<ReadingProgress> {
            self.writes.lock().unwrap().clone()
        }

        fn positions(&self) -> Vec<f64> {
            self.writes().iter().map(|w| w.position_seconds).collect()
        }
    }

    #[async_trait]
    impl ProgressStore for RecordingStore {
        async fn upsert(&self, progress: &ReadingProgress) -> Result<()> {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Internal("store offline".to_string()));
            }
            self.writes.lock().unwrap().push(progress.clone());
            Ok(())
        }

        async fn fetch_for_book(&self, profile_id: Uuid, book_id: Uuid) -> Result<Vec<ReadingProgress>> {
            Ok(self
                .writes()
                .into_iter()
                .filter(|w| w.profile_id == profile_id && w.book_id == book_id)
                .collect())
        }
    }

    fn persister(store: &Arc<RecordingStore>) -> ProgressPersister<Arc<RecordingStore>> {
        ProgressPersister::new(Arc::clone(store), Uuid::new_v4(), PersistConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_write_with_latest_position() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        for i in 0..10 {
            persister.report(book, chapter, i as f64 * 0.5);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert!(store.writes().is_empty(), "Nothing written inside the window");

        tokio::time::sleep(Duration::from_secs(40)).await;

        assert_eq!(store.positions(), vec![4.5]);
        assert!(persister.pending_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_after_window_commits_immediately() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 1.0);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.positions(), vec![1.0]);

        // Window reopened at the deferred commit (t=30s); t=61s is past it
        tokio::time::sleep(Duration::from_secs(30)).await;
        persister.report(book, chapter, 61.0);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.positions(), vec![1.0, 61.0]);

        // Next report falls inside the new window and is deferred
        persister.report(book, chapter, 62.0);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.positions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_cancels_pending_deferred_write() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 3.0);
        persister.report_immediate(book, chapter, 7.5).await;
        assert_eq!(store.positions(), vec![7.5]);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.positions(), vec![7.5], "Stale deferred value must never land");
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_throttle_independently() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let book = Uuid::new_v4();
        let (ch1, ch2) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, ch1, 10.0);
        persister.report(book, ch2, 20.0);
        persister.report(book, ch1, 11.0);
        tokio::time::sleep(Duration::from_secs(31)).await;

        let mut written: Vec<(Uuid, f64)> = store
            .writes()
            .iter()
            .map(|w| (w.chapter_id, w.position_seconds))
            .collect();
        written.sort_by(|a, b| a.1.total_cmp(&b.1));
        assert_eq!(written, vec![(ch1, 11.0), (ch2, 20.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_swallowed() {
        let store = Arc::new(RecordingStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 5.0);
        tokio::time::sleep(Duration::from_secs(31)).await;
        persister.report_immediate(book, chapter, 6.0).await;
        assert!(store.writes().is_empty());
        assert!(persister.pending_keys().is_empty());

        store.fail.store(false, Ordering::SeqCst);
        persister.report_immediate(book, chapter, 8.0).await;
        assert_eq!(store.positions(), vec![8.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_and_nan_positions_stored_as_zero() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report_immediate(book, chapter, -3.0).await;
        persister.report_immediate(book, chapter, f64::NAN).await;
        assert_eq!(store.positions(), vec![0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_writes() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 12.0);
        persister.close().await;
        assert_eq!(store.positions(), vec![12.0]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.positions(), vec![12.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_pending_writes() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 12.0);
        drop(persister);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_write() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 4.0);
        persister.cancel(book, chapter);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_carry_profile_and_key() {
        let store = Arc::new(RecordingStore::default());
        let profile = Uuid::new_v4();
        let persister = ProgressPersister::new(Arc::clone(&store), profile, PersistConfig::default());
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report_immediate(book, chapter, 2.0).await;

        let written = store.fetch_for_book(profile, book).await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].chapter_id, chapter);
        assert_eq!(written[0].profile_id, profile);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_playback_with_slow_store_keeps_saving() {
        let store = Arc::new(RecordingStore::slow(Duration::from_millis(500)));
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        // 4 Hz time updates for five minutes
        for tick in 0..1200 {
            persister.report(book, chapter, tick as f64 * 0.25);
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        let positions = store.positions();
        assert!(positions.len() >= 9, "only {} writes landed", positions.len());
        assert!(positions.len() <= 10);
        for pair in positions.windows(2) {
            assert!(pair[1] - pair[0] >= 29.0, "writes closer than one window: {:?}", pair);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_during_commit_queues_behind_it() {
        let store = Arc::new(RecordingStore::slow(Duration::from_millis(500)));
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 1.0);
        // Deferred write fires at 30s and is still upserting at 30.1s
        tokio::time::sleep(Duration::from_millis(30_100)).await;
        persister.report(book, chapter, 3.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.positions(), vec![1.0], "In-flight write was not aborted");

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.positions(), vec![1.0, 3.0]);
        assert!(persister.pending_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_during_commit_lands_last() {
        let store = Arc::new(RecordingStore::slow(Duration::from_millis(500)));
        let persister = persister(&store);
        let (book, chapter) = (Uuid::new_v4(), Uuid::new_v4());

        persister.report(book, chapter, 1.0);
        tokio::time::sleep(Duration::from_millis(30_100)).await;
        assert_eq!(persister.pending_keys(), vec![(book, chapter)]);

        persister.report_immediate(book, chapter, 2.0).await;
        assert_eq!(store.positions(), vec![1.0, 2.0]);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.positions(), vec![1.0, 2.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_keys_are_forgotten() {
        let store = Arc::new(RecordingStore::default());
        let persister = persister(&store);
        let book = Uuid::new_v4();
        let (ch1, ch2, ch3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        persister.report_immediate(book, ch1, 1.0).await;
        persister.report(book, ch2, 2.0);
        assert_eq!(persister.tracked_keys(), 2);

        // ch1's window has elapsed; ch2 still has a deferred write
        tokio::time::sleep(Duration::from_secs(20)).await;
        persister.report(book, ch2, 2.5);
        tokio::time::sleep(Duration::from_secs(15)).await;
        persister.report_immediate(book, ch3, 3.0).await;
        assert_eq!(persister.tracked_keys(), 2, "ch1 dropped, ch2 kept");
        assert!(persister.pending_keys().is_empty());
        assert!(persister.is_idle());

        tokio::time::sleep(Duration::from_secs(31)).await;
        persister.report_immediate(book, ch3, 4.0).await;
        assert_eq!(persister.tracked_keys(), 1);
        assert_eq!(store.positions(), vec![1.0, 2.5, 3.0, 4.0]);
    }
}
