//! Reading session
//!
//! One listener, one open chapter. Playback events flow in; highlight
//! frames flow out, and positions are handed to the progress persister
//! according to each event's [`Persistence`].
//!
//! A chapter without a usable alignment still opens: the session reports
//! why via [`ChapterView::Plain`] and keeps persisting progress, while
//! frames carry no highlight.

use super::events::{Persistence, PlaybackEvent};
use super::tracker::{PlaybackPosition, PlaybackPositionTracker};
use crate::alignment::{AlignmentError, AlignmentProvider, AlignmentStore, AlignmentTable};
use crate::progress::{ProgressPersister, ProgressStore};
use crate::render::{HighlightRenderer, RenderedText};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// What the reader shows for an opened chapter
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterView {
    /// Word-level highlighting available
    Synced(Arc<AlignmentTable>),
    /// Unsynchronized script; the caller displays its own chapter text
    Plain { reason: AlignmentError },
}

/// Highlight state after one playback event
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightFrame {
    pub position: PlaybackPosition,
    /// Whether the highlighted words differ from the previous frame
    pub changed: bool,
    pub text: RenderedText,
}

struct OpenChapter {
    book_id: Uuid,
    chapter_id: Uuid,
    tracker: Option<PlaybackPositionTracker>,
    last_time: Option<f64>,
}

pub struct ReadingSession<P: AlignmentProvider, S: ProgressStore> {
    alignments: AlignmentStore<P>,
    persister: Arc<ProgressPersister<S>>,
    renderer: HighlightRenderer,
    chapter: Option<OpenChapter>,
}

impl<P: AlignmentProvider, S: ProgressStore> ReadingSession<P, S> {
    pub fn new(provider: P, persister: Arc<ProgressPersister<S>>, renderer: HighlightRenderer) -> Self {
        Self {
            alignments: AlignmentStore::new(provider),
            persister,
            renderer,
            chapter: None,
        }
    }

    pub fn profile_id(&self) -> Uuid {
        self.persister.profile_id()
    }

    /// `(book_id, chapter_id)` of the open chapter
    pub fn current_chapter(&self) -> Option<(Uuid, Uuid)> {
        self.chapter.as_ref().map(|c| (c.book_id, c.chapter_id))
    }

    /// Open a chapter, saving the position reached in the previous one
    pub async fn open_chapter(&mut self, book_id: Uuid, chapter_id: Uuid) -> ChapterView {
        self.flush_current().await;

        let view = match self.alignments.load(book_id, chapter_id).await {
            Ok(table) => ChapterView::Synced(table),
            Err(reason) => ChapterView::Plain { reason },
        };

        let tracker = match &view {
            ChapterView::Synced(table) => Some(PlaybackPositionTracker::new(Arc::clone(table))),
            ChapterView::Plain { .. } => None,
        };

        info!(
            profile_id = %self.persister.profile_id(),
            %book_id,
            %chapter_id,
            synced = tracker.is_some(),
            "Opened chapter"
        );

        self.chapter = Some(OpenChapter {
            book_id,
            chapter_id,
            tracker,
            last_time: None,
        });

        view
    }

    /// Apply a playback event
    ///
    /// Returns `None` when no chapter is open.
    pub async fn handle(&mut self, event: PlaybackEvent) -> Option<HighlightFrame> {
        let open = self.chapter.as_mut()?;
        let t = event.time();
        let first = open.last_time.is_none();
        open.last_time = Some(t);

        let frame = match open.tracker.as_mut() {
            Some(tracker) => {
                let (changed, position) = tracker.update(t);
                HighlightFrame {
                    position,
                    changed,
                    text: self.renderer.render(tracker.table(), &position),
                }
            }
            None => HighlightFrame {
                position: PlaybackPosition::at(&[], t),
                changed: first,
                text: RenderedText::Plain {
                    text: String::new(),
                },
            },
        };

        let (book_id, chapter_id) = (open.book_id, open.chapter_id);
        match event.persistence() {
            Persistence::Skip => {}
            Persistence::Throttled => self.persister.report(book_id, chapter_id, t),
            Persistence::Immediate => {
                debug!(%book_id, %chapter_id, ?event, "Persisting position immediately");
                self.persister.report_immediate(book_id, chapter_id, t).await;
            }
        }

        Some(frame)
    }

    /// End the session, saving the last known position
    pub async fn close(&mut self) {
        self.flush_current().await;
        self.alignments.clear();
    }

    async fn flush_current(&mut self) {
        let Some(previous) = self.chapter.take() else {
            return;
        };

        match previous.last_time {
            Some(t) => {
                self.persister
                    .report_immediate(previous.book_id, previous.chapter_id, t)
                    .await
            }
            None => self.persister.cancel(previous.book_id, previous.chapter_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{AlignmentLookup, WordSpan};
    use crate::error::Result;
    use crate::progress::PersistConfig;
    use crate::render::SegmentStyle;
    use async_trait::async_trait;
    use lingua_common::db::ReadingProgress;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MapProvider {
        tables: HashMap<Uuid, Arc<AlignmentTable>>,
    }

    #[async_trait]
    impl AlignmentProvider for MapProvider {
        async fn fetch(
            &self,
            _: Uuid,
            chapter_id: Uuid,
        ) -> std::result::Result<AlignmentLookup, AlignmentError> {
            Ok(self
                .tables
                .get(&chapter_id)
                .cloned()
                .map(AlignmentLookup::Found)
                .unwrap_or(AlignmentLookup::NotFound))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<ReadingProgress>>,
    }

    impl RecordingStore {
        fn writes(&self) -> Vec<(Uuid, f64)> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .map(|w| (w.chapter_id, w.position_seconds))
                .collect()
        }
    }

    #[async_trait]
    impl ProgressStore for RecordingStore {
        async fn upsert(&self, progress: &ReadingProgress) -> Result<()> {
            self.writes.lock().unwrap().push(progress.clone());
            Ok(())
        }

        async fn fetch_for_book(&self, _: Uuid, _: Uuid) -> Result<Vec<ReadingProgress>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        session: ReadingSession<MapProvider, Arc<RecordingStore>>,
        store: Arc<RecordingStore>,
        book: Uuid,
        synced: Uuid,
        unsynced: Uuid,
    }

    fn fixture() -> Fixture {
        let (book, synced, unsynced) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let table = AlignmentTable::new(
            "Hi there",
            vec![WordSpan::new("Hi", 0.0, 0.5, 0.0), WordSpan::new("there", 0.5, 1.0, 0.0)],
            None,
        )
        .unwrap();
        let mut tables = HashMap::new();
        tables.insert(synced, Arc::new(table));

        let store = Arc::new(RecordingStore::default());
        let persister = Arc::new(ProgressPersister::new(
            Arc::clone(&store),
            Uuid::new_v4(),
            PersistConfig::default(),
        ));
        Fixture {
            session: ReadingSession::new(MapProvider { tables }, persister, HighlightRenderer::default()),
            store,
            book,
            synced,
            unsynced,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_updates_highlight_and_throttle() {
        let mut fx = fixture();
        let view = fx.session.open_chapter(fx.book, fx.synced).await;
        assert!(matches!(view, ChapterView::Synced(_)));

        let frame = fx.session.handle(PlaybackEvent::TimeUpdate(0.7)).await.unwrap();
        assert_eq!(frame.position.current_word_index(), 1);
        assert_eq!(frame.position.next_word_index(), 2);
        assert!(frame.changed);
        let RenderedText::Synced { paragraphs } = &frame.text else {
            panic!("expected synced text");
        };
        assert_eq!(paragraphs[0].segments[1].style, SegmentStyle::Active);

        let frame = fx.session.handle(PlaybackEvent::TimeUpdate(0.8)).await.unwrap();
        assert!(!frame.changed);
        assert!(fx.store.writes().is_empty(), "Time updates are deferred");

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fx.store.writes(), vec![(fx.synced, 0.8)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_seek_persist_immediately() {
        let mut fx = fixture();
        fx.session.open_chapter(fx.book, fx.synced).await;

        fx.session.handle(PlaybackEvent::TimeUpdate(0.2)).await;
        fx.session.handle(PlaybackEvent::Paused(0.3)).await;
        assert_eq!(fx.store.writes(), vec![(fx.synced, 0.3)]);

        fx.session.handle(PlaybackEvent::Seeked(0.9)).await;
        assert_eq!(fx.store.writes(), vec![(fx.synced, 0.3), (fx.synced, 0.9)]);

        // A deferred time update is superseded by the next pause
        fx.session.handle(PlaybackEvent::TimeUpdate(1.2)).await;
        fx.session.handle(PlaybackEvent::Paused(1.4)).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            fx.store.writes(),
            vec![(fx.synced, 0.3), (fx.synced, 0.9), (fx.synced, 1.4)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_chapter_flushes_previous_position() {
        let mut fx = fixture();
        fx.session.open_chapter(fx.book, fx.synced).await;
        fx.session.handle(PlaybackEvent::TimeUpdate(0.6)).await;

        let view = fx.session.open_chapter(fx.book, fx.unsynced).await;
        assert!(matches!(
            view,
            ChapterView::Plain {
                reason: AlignmentError::NotFound { .. }
            }
        ));
        assert_eq!(fx.store.writes(), vec![(fx.synced, 0.6)]);
        assert_eq!(fx.session.current_chapter(), Some((fx.book, fx.unsynced)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsynced_chapter_still_persists() {
        let mut fx = fixture();
        fx.session.open_chapter(fx.book, fx.unsynced).await;

        let frame = fx.session.handle(PlaybackEvent::Ended(42.0)).await.unwrap();
        assert_eq!(frame.position.current_word_index(), -1);
        assert!(matches!(frame.text, RenderedText::Plain { .. }));
        assert_eq!(fx.store.writes(), vec![(fx.unsynced, 42.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_last_position() {
        let mut fx = fixture();
        fx.session.open_chapter(fx.book, fx.synced).await;
        fx.session.handle(PlaybackEvent::TimeUpdate(0.4)).await;

        fx.session.close().await;
        assert_eq!(fx.store.writes(), vec![(fx.synced, 0.4)]);
        assert!(fx.session.current_chapter().is_none());
        assert!(fx.session.handle(PlaybackEvent::TimeUpdate(1.0)).await.is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fx.store.writes().len(), 1);
    }
}
