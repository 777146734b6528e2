//! Playback-driven reading
//!
//! - [`tracker`]: maps playback time onto word indices
//! - [`events`]: playback events emitted by the audio player
//! - [`session`]: binds one profile to one open chapter and drives the
//!   tracker, renderer and progress persister from playback events

pub mod events;
pub mod session;
pub mod tracker;

pub use events::{PlaybackEvent, Persistence, ProgressEvent};
pub use session::{ChapterView, HighlightFrame, ReadingSession};
pub use tracker::{PlaybackPosition, PlaybackPositionTracker, StructuralRule};
