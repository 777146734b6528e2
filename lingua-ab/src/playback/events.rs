//! Playback events
//!
//! Every event carries the playback time in seconds at the moment it fired.

use serde::{Deserialize, Serialize};

/// How an event's position reaches the progress store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Not persisted
    Skip,
    /// Through the throttled path
    Throttled,
    /// Written now, bypassing the throttle
    Immediate,
}

/// Event from the audio element driving a reading session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "time", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Periodic position tick while playing
    TimeUpdate(f64),
    Played(f64),
    Paused(f64),
    /// User moved the playhead
    Seeked(f64),
    /// Chapter audio reached its end
    Ended(f64),
}

impl PlaybackEvent {
    pub fn time(&self) -> f64 {
        match *self {
            PlaybackEvent::TimeUpdate(t)
            | PlaybackEvent::Played(t)
            | PlaybackEvent::Paused(t)
            | PlaybackEvent::Seeked(t)
            | PlaybackEvent::Ended(t) => t,
        }
    }

    pub fn persistence(&self) -> Persistence {
        match self {
            PlaybackEvent::TimeUpdate(_) => Persistence::Throttled,
            PlaybackEvent::Played(_) => Persistence::Skip,
            PlaybackEvent::Paused(_) | PlaybackEvent::Seeked(_) | PlaybackEvent::Ended(_) => {
                Persistence::Immediate
            }
        }
    }
}

/// Reason attached to a progress report submitted over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEvent {
    TimeUpdate,
    Pause,
    Seek,
    Ended,
    /// Listener is leaving the chapter
    Navigate,
}

impl ProgressEvent {
    pub fn persistence(&self) -> Persistence {
        match self {
            ProgressEvent::TimeUpdate => Persistence::Throttled,
            _ => Persistence::Immediate,
        }
    }
}
