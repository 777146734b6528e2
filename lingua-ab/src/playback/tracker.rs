//! Playback position tracking
//!
//! Maps a playback time in seconds onto the alignment table's word indices.
//!
//! **Algorithm:** given words sorted by `start` and a time `t`,
//! - `current` = greatest `i` with `words[i].start <= t` (none if no such `i`)
//! - `next` = smallest `j` with `words[j].start > t` (`words.len()` if none)
//!
//! Both come from a single binary search (`partition_point`), so they are
//! derived independently of any previous call. Seeking backward or forward
//! needs no special handling: every update recomputes from scratch.

use crate::alignment::{AlignmentTable, WordSpan};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Word indices for one playback time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPosition {
    current: Option<usize>,
    next: usize,
    word_count: usize,
}

impl PlaybackPosition {
    /// Compute the position for time `t`
    ///
    /// NaN sorts before every word (no highlight).
    pub fn at(words: &[WordSpan], t: f64) -> Self {
        let started = words.partition_point(|w| w.start <= t);
        Self {
            current: started.checked_sub(1),
            next: started,
            word_count: words.len(),
        }
    }

    /// Index of the word being spoken, if playback has reached the first word
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Index of the first word that has not started yet, if any
    pub fn next(&self) -> Option<usize> {
        (self.next < self.word_count).then_some(self.next)
    }

    /// Current index with `-1` meaning "before the first word"
    pub fn current_word_index(&self) -> i64 {
        self.current.map(|i| i as i64).unwrap_or(-1)
    }

    /// Next index with `word_count` as the "none" sentinel
    pub fn next_word_index(&self) -> usize {
        self.next
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }
}

/// Decides which tokens are paragraph separators rather than words
///
/// A token is structural when its text is exactly `"\r"` or `"\n"`, or when
/// it is whitespace-only and its loss exceeds `loss_threshold`. The
/// threshold has no documented derivation upstream, so it is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralRule {
    pub loss_threshold: f64,
}

impl StructuralRule {
    pub const DEFAULT_LOSS_THRESHOLD: f64 = 1.0;

    pub fn new(loss_threshold: f64) -> Self {
        Self { loss_threshold }
    }

    pub fn is_structural(&self, word: &WordSpan) -> bool {
        word.text == "\r"
            || word.text == "\n"
            || (word.text.trim().is_empty() && word.loss > self.loss_threshold)
    }
}

impl Default for StructuralRule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOSS_THRESHOLD)
    }
}

/// Tracks the playback position within one chapter
///
/// The last position is remembered only to report whether an update moved
/// the highlight; it never feeds into the computation.
#[derive(Debug, Clone)]
pub struct PlaybackPositionTracker {
    table: Arc<AlignmentTable>,
    last: Option<PlaybackPosition>,
}

impl PlaybackPositionTracker {
    pub fn new(table: Arc<AlignmentTable>) -> Self {
        Self { table, last: None }
    }

    /// Position at `t` without touching tracker state
    pub fn position_at(&self, t: f64) -> PlaybackPosition {
        PlaybackPosition::at(self.table.words(), t)
    }

    /// Recompute the position for a time update
    ///
    /// # Returns
    /// Tuple `(changed, position)`; `changed` is true on the first update
    /// and whenever either index differs from the previous update.
    pub fn update(&mut self, t: f64) -> (bool, PlaybackPosition) {
        let position = self.position_at(t);
        let changed = self.last != Some(position);
        self.last = Some(position);
        (changed, position)
    }

    pub fn last_position(&self) -> Option<PlaybackPosition> {
        self.last
    }

    pub fn table(&self) -> &Arc<AlignmentTable> {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(spans: &[(&str, f64, f64)]) -> Vec<WordSpan> {
        spans
            .iter()
            .map(|(text, start, end)| WordSpan::new(*text, *start, *end, 0.0))
            .collect()
    }

    fn tracker(spans: &[(&str, f64, f64)]) -> PlaybackPositionTracker {
        let table = AlignmentTable::new("", words(spans), None).unwrap();
        PlaybackPositionTracker::new(Arc::new(table))
    }

    #[test]
    fn test_hi_there_scenario() {
        let tracker = tracker(&[("Hi", 0.0, 0.5), ("there", 0.5, 1.0)]);

        let position = tracker.position_at(0.7);
        assert_eq!(position.current(), Some(1));
        assert_eq!(position.current_word_index(), 1);
        assert_eq!(position.next(), None);
        assert_eq!(position.next_word_index(), 2);
    }

    #[test]
    fn test_empty_table() {
        let tracker = tracker(&[]);

        let position = tracker.position_at(3.0);
        assert_eq!(position.current(), None);
        assert_eq!(position.current_word_index(), -1);
        assert_eq!(position.next(), None);
        assert_eq!(position.next_word_index(), 0);
    }

    #[test]
    fn test_before_first_word() {
        let tracker = tracker(&[("a", 1.0, 2.0), ("b", 2.0, 3.0)]);

        let position = tracker.position_at(0.5);
        assert_eq!(position.current_word_index(), -1);
        assert_eq!(position.next(), Some(0));
    }

    #[test]
    fn test_boundary_exactness() {
        let tracker = tracker(&[("a", 0.0, 1.0), ("b", 1.0, 2.0), ("c", 2.0, 3.0)]);

        assert_eq!(tracker.position_at(1.0).current(), Some(1));
        assert_eq!(tracker.position_at(1.0).next(), Some(2));
        assert_eq!(tracker.position_at(2.0).current(), Some(2));
        assert_eq!(tracker.position_at(0.0).current(), Some(0));
    }

    #[test]
    fn test_tied_starts_resolve_to_last_and_skip_all() {
        // Zero-length separator shares its start with the following word
        let tracker = tracker(&[("a", 0.0, 1.0), ("\n", 1.0, 1.0), ("b", 1.0, 2.0), ("c", 2.0, 3.0)]);

        let position = tracker.position_at(1.0);
        assert_eq!(position.current(), Some(2));
        assert_eq!(position.next(), Some(3));

        let position = tracker.position_at(0.99);
        assert_eq!(position.current(), Some(0));
        assert_eq!(position.next(), Some(1));
    }

    #[test]
    fn test_index_monotonic_in_time() {
        let tracker = tracker(&[
            ("a", 0.0, 0.4),
            ("b", 0.4, 0.4),
            ("c", 0.4, 1.1),
            ("d", 1.5, 2.0),
            ("e", 2.0, 2.5),
        ]);

        let mut previous = i64::MIN;
        let mut t = -1.0;
        while t < 3.0 {
            let current = tracker.position_at(t).current_word_index();
            assert!(current >= previous, "current index went backwards at t={}", t);
            previous = current;
            t += 0.05;
        }
    }

    #[test]
    fn test_seek_backward_recomputes() {
        let mut tracker = tracker(&[("a", 0.0, 1.0), ("b", 1.0, 2.0), ("c", 2.0, 3.0)]);

        let (_, position) = tracker.update(2.5);
        assert_eq!(position.current(), Some(2));

        let (changed, position) = tracker.update(0.2);
        assert!(changed);
        assert_eq!(position.current(), Some(0));
        assert_eq!(position.next(), Some(1));
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut tracker = tracker(&[("a", 0.0, 1.0), ("b", 1.0, 2.0)]);

        let (first_changed, first) = tracker.update(1.3);
        tracker.update(0.1);
        tracker.update(1.9);
        let (_, again) = tracker.update(1.3);

        assert!(first_changed, "First update always reports a change");
        assert_eq!(first, again);
        assert_eq!(tracker.position_at(1.3), first);
    }

    #[test]
    fn test_update_within_same_word_reports_unchanged() {
        let mut tracker = tracker(&[("a", 0.0, 1.0), ("b", 1.0, 2.0)]);

        tracker.update(0.1);
        let (changed, _) = tracker.update(0.6);
        assert!(!changed);

        let (changed, _) = tracker.update(1.1);
        assert!(changed);
    }

    #[test]
    fn test_nan_time_highlights_nothing() {
        let tracker = tracker(&[("a", 0.0, 1.0)]);

        let position = tracker.position_at(f64::NAN);
        assert_eq!(position.current(), None);
        assert_eq!(position.next(), Some(0));
    }

    #[test]
    fn test_structural_rule() {
        let rule = StructuralRule::default();

        assert!(rule.is_structural(&WordSpan::new("\n", 0.0, 0.0, 0.0)));
        assert!(rule.is_structural(&WordSpan::new("\r", 0.0, 0.0, 0.0)));
        assert!(rule.is_structural(&WordSpan::new("  ", 0.0, 0.0, 1.5)));
        assert!(!rule.is_structural(&WordSpan::new("  ", 0.0, 0.0, 1.0)));
        assert!(!rule.is_structural(&WordSpan::new("word", 0.0, 0.0, 9.0)));
        assert!(!rule.is_structural(&WordSpan::new("\n\n", 0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_structural_rule_threshold_configurable() {
        let rule = StructuralRule::new(0.25);
        assert!(rule.is_structural(&WordSpan::new(" ", 0.0, 0.0, 0.5)));
    }
}
