//! Highlight rendering
//!
//! Pure mapping from (alignment table, playback position) to styled text
//! segments grouped into paragraphs. No I/O, no state: identical inputs
//! always produce identical output.

use crate::alignment::{AlignmentTable, WordSpan};
use crate::playback::tracker::{PlaybackPosition, StructuralRule};
use serde::Serialize;

/// Visual state of one word relative to the playback position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStyle {
    /// Already spoken
    Past,
    /// Being spoken now
    Active,
    /// Next word to be spoken
    Upcoming,
    Default,
}

/// One displayable word
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Index into the alignment table's words
    pub index: usize,
    /// Display text (escape artifacts removed)
    pub text: String,
    pub style: SegmentStyle,
    /// Whether a single space follows this word
    pub trailing_space: bool,
}

impl Segment {
    fn push_to(&self, out: &mut String) {
        out.push_str(&self.text);
        if self.trailing_space {
            out.push(' ');
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Paragraph {
    pub segments: Vec<Segment>,
}

impl Paragraph {
    /// Concatenated display text of the paragraph
    pub fn text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            segment.push_to(&mut out);
        }
        out
    }
}

/// Renderer output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedText {
    /// Word-level highlighted paragraphs
    Synced { paragraphs: Vec<Paragraph> },
    /// Unsynchronized chapter script (no alignment available)
    Plain { text: String },
}

/// Rendering policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub structural: StructuralRule,
    /// Skip the separator after a word ending in `.`, `!` or `?`
    ///
    /// Some aligner outputs already carry the spacing in the following
    /// token; others may not.
    pub suppress_space_after_sentence_end: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            structural: StructuralRule::default(),
            suppress_space_after_sentence_end: true,
        }
    }
}

/// Undo the quote escaping found in aligner output
pub fn display_text(raw: &str) -> String {
    raw.replace("\\'", "'").replace("\\\"", "\"")
}

fn ends_sentence(text: &str) -> bool {
    text.ends_with(&['.', '!', '?'][..])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightRenderer {
    options: RenderOptions,
}

impl HighlightRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render a chapter at a playback position
    ///
    /// A table without words renders as its plain script.
    pub fn render(&self, table: &AlignmentTable, position: &PlaybackPosition) -> RenderedText {
        if table.is_empty() {
            return RenderedText::Plain {
                text: table.full_text().to_string(),
            };
        }

        RenderedText::Synced {
            paragraphs: self.render_words(table.words(), position.current(), position.next()),
        }
    }

    /// Style and group words into paragraphs
    ///
    /// Structural tokens close the paragraph being built and emit nothing.
    /// Paragraphs with no words are dropped.
    pub fn render_words(
        &self,
        words: &[WordSpan],
        current: Option<usize>,
        next: Option<usize>,
    ) -> Vec<Paragraph> {
        let mut paragraphs = Vec::new();
        let mut building = Paragraph::default();

        for (index, word) in words.iter().enumerate() {
            if self.options.structural.is_structural(word) {
                if !building.segments.is_empty() {
                    paragraphs.push(std::mem::take(&mut building));
                }
                continue;
            }

            let text = display_text(&word.text);
            let trailing_space =
                !(self.options.suppress_space_after_sentence_end && ends_sentence(&text));

            building.segments.push(Segment {
                index,
                text,
                style: style_for(index, current, next),
                trailing_space,
            });
        }

        if !building.segments.is_empty() {
            paragraphs.push(building);
        }

        paragraphs
    }
}

fn style_for(index: usize, current: Option<usize>, next: Option<usize>) -> SegmentStyle {
    match current {
        Some(c) if index < c => return SegmentStyle::Past,
        Some(c) if index == c => return SegmentStyle::Active,
        _ => {}
    }
    if next == Some(index) {
        SegmentStyle::Upcoming
    } else {
        SegmentStyle::Default
    }
}
