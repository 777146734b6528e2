//! Text rendering for the read-along view

pub mod highlight;

pub use highlight::{
    display_text, HighlightRenderer, Paragraph, RenderOptions, RenderedText, Segment,
    SegmentStyle,
};
