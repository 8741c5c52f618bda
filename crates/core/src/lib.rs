//! Field extraction from packing-spec (发包规范) slide decks.
//!
//! Slides arrive as positioned shape records. Declarative rules locate
//! fields by box overlap, label patterns, direction from a label, or a
//! table's last row, and produce a flat mapping of text values and image
//! regions for the report exporter.

pub mod deck;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod layout;
pub mod pipeline;
pub mod result;
pub mod rules;
pub mod search;
pub mod shape;
pub mod slide;
pub mod text;

pub use error::{Error, Result};
pub use extract::FieldExtractor;
pub use geometry::{calculate_iou, BoundingBox};
pub use layout::{TitleLayout, TitleLayouts};
pub use pipeline::ExtractionJob;
pub use result::{ExtractionResult, FieldValue, Region};
pub use rules::{Direction, FieldsConfig, MatchAction, RuleSet};
pub use shape::{Shape, ShapeKind};
pub use slide::{Slide, SlideFeed, SlideRecord, SlideSummary};
pub use text::{split_after_colon, ColonSplitter};
