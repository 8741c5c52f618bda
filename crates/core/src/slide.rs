//! Slides and title detection.

use crate::error::{Error, Result};
use crate::layout::TitleLayout;
use crate::shape::{Shape, ShapeKind, TextShape};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point size of a slide's main title.
pub const TITLE_POINT_SIZE: f64 = 27.0;

/// Point size of a slide's second-level title.
pub const SECOND_TITLE_POINT_SIZE: f64 = 20.0;

/// Second-level titles only exist after the cover, contents and summary pages.
const SECOND_TITLE_AFTER_PAGE: u32 = 3;

/// A shape feed document: every slide of one deck.
#[derive(Debug, Clone, Deserialize)]
pub struct SlideFeed {
    pub slides: Vec<SlideRecord>,
}

impl SlideFeed {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// One slide as delivered by the shape feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SlideRecord {
    pub page_number: u32,

    #[serde(default)]
    pub shapes: Vec<Shape>,

    /// Shapes of the slide master's layouts.
    #[serde(default)]
    pub master_shapes: Vec<Shape>,
}

/// A parsed slide with its titles resolved.
#[derive(Debug, Clone, Serialize)]
pub struct Slide {
    page_number: u32,
    shapes: Vec<Shape>,
    master_shapes: Vec<TextShape>,
    title: String,
    second_title: String,
}

impl Slide {
    /// Build a slide and detect its titles against `layout`.
    ///
    /// Only text boxes are kept from `master_shapes`.
    pub fn new(
        page_number: u32,
        shapes: Vec<Shape>,
        master_shapes: Vec<Shape>,
        layout: &TitleLayout,
    ) -> Self {
        let master_shapes = master_shapes
            .into_iter()
            .filter_map(|shape| match shape {
                Shape::TextBox(text_box) => Some(text_box),
                _ => None,
            })
            .collect();

        let mut slide = Self {
            page_number,
            shapes,
            master_shapes,
            title: String::new(),
            second_title: String::new(),
        };
        slide.extract_titles(layout);
        slide
    }

    pub fn from_record(record: SlideRecord, layout: &TitleLayout) -> Result<Self> {
        if record.page_number == 0 {
            return Err(Error::SlideError(
                "page numbers start at 1, got 0".to_string(),
            ));
        }
        Ok(Self::new(
            record.page_number,
            record.shapes,
            record.master_shapes,
            layout,
        ))
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn master_shapes(&self) -> &[TextShape] {
        &self.master_shapes
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn second_title(&self) -> &str {
        &self.second_title
    }

    /// Whether this slide carries the given titles. An empty `second_title`
    /// matches any subtitle.
    pub fn has_titles(&self, title: &str, second_title: &str) -> bool {
        self.title == title && (second_title.is_empty() || self.second_title == second_title)
    }

    /// First top-level table of the slide.
    pub fn first_table(&self) -> Option<&crate::shape::TableShape> {
        self.shapes.iter().find_map(|shape| match shape {
            Shape::Table(table) => Some(table),
            _ => None,
        })
    }

    /// Overview of the slide for diagnostics.
    pub fn summary(&self) -> SlideSummary {
        let mut kinds: BTreeMap<ShapeKind, usize> = BTreeMap::new();
        let mut leaf_count = 0;
        for shape in &self.shapes {
            *kinds.entry(shape.kind()).or_default() += 1;
            leaf_count += match shape {
                Shape::Group(group) => group.leaf_count(),
                _ => 1,
            };
        }

        SlideSummary {
            page_number: self.page_number,
            title: self.title.clone(),
            second_title: self.second_title.clone(),
            shape_count: self.shapes.len(),
            leaf_count,
            master_shape_count: self.master_shapes.len(),
            kinds,
        }
    }

    fn extract_titles(&mut self, layout: &TitleLayout) {
        let mut title = None;
        let mut second_title = None;

        for shape in &self.shapes {
            if !shape.is_text_frame() || shape.text().is_empty() {
                continue;
            }
            let Some(bbox) = shape.bbox() else {
                continue;
            };

            if bbox.iou(&layout.title) > layout.iou_threshold
                && self.has_unique_size(shape, TITLE_POINT_SIZE)
            {
                title = Some(shape.text().to_string());
            }

            if self.page_number > SECOND_TITLE_AFTER_PAGE
                && bbox.iou(&layout.second_title) > layout.iou_threshold
                && self.has_unique_size(shape, SECOND_TITLE_POINT_SIZE)
            {
                second_title = Some(shape.text().to_string());
            }
        }

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(second_title) = second_title {
            self.second_title = second_title;
        }
    }

    /// Exactly one text fragment of `shape` must be set in `size` points.
    fn has_unique_size(&self, shape: &Shape, size: f64) -> bool {
        let matching: Vec<String> = shape
            .fragments()
            .into_iter()
            .filter(|fragment| fragment.font_size == Some(size))
            .map(|fragment| fragment.text)
            .collect();

        if matching.len() == 1 {
            return true;
        }
        log::warn!(
            "Slide {}: expected one {}pt fragment in '{}', found {} {:?}",
            self.page_number,
            size,
            shape.text(),
            matching.len(),
            matching
        );
        false
    }
}

/// Serializable overview of a slide, as printed by `packspec inspect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideSummary {
    pub page_number: u32,
    pub title: String,
    pub second_title: String,
    pub shape_count: usize,
    pub leaf_count: usize,
    pub master_shape_count: usize,
    pub kinds: BTreeMap<ShapeKind, usize>,
}
