//! Shape records from the upstream slide feed.
//!
//! The feed already carries positions in centimeters, trimmed text and run
//! formatting. Unknown shape kinds deserialize to [`Shape::Unsupported`]
//! and never take part in matching.

use crate::geometry::BoundingBox;
use crate::text::parse_decimal;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Leading numeric part of a point size such as `"27.0pt"` or `"27 pt"`.
static POINT_SIZE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9０-９]+\.?[0-9０-９]*)").unwrap());

/// Discriminant of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    TextBox,
    Table,
    Image,
    CustomShape,
    Group,
    Unsupported,
}

/// A visual element on a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    TextBox(TextShape),
    Table(TableShape),
    Image(ImageShape),
    CustomShape(CustomShape),
    Group(GroupShape),
    #[serde(other)]
    Unsupported,
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::TextBox(_) => ShapeKind::TextBox,
            Shape::Table(_) => ShapeKind::Table,
            Shape::Image(_) => ShapeKind::Image,
            Shape::CustomShape(_) => ShapeKind::CustomShape,
            Shape::Group(_) => ShapeKind::Group,
            Shape::Unsupported => ShapeKind::Unsupported,
        }
    }

    /// Position of the shape; `None` only for unsupported kinds.
    pub fn bbox(&self) -> Option<&BoundingBox> {
        match self {
            Shape::TextBox(s) => Some(&s.bbox),
            Shape::Table(s) => Some(&s.bbox),
            Shape::Image(s) => Some(&s.bbox),
            Shape::CustomShape(s) => Some(&s.bbox),
            Shape::Group(s) => Some(&s.bbox),
            Shape::Unsupported => None,
        }
    }

    /// Text content. Shapes without a text frame report an empty string.
    pub fn text(&self) -> &str {
        match self {
            Shape::TextBox(s) => &s.text,
            Shape::CustomShape(s) => &s.text,
            Shape::Table(_) | Shape::Image(_) | Shape::Group(_) | Shape::Unsupported => "",
        }
    }

    /// Formatting runs of text-bearing shapes.
    pub fn runs(&self) -> &[RunInfo] {
        match self {
            Shape::TextBox(s) => &s.runs,
            Shape::CustomShape(s) => &s.runs,
            Shape::Table(_) | Shape::Image(_) | Shape::Group(_) | Shape::Unsupported => &[],
        }
    }

    /// Whether the shape is a text box or a rectangle auto-shape, the two kinds
    /// that carry titles and labels.
    pub fn is_text_frame(&self) -> bool {
        match self {
            Shape::TextBox(_) => true,
            Shape::CustomShape(s) => s.is_rectangle(),
            Shape::Table(_) | Shape::Image(_) | Shape::Group(_) | Shape::Unsupported => false,
        }
    }

    /// Whether the shape can be exported as an image region.
    pub fn is_region_target(&self) -> bool {
        match self {
            Shape::Image(_) | Shape::CustomShape(_) | Shape::Group(_) => true,
            Shape::TextBox(_) | Shape::Table(_) | Shape::Unsupported => false,
        }
    }

    /// Runs coalesced into formatting-homogeneous fragments.
    pub fn fragments(&self) -> Vec<Fragment> {
        coalesce_runs(self.runs())
    }
}

/// A plain text box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextShape {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,

    #[serde(default, deserialize_with = "deserialize_trimmed")]
    pub text: String,

    #[serde(default)]
    pub runs: Vec<RunInfo>,
}

impl TextShape {
    pub fn new(bbox: BoundingBox, text: impl AsRef<str>) -> Self {
        Self {
            bbox,
            text: text.as_ref().trim().to_string(),
            runs: Vec::new(),
        }
    }

    pub fn with_runs(mut self, runs: Vec<RunInfo>) -> Self {
        self.runs = runs;
        self
    }
}

/// An auto-shape (rectangle, ellipse, arrow...) that may carry text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomShape {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,

    /// Auto-shape type name as reported by the feed, e.g. `RECTANGLE`.
    #[serde(default)]
    pub auto_shape: String,

    #[serde(default, deserialize_with = "deserialize_trimmed")]
    pub text: String,

    #[serde(default)]
    pub runs: Vec<RunInfo>,
}

impl CustomShape {
    pub fn new(bbox: BoundingBox, auto_shape: impl Into<String>, text: impl AsRef<str>) -> Self {
        Self {
            bbox,
            auto_shape: auto_shape.into(),
            text: text.as_ref().trim().to_string(),
            runs: Vec::new(),
        }
    }

    pub fn with_runs(mut self, runs: Vec<RunInfo>) -> Self {
        self.runs = runs;
        self
    }

    /// Rectangles are reported either by name or by their numeric enum value.
    pub fn is_rectangle(&self) -> bool {
        let name = self.auto_shape.trim();
        name.eq_ignore_ascii_case("rectangle") || name == "1"
    }
}

/// A picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageShape {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,

    #[serde(default)]
    pub alt_text: String,
}

impl ImageShape {
    pub fn new(bbox: BoundingBox, alt_text: impl Into<String>) -> Self {
        Self {
            bbox,
            alt_text: alt_text.into(),
        }
    }
}

/// A group of shapes; children may be groups themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupShape {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,

    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl GroupShape {
    pub fn new(bbox: BoundingBox, shapes: Vec<Shape>) -> Self {
        Self { bbox, shapes }
    }

    /// All nested shapes, depth-first in document order (groups included).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.shapes.iter()],
        }
    }

    /// Number of non-group shapes anywhere below this group.
    pub fn leaf_count(&self) -> usize {
        self.descendants()
            .filter(|shape| !matches!(shape, Shape::Group(_)))
            .count()
    }
}

/// Depth-first iterator over a group's nested shapes.
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Shape>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Shape;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(top) = self.stack.last_mut() {
            match top.next() {
                Some(shape) => {
                    if let Shape::Group(group) = shape {
                        self.stack.push(group.shapes.iter());
                    }
                    return Some(shape);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

/// A table with a header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TableRecord")]
pub struct TableShape {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<CellInfo>>,

    /// Header-keyed snapshot of the last valid data row.
    pub last_row: BTreeMap<String, String>,
}

impl TableShape {
    pub fn new(bbox: BoundingBox, cells: Vec<Vec<CellInfo>>) -> Self {
        let rows = cells.len();
        let cols = cells.first().map_or(0, Vec::len);
        let last_row = last_valid_row(&cells);
        Self {
            bbox,
            rows,
            cols,
            cells,
            last_row,
        }
    }

    /// Value of the last valid data row under `header`.
    pub fn last_row_value(&self, header: &str) -> Option<&str> {
        self.last_row.get(header).map(String::as_str)
    }
}

/// Table as it appears in the feed, before the last-row snapshot is computed.
#[derive(Debug, Deserialize)]
struct TableRecord {
    #[serde(rename = "box")]
    bbox: BoundingBox,
    #[serde(default)]
    cells: Vec<Vec<CellInfo>>,
}

impl From<TableRecord> for TableShape {
    fn from(record: TableRecord) -> Self {
        TableShape::new(record.bbox, record.cells)
    }
}

/// One table cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellInfo {
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<RunInfo>,
}

impl CellInfo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            runs: Vec::new(),
        }
    }
}

/// Snapshot the last data row that is non-empty and has the header's width.
///
/// A data row counts as empty when every cell after the first is blank, so a
/// row holding only a serial number is skipped.
fn last_valid_row(cells: &[Vec<CellInfo>]) -> BTreeMap<String, String> {
    let Some(header_row) = cells.first() else {
        return BTreeMap::new();
    };
    let headers: Vec<&str> = header_row.iter().map(|c| c.text.trim()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return BTreeMap::new();
    }

    let mut snapshot = BTreeMap::new();
    for row in &cells[1..] {
        let empty = row.iter().skip(1).all(|c| c.text.trim().is_empty());
        if empty || row.len() != headers.len() {
            continue;
        }
        snapshot = headers
            .iter()
            .zip(row)
            .map(|(header, cell)| (header.to_string(), cell.text.trim().to_string()))
            .collect();
    }
    snapshot
}

/// One formatting run of a paragraph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunInfo {
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,

    /// Size in points; `None` when the run inherits its size.
    #[serde(
        default,
        deserialize_with = "deserialize_point_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub font_size: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,

    /// Index of the paragraph the run belongs to.
    #[serde(default)]
    pub paragraph: usize,
}

impl RunInfo {
    pub fn new(text: impl Into<String>, font_size: Option<f64>) -> Self {
        Self {
            text: text.into(),
            font_size,
            ..Default::default()
        }
    }

    pub fn in_paragraph(mut self, paragraph: usize) -> Self {
        self.paragraph = paragraph;
        self
    }

    fn same_format(&self, other: &RunInfo) -> bool {
        self.paragraph == other.paragraph
            && self.font_name == other.font_name
            && self.font_size == other.font_size
            && self.bold == other.bold
            && self.italic == other.italic
            && self.color == other.color
            && self.alignment == other.alignment
    }
}

/// Consecutive runs of one paragraph sharing the same formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub font_size: Option<f64>,
}

/// Merge adjacent identically formatted runs; runs that are empty once
/// newlines are stripped are dropped without breaking a merge.
pub fn coalesce_runs(runs: &[RunInfo]) -> Vec<Fragment> {
    let mut fragments: Vec<Fragment> = Vec::new();
    let mut previous: Option<&RunInfo> = None;

    for run in runs {
        let text = run.text.trim_matches('\n');
        if text.is_empty() {
            continue;
        }
        if previous.is_some_and(|prev| prev.same_format(run)) {
            if let Some(last) = fragments.last_mut() {
                last.text.push_str(text);
                continue;
            }
        }
        fragments.push(Fragment {
            text: text.to_string(),
            font_size: run.font_size,
        });
        previous = Some(run);
    }

    fragments
}

/// Parse a point size given as `"27.0pt"`, `"27 pt"` or `"27"`.
pub fn parse_point_size(s: &str) -> Option<f64> {
    POINT_SIZE_REGEX
        .captures(s.trim())
        .and_then(|caps| parse_decimal(&caps[1]))
}

fn deserialize_trimmed<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.map(|t| t.trim().to_string()).unwrap_or_default())
}

fn deserialize_point_size<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PointSize {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<PointSize>::deserialize(deserializer)? {
        Some(PointSize::Number(n)) if n >= 0.0 => Some(n),
        Some(PointSize::Number(_)) => None,
        Some(PointSize::Text(s)) => parse_point_size(&s),
        None => None,
    })
}
