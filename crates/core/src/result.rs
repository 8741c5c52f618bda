//! The flat field mapping handed to the report exporter.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// A slide region the exporter renders as a cropped image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub page_number: u32,
}

/// Value of one extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Region(Region),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn region(bbox: BoundingBox, page_number: u32) -> Self {
        FieldValue::Region(Region { bbox, page_number })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Region(_) => None,
        }
    }

    pub fn as_region(&self) -> Option<&Region> {
        match self {
            FieldValue::Region(region) => Some(region),
            FieldValue::Text(_) => None,
        }
    }
}

/// Extracted fields keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    fields: BTreeMap<String, FieldValue>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn region(&self, field: &str) -> Option<&Region> {
        self.get(field).and_then(FieldValue::as_region)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.fields.iter()
    }

    /// Store `value` unless the field already holds one. Returns whether it
    /// was stored.
    pub fn set_if_absent(&mut self, field: &str, value: FieldValue) -> bool {
        match self.fields.entry(field.to_string()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
            btree_map::Entry::Occupied(_) => {
                log::debug!("Field '{}' already set, keeping first value", field);
                false
            }
        }
    }

    /// Store `value`, replacing any previous one.
    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }
}

impl<'a> IntoIterator for &'a ExtractionResult {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
