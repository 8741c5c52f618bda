//! Title positions per document version.
//!
//! Each deck template version places its title and subtitle boxes slightly
//! differently, so the positions are configuration rather than constants.

use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, DEFAULT_IOU_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the title and second-level title sit on a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleLayout {
    pub title: BoundingBox,
    pub second_title: BoundingBox,

    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f64,
}

impl TitleLayout {
    pub fn new(title: BoundingBox, second_title: BoundingBox) -> Self {
        Self {
            title,
            second_title,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

fn default_iou_threshold() -> f64 {
    DEFAULT_IOU_THRESHOLD
}

/// All known title layouts, keyed by version name (`v1`, `v2`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleLayouts {
    /// Version used when none is requested.
    #[serde(default = "default_version")]
    pub default: String,

    pub versions: BTreeMap<String, TitleLayout>,
}

fn default_version() -> String {
    "v1".to_string()
}

impl TitleLayouts {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let layouts: Self = serde_yaml::from_str(content)?;
        layouts.validate()?;
        Ok(layouts)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let layouts: Self = serde_json::from_str(content)?;
        layouts.validate()?;
        Ok(layouts)
    }

    /// Layout for `version`, or for the default version when `None`.
    pub fn layout(&self, version: Option<&str>) -> Result<&TitleLayout> {
        let version = version.unwrap_or(&self.default);
        self.versions
            .get(version)
            .ok_or_else(|| Error::UnknownVersion {
                version: version.to_string(),
                available: self
                    .versions
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn validate(&self) -> Result<()> {
        for (version, layout) in &self.versions {
            if !(0.0..=1.0).contains(&layout.iou_threshold) {
                return Err(Error::ConfigError(format!(
                    "title layout '{}': iou_threshold {} is outside [0, 1]",
                    version, layout.iou_threshold
                )));
            }
        }
        Ok(())
    }
}
