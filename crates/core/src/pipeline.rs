//! One deck in, one field mapping out.

use crate::error::Result;
use crate::extract::FieldExtractor;
use crate::layout::TitleLayout;
use crate::result::ExtractionResult;
use crate::rules::RuleSet;
use crate::slide::{Slide, SlideFeed, SlideRecord};

/// Rules and title layout for extracting one kind of report.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    rules: RuleSet,
    layout: TitleLayout,
}

impl ExtractionJob {
    pub fn new(rules: RuleSet, layout: TitleLayout) -> Self {
        Self { rules, layout }
    }

    /// Build slides from feed records, detecting their titles.
    pub fn build_slides(&self, records: Vec<SlideRecord>) -> Result<Vec<Slide>> {
        records
            .into_iter()
            .map(|record| Slide::from_record(record, &self.layout))
            .collect()
    }

    /// Run a full extraction over a deck.
    ///
    /// Either every slide is valid and the whole mapping is returned, or the
    /// error is logged and nothing is.
    pub fn run(&self, records: Vec<SlideRecord>) -> Result<ExtractionResult> {
        let slides = self.build_slides(records).inspect_err(|e| {
            log::error!("Extraction failed while building slides: {}", e);
        })?;
        Ok(FieldExtractor::new(&self.rules).extract(&slides))
    }

    /// Parse a JSON shape feed and run it.
    pub fn run_feed(&self, feed_json: &str) -> Result<ExtractionResult> {
        let feed = SlideFeed::from_json_str(feed_json).inspect_err(|e| {
            log::error!("Extraction failed, unreadable shape feed: {}", e);
        })?;
        self.run(feed.slides)
    }
}
