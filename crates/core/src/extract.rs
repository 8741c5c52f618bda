//! The field-matching engine.
//!
//! A pass runs master rules, then page rules, then title blocks, and finally
//! derives the utilization rate. Every lookup is best effort: a rule that
//! finds nothing leaves its field out of the result.

use crate::result::{ExtractionResult, FieldValue};
use crate::rules::{MasterRule, MatchAction, PageRules, RegexRule, RuleSet, TitleBlock};
use crate::search::find_nearest;
use crate::shape::Shape;
use crate::slide::Slide;
use crate::text::{split_after_colon, split_fields, utilization_rate};

/// Field holding the device failure rate, e.g. `≤1.23%`.
pub const FAILURE_RATE_FIELD: &str = "dev_failure_rate";

/// Field derived from [`FAILURE_RATE_FIELD`].
pub const UTILIZATION_RATE_FIELD: &str = "dev_utilization_rate";

/// Applies a [`RuleSet`] to parsed slides.
#[derive(Debug, Clone, Copy)]
pub struct FieldExtractor<'r> {
    rules: &'r RuleSet,
}

impl<'r> FieldExtractor<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules }
    }

    /// Resolve every configured field against `slides`.
    pub fn extract(&self, slides: &[Slide]) -> ExtractionResult {
        log::info!("Extracting fields from {} slides", slides.len());
        let mut result = ExtractionResult::new();

        for rule in &self.rules.master {
            self.extract_master(rule, slides, &mut result);
        }
        for page in &self.rules.pages {
            self.extract_page(page, slides, &mut result);
        }
        for block in &self.rules.titles {
            self.extract_title_block(block, slides, &mut result);
        }
        derive_utilization_rate(&mut result);

        log::info!("Extraction finished with {} fields", result.len());
        result
    }

    fn extract_master(&self, rule: &MasterRule, slides: &[Slide], result: &mut ExtractionResult) {
        let found = slides
            .iter()
            .flat_map(Slide::master_shapes)
            .find(|shape| shape.bbox.iou(&rule.bbox) > rule.iou_threshold);

        match found {
            Some(shape) => {
                result.set_if_absent(&rule.field, FieldValue::text(shape.text.as_str()));
            }
            None => log::debug!("Master field '{}' not found", rule.field),
        }
    }

    fn extract_page(&self, page: &PageRules, slides: &[Slide], result: &mut ExtractionResult) {
        let Some(slide) = slides.iter().find(|s| s.page_number() == page.page_number) else {
            log::debug!("Page {} not in deck, skipping its rules", page.page_number);
            return;
        };

        for rule in &page.rules {
            let found = slide.shapes().iter().find(|shape| {
                shape
                    .bbox()
                    .is_some_and(|bbox| bbox.iou(&rule.bbox) > rule.iou_threshold)
            });
            let Some(shape) = found else {
                log::debug!(
                    "Page field '{}' has no shape at its box on page {}",
                    rule.field,
                    page.page_number
                );
                continue;
            };

            match &rule.split {
                Some(split) => {
                    for (name, part) in
                        split_fields(shape.text(), &split.delimiter, &split.storage_vars)
                    {
                        result.set_if_absent(name, FieldValue::text(part));
                    }
                }
                None => {
                    result.set_if_absent(&rule.field, FieldValue::text(shape.text()));
                }
            }
        }
    }

    fn extract_title_block(
        &self,
        block: &TitleBlock,
        slides: &[Slide],
        result: &mut ExtractionResult,
    ) {
        let Some(slide) = slides
            .iter()
            .find(|s| s.has_titles(&block.first_title, &block.second_title))
        else {
            log::debug!(
                "No slide titled '{}' / '{}', skipping block",
                block.first_title,
                block.second_title
            );
            return;
        };

        for rule in &block.regex_rules {
            match match_label(rule, slide) {
                Some(value) => {
                    result.set_if_absent(&rule.field, value);
                }
                None => log::debug!(
                    "Field '{}' ({}) unresolved on page {}",
                    rule.field,
                    rule.match_key_string,
                    slide.page_number()
                ),
            }
        }

        for rule in &block.table_rules {
            let value = slide
                .first_table()
                .and_then(|table| table.last_row_value(&rule.header));
            match value {
                Some(value) => {
                    result.set_if_absent(&rule.field, FieldValue::text(value));
                }
                None => log::debug!(
                    "Table column '{}' not found on page {}",
                    rule.header,
                    slide.page_number()
                ),
            }
        }
    }
}

/// Find the first label shape matching `rule` and turn it into a value.
///
/// Groups are searched one level deep; their direct children are both the
/// labels and the search pool.
fn match_label(rule: &RegexRule, slide: &Slide) -> Option<FieldValue> {
    for shape in slide.shapes() {
        match shape {
            Shape::Group(group) => {
                let label = group
                    .shapes
                    .iter()
                    .find(|child| child.is_text_frame() && rule.is_match(child.text()));
                if let Some(label) = label {
                    return resolve(rule, label, &group.shapes, slide.page_number());
                }
            }
            _ if shape.is_text_frame() && rule.is_match(shape.text()) => {
                return resolve(rule, shape, slide.shapes(), slide.page_number());
            }
            _ => {}
        }
    }
    None
}

fn resolve(rule: &RegexRule, label: &Shape, pool: &[Shape], page_number: u32) -> Option<FieldValue> {
    match rule.action {
        MatchAction::ReturnOwnText => Some(FieldValue::text(label.text().trim())),
        MatchAction::ReturnAfterColon => {
            let span = rule.find(label.text())?;
            Some(FieldValue::text(split_after_colon(span)))
        }
        MatchAction::ReturnOwnRegion => {
            let bbox = label.bbox()?;
            Some(FieldValue::region(*bbox, page_number))
        }
        MatchAction::SearchDirection(direction) => {
            let target = find_nearest(label, pool, direction)?;
            let bbox = target.bbox()?;
            Some(FieldValue::region(*bbox, page_number))
        }
    }
}

/// Add the utilization rate when the failure rate holds a percentage.
fn derive_utilization_rate(result: &mut ExtractionResult) {
    let derived = result.text(FAILURE_RATE_FIELD).and_then(utilization_rate);
    if let Some(rate) = derived {
        result.set(UTILIZATION_RATE_FIELD, FieldValue::Text(rate));
    }
}
