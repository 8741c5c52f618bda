//! Field rule configuration.
//!
//! Rules are parsed once into typed records. Malformed entries (short boxes,
//! bad page keys, patterns that do not compile, unknown match codes) are
//! rejected here so an extraction pass never meets them.
//!
//! Rule maps keep the order they are written in: fields of a page, of a
//! title block and of the master are tried top to bottom.
//!
//! Label patterns are written in Python's `re` dialect, look-around included,
//! and compiled with `fancy_regex`.

use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, DEFAULT_IOU_THRESHOLD};
use fancy_regex::Regex;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Direction of a nearest-shape search, relative to the matched label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Down,
    Left,
    Up,
    Right,
}

impl Direction {
    /// Whether `candidate` lies strictly on this side of `reference`.
    /// Both points are centers in slide coordinates, y growing downwards.
    pub fn accepts(self, reference: (f64, f64), candidate: (f64, f64)) -> bool {
        match self {
            Direction::Down => candidate.1 > reference.1,
            Direction::Up => candidate.1 < reference.1,
            Direction::Left => candidate.0 < reference.0,
            Direction::Right => candidate.0 > reference.0,
        }
    }
}

/// How a regex match on a label shape becomes a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchAction {
    /// The label's own trimmed text (code `0`).
    ReturnOwnText,
    /// The matched span with chained `label:` prefixes removed (code `-1`).
    ReturnAfterColon,
    /// The label itself, exported as an image region (code `5`).
    ReturnOwnRegion,
    /// The nearest picture-like shape in a direction (codes `1` to `4`).
    SearchDirection(Direction),
}

impl MatchAction {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::ReturnOwnText),
            -1 => Some(Self::ReturnAfterColon),
            5 => Some(Self::ReturnOwnRegion),
            1 => Some(Self::SearchDirection(Direction::Down)),
            2 => Some(Self::SearchDirection(Direction::Left)),
            3 => Some(Self::SearchDirection(Direction::Up)),
            4 => Some(Self::SearchDirection(Direction::Right)),
            _ => None,
        }
    }
}

/// A field read from the slide master's text boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRule {
    pub field: String,
    pub bbox: BoundingBox,
    pub iou_threshold: f64,
}

/// Split the matched text on `delimiter` and store part `i` under
/// `storage_vars[i]`; empty names discard their part.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSpec {
    pub delimiter: String,
    pub storage_vars: Vec<String>,
}

/// A field read from a fixed position on a given page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRule {
    pub field: String,
    pub bbox: BoundingBox,
    pub iou_threshold: f64,
    pub split: Option<SplitSpec>,
}

/// Rules of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRules {
    pub page_number: u32,
    pub rules: Vec<PageRule>,
}

/// A field found by matching a label's text.
#[derive(Debug, Clone)]
pub struct RegexRule {
    pub field: String,
    /// Human-readable label the pattern is meant to find.
    pub match_key_string: String,
    pub pattern: Regex,
    pub action: MatchAction,
}

impl RegexRule {
    /// Whether the pattern matches `text`. A match that gives up while
    /// backtracking counts as no match.
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text).unwrap_or_else(|e| {
            log::warn!("Pattern for field '{}' gave up on a label: {}", self.field, e);
            false
        })
    }

    /// Leftmost matched span in `text`.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        match self.pattern.find(text) {
            Ok(found) => found.map(|m| m.as_str()),
            Err(e) => {
                log::warn!("Pattern for field '{}' gave up on a label: {}", self.field, e);
                None
            }
        }
    }
}

/// A field read from the last valid row of the slide's table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRule {
    pub field: String,
    pub header: String,
}

/// Rules scoped to the slide carrying the given titles.
#[derive(Debug, Clone)]
pub struct TitleBlock {
    pub first_title: String,
    /// Empty means any second title.
    pub second_title: String,
    pub regex_rules: Vec<RegexRule>,
    pub table_rules: Vec<TableRule>,
}

/// A complete, validated rule set for one report profile.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub iou_threshold: f64,
    pub master: Vec<MasterRule>,
    pub pages: Vec<PageRules>,
    pub titles: Vec<TitleBlock>,
}

impl RuleSet {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawRuleSet = serde_yaml::from_str(content)?;
        raw.validate()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawRuleSet = serde_json::from_str(content)?;
        raw.validate()
    }

    /// Every field name this rule set can produce, split targets included.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.master.iter().map(|r| r.field.as_str()).collect();
        for page in &self.pages {
            for rule in &page.rules {
                match &rule.split {
                    Some(split) => names.extend(
                        split
                            .storage_vars
                            .iter()
                            .filter(|v| !v.is_empty())
                            .map(String::as_str),
                    ),
                    None => names.push(&rule.field),
                }
            }
        }
        for block in &self.titles {
            names.extend(block.regex_rules.iter().map(|r| r.field.as_str()));
            names.extend(block.table_rules.iter().map(|r| r.field.as_str()));
        }
        names
    }
}

/// Named report profiles, e.g. `发包规范V1`.
#[derive(Debug, Clone)]
pub struct FieldsConfig {
    profiles: BTreeMap<String, RuleSet>,
}

impl FieldsConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawFieldsConfig = serde_yaml::from_str(content)?;
        raw.validate()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawFieldsConfig = serde_json::from_str(content)?;
        raw.validate()
    }

    pub fn profile(&self, name: &str) -> Result<&RuleSet> {
        self.profiles.get(name).ok_or_else(|| Error::UnknownProfile {
            profile: name.to_string(),
            available: self.profile_names().collect::<Vec<_>>().join(", "),
        })
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct RawFieldsConfig {
    #[serde(alias = "FIELDS_CONFIG")]
    profiles: BTreeMap<String, RawRuleSet>,
}

impl RawFieldsConfig {
    fn validate(self) -> Result<FieldsConfig> {
        let profiles = self
            .profiles
            .into_iter()
            .map(|(name, raw)| {
                raw.validate()
                    .map(|rules| (name.clone(), rules))
                    .map_err(|e| match e {
                        Error::ConfigError(msg) => {
                            Error::ConfigError(format!("profile '{}': {}", name, msg))
                        }
                        other => other,
                    })
            })
            .collect::<Result<_>>()?;
        Ok(FieldsConfig { profiles })
    }
}

#[derive(Debug, Deserialize)]
struct RawRuleSet {
    #[serde(default = "default_iou_threshold")]
    iou_threshold: f64,

    #[serde(default)]
    master: Entries<RawBoxRule>,

    #[serde(default)]
    page: Entries<Entries<RawPageRule>>,

    #[serde(default)]
    title: Vec<RawTitleBlock>,
}

fn default_iou_threshold() -> f64 {
    DEFAULT_IOU_THRESHOLD
}

/// Map entries in document order. Duplicate keys are rejected.
#[derive(Debug)]
struct Entries<T>(Vec<(String, T)>);

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> IntoIterator for Entries<T> {
    type Item = (String, T);
    type IntoIter = std::vec::IntoIter<(String, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Entries<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

struct EntriesVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
    type Value = Entries<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of named rules")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(String, T)> = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, T>()? {
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(de::Error::custom(format!("duplicate key '{}'", key)));
            }
            entries.push((key, value));
        }
        Ok(Entries(entries))
    }
}

#[derive(Debug, Deserialize)]
struct RawBoxRule {
    #[serde(rename = "box")]
    bbox: Vec<f64>,
    iou_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPageRule {
    #[serde(rename = "box")]
    bbox: Vec<f64>,
    need_split: Option<String>,
    #[serde(alias = "storage_var")]
    storage_vars: Option<Vec<String>>,
    iou_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTitleBlock {
    #[serde(alias = "first")]
    first_title: String,
    #[serde(alias = "second", default)]
    second_title: String,
    #[serde(alias = "re", default)]
    regex_rules: Entries<RawRegexRule>,
    #[serde(alias = "table", default)]
    table_rules: Entries<RawTableRule>,
}

#[derive(Debug, Deserialize)]
struct RawRegexRule {
    #[serde(default)]
    match_key_string: String,
    re_rule: String,
    #[serde(default)]
    match_rule: i64,
}

#[derive(Debug, Deserialize)]
struct RawTableRule {
    match_key_string: String,
}

impl RawRuleSet {
    fn validate(self) -> Result<RuleSet> {
        let default_threshold = check_threshold("iou_threshold", self.iou_threshold)?;

        let master = self
            .master
            .into_iter()
            .map(|(field, raw)| {
                Ok(MasterRule {
                    bbox: rule_box(&field, &raw.bbox)?,
                    iou_threshold: rule_threshold(&field, raw.iou_threshold, default_threshold)?,
                    field,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut pages: Vec<PageRules> = Vec::new();
        for (key, raw_rules) in self.page {
            let page_number = parse_page_key(&key)?;
            if pages.iter().any(|p| p.page_number == page_number) {
                return Err(Error::ConfigError(format!(
                    "page {} is configured twice",
                    page_number
                )));
            }
            let rules = raw_rules
                .into_iter()
                .map(|(field, raw)| {
                    let split = match (raw.need_split, raw.storage_vars) {
                        (Some(delimiter), Some(storage_vars)) if !delimiter.is_empty() => {
                            Some(SplitSpec {
                                delimiter,
                                storage_vars,
                            })
                        }
                        _ => None,
                    };
                    Ok(PageRule {
                        bbox: rule_box(&field, &raw.bbox)?,
                        iou_threshold: rule_threshold(
                            &field,
                            raw.iou_threshold,
                            default_threshold,
                        )?,
                        field,
                        split,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            pages.push(PageRules { page_number, rules });
        }

        let titles = self
            .title
            .into_iter()
            .map(RawTitleBlock::validate)
            .collect::<Result<Vec<_>>>()?;

        Ok(RuleSet {
            iou_threshold: default_threshold,
            master,
            pages,
            titles,
        })
    }
}

impl RawTitleBlock {
    fn validate(self) -> Result<TitleBlock> {
        if self.first_title.is_empty() {
            return Err(Error::ConfigError(
                "title block needs a non-empty first title".to_string(),
            ));
        }

        let regex_rules = self
            .regex_rules
            .into_iter()
            .map(|(field, raw)| {
                if raw.re_rule.is_empty() {
                    return Err(Error::ConfigError(format!(
                        "field '{}': re_rule is empty",
                        field
                    )));
                }
                let pattern = Regex::new(&translate_python_escapes(&raw.re_rule)).map_err(
                    |source| Error::PatternError {
                        field: field.clone(),
                        source,
                    },
                )?;
                let action = MatchAction::from_code(raw.match_rule).ok_or_else(|| {
                    Error::ConfigError(format!(
                        "field '{}': unknown match_rule {}",
                        field, raw.match_rule
                    ))
                })?;
                Ok(RegexRule {
                    field,
                    match_key_string: raw.match_key_string,
                    pattern,
                    action,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let table_rules = self
            .table_rules
            .into_iter()
            .map(|(field, raw)| TableRule {
                field,
                header: raw.match_key_string,
            })
            .collect();

        Ok(TitleBlock {
            first_title: self.first_title,
            second_title: self.second_title,
            regex_rules,
            table_rules,
        })
    }
}

/// Rewrite the escapes that mean something else outside Python's `re`:
/// `\Z` is the end of the text there, `\z` here.
fn translate_python_escapes(pattern: &str) -> String {
    let mut translated = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            translated.push(c);
            continue;
        }
        match chars.next() {
            Some('Z') => translated.push_str(r"\z"),
            Some(escaped) => {
                translated.push('\\');
                translated.push(escaped);
            }
            None => translated.push('\\'),
        }
    }
    translated
}

fn rule_box(field: &str, coords: &[f64]) -> Result<BoundingBox> {
    BoundingBox::from_slice(coords).map_err(|e| match e {
        Error::ConfigError(msg) => Error::ConfigError(format!("field '{}': {}", field, msg)),
        other => other,
    })
}

fn rule_threshold(field: &str, value: Option<f64>, default: f64) -> Result<f64> {
    match value {
        Some(v) => check_threshold(&format!("field '{}' iou_threshold", field), v),
        None => Ok(default),
    }
}

fn check_threshold(name: &str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::ConfigError(format!(
            "{} {} is outside [0, 1]",
            name, value
        )))
    }
}

fn parse_page_key(key: &str) -> Result<u32> {
    match key.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::ConfigError(format!(
            "page key '{}' is not a page number",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
master:
  ProjectCode:
    box: [22.17, 1.33, 3.54, 2.11]
page:
  "1":
    DFM_Info:
      box: [14.44, 15.58, 4.15, 3.23]
      need_split: "\n"
      storage_var: ["", engineer, "", changing_date]
  "10":
    Remark:
      box: [1, 1, 1, 1]
      iou_threshold: 0.5
  "2":
    Cover:
      box: [1, 1, 1, 1]
      need_split: "\n"
title:
  - first: 設備規格及參數
    re:
      dev_failure_rate:
        match_key_string: 故障率
        re_rule: '故障率\s*[:：]\s*[^\n]*'
        match_rule: -1
  - first: 方案版本變更記錄
    second: ""
    table:
      version:
        match_key_string: "報告版本\n（版本號+報告日期）"
"#;

    #[test]
    fn test_parse_rule_set() {
        let rules = RuleSet::from_yaml_str(RULES).unwrap();

        assert_eq!(rules.iou_threshold, DEFAULT_IOU_THRESHOLD);
        assert_eq!(rules.master[0].field, "ProjectCode");

        let pages: Vec<u32> = rules.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(pages, vec![1, 10, 2]);

        let dfm = &rules.pages[0].rules[0];
        let split = dfm.split.as_ref().unwrap();
        assert_eq!(split.delimiter, "\n");
        assert_eq!(split.storage_vars, vec!["", "engineer", "", "changing_date"]);

        assert_eq!(rules.pages[1].rules[0].iou_threshold, 0.5);
        // A delimiter without storage names stores the whole text.
        assert!(rules.pages[2].rules[0].split.is_none());

        let block = &rules.titles[0];
        assert_eq!(block.second_title, "");
        assert_eq!(block.regex_rules[0].action, MatchAction::ReturnAfterColon);
        assert_eq!(rules.titles[1].table_rules[0].header, "報告版本\n（版本號+報告日期）");
    }

    #[test]
    fn test_field_names_include_split_targets() {
        let rules = RuleSet::from_yaml_str(RULES).unwrap();
        let names = rules.field_names();
        assert!(names.contains(&"engineer"));
        assert!(names.contains(&"changing_date"));
        assert!(!names.contains(&"DFM_Info"));
        assert!(names.contains(&"Cover"));
    }

    #[test]
    fn test_short_master_box_is_config_error() {
        let err = RuleSet::from_yaml_str("master:\n  ProjectCode:\n    box: [1.0, 2.0, 3.0]\n")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(ref msg) if msg.contains("ProjectCode")));
    }

    #[test]
    fn test_bad_page_key_is_config_error() {
        let err = RuleSet::from_yaml_str("page:\n  first:\n    A:\n      box: [0, 0, 1, 1]\n")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_rules_keep_written_order() {
        let yaml = r#"
page:
  "1":
    Zeta:
      box: [0, 0, 1, 1]
    Alpha:
      box: [0, 0, 1, 1]
title:
  - first: T
    re:
      later:
        re_rule: 'b'
      earlier:
        re_rule: 'a'
    table:
      z_col:
        match_key_string: Z
      a_col:
        match_key_string: A
"#;
        let rules = RuleSet::from_yaml_str(yaml).unwrap();
        let page_fields: Vec<&str> = rules.pages[0].rules.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(page_fields, vec!["Zeta", "Alpha"]);
        let regex_fields: Vec<&str> =
            rules.titles[0].regex_rules.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(regex_fields, vec!["later", "earlier"]);
        let table_fields: Vec<&str> =
            rules.titles[0].table_rules.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(table_fields, vec!["z_col", "a_col"]);
    }

    #[test]
    fn test_duplicate_rule_name_rejected() {
        let json = r#"{"page": {"1": {
            "Name": {"box": [0, 0, 1, 1]},
            "Name": {"box": [2, 2, 1, 1]}
        }}}"#;
        let err = RuleSet::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("duplicate key 'Name'"));
    }

    #[test]
    fn test_lookahead_pattern_loads_and_matches() {
        let yaml = r#"
title:
  - first: 設備規格及參數
    re:
      dev_failure_rate:
        re_rule: '故障率\s*[:：]\s*(.*?)(?=\n\d+\.|\n\s*$|\n\s*\d+[\.。]|\Z)'
        match_rule: -1
"#;
        let rules = RuleSet::from_yaml_str(yaml).unwrap();
        let rule = &rules.titles[0].regex_rules[0];

        let text = "1.故障率：≤1.23%\n2.機台操作人力: 1人/機";
        assert!(rule.is_match(text));
        assert_eq!(rule.find(text), Some("故障率：≤1.23%"));
        // `\Z` ends the value at the end of the text.
        assert_eq!(rule.find("故障率: 0.5%"), Some("故障率: 0.5%"));
        assert!(!rule.is_match("良率: 99%"));
    }

    #[test]
    fn test_python_end_of_text_escape() {
        assert_eq!(translate_python_escapes(r"a\Z"), r"a\z");
        assert_eq!(translate_python_escapes(r"a\\Z"), r"a\\Z");
        assert_eq!(translate_python_escapes(r"\d+\."), r"\d+\.");
    }

    #[test]
    fn test_broken_pattern_rejected() {
        let yaml = r#"
title:
  - first: T
    re:
      rate:
        re_rule: '故障率(?=\n'
"#;
        let err = RuleSet::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::PatternError { ref field, .. } if field == "rate"));
    }

    #[test]
    fn test_unknown_match_rule_rejected() {
        let yaml = "title:\n  - first: T\n    re:\n      f:\n        re_rule: 'x'\n        match_rule: 7\n";
        assert!(RuleSet::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_match_action_codes() {
        for code in [-1, 0, 1, 2, 3, 4, 5] {
            assert!(MatchAction::from_code(code).is_some());
        }
        assert_eq!(MatchAction::from_code(-1), Some(MatchAction::ReturnAfterColon));
        assert_eq!(MatchAction::from_code(5), Some(MatchAction::ReturnOwnRegion));
        assert_eq!(
            MatchAction::from_code(3),
            Some(MatchAction::SearchDirection(Direction::Up))
        );
        assert_eq!(MatchAction::from_code(6), None);
    }

    #[test]
    fn test_direction_is_strict() {
        let reference = (10.0, 10.0);
        assert!(Direction::Down.accepts(reference, (10.0, 15.0)));
        assert!(!Direction::Down.accepts(reference, (10.0, 10.0)));
        assert!(Direction::Up.accepts(reference, (10.0, 8.0)));
        assert!(Direction::Left.accepts(reference, (2.0, 30.0)));
        assert!(!Direction::Right.accepts(reference, (10.0, 30.0)));
    }

    #[test]
    fn test_profiles() {
        let yaml = format!("profiles:\n  发包规范V1:\n{}", indent(RULES));
        let config = FieldsConfig::from_yaml_str(&yaml).unwrap();
        assert!(config.profile("发包规范V1").is_ok());
        let err = config.profile("missing").unwrap_err();
        assert!(matches!(err, Error::UnknownProfile { ref profile, .. } if profile == "missing"));
        assert!(err.to_string().contains("发包规范V1"));
    }

    fn indent(text: &str) -> String {
        text.lines()
            .map(|line| format!("    {}\n", line))
            .collect()
    }
}
