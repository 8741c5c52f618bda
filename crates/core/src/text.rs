//! Text helpers for turning label text into field values.

use regex::Regex;
use std::sync::LazyLock;

/// ASCII or fullwidth colon with the whitespace around it.
static COLON_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[:\u{FF1A}]\s*").unwrap());

/// Optional comparison sign, a number and a percent sign.
static PERCENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([≤<]?)([0-9０-９]+(\.[0-9０-９]+)?)%").unwrap());

/// Strips `label:` prefixes from a string.
#[derive(Debug, Clone)]
pub struct ColonSplitter {
    /// Keep splitting while the remainder still holds a colon.
    recursive: bool,
    /// Trim whitespace from the result.
    trim: bool,
}

impl Default for ColonSplitter {
    fn default() -> Self {
        Self {
            recursive: true,
            trim: false,
        }
    }
}

impl ColonSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Return what follows the first colon, or the input if there is none.
    ///
    /// `"型號：尺寸: 1200mm"` gives `"1200mm"` when recursive.
    pub fn split<'a>(&self, input: &'a str) -> &'a str {
        let mut rest = input;
        loop {
            let Some(colon) = COLON_REGEX.find(rest) else {
                break;
            };
            rest = &rest[colon.end()..];
            if !self.recursive || !rest.contains([':', '\u{FF1A}']) {
                break;
            }
        }
        if self.trim {
            rest.trim()
        } else {
            rest
        }
    }
}

/// Recursive, trimmed colon split.
pub fn split_after_colon(input: &str) -> &str {
    ColonSplitter::new().with_trim(true).split(input)
}

/// Pair each non-empty storage name with the part of `text` at its index.
///
/// Parts beyond the end of `storage_vars`, and names beyond the last part,
/// are dropped.
pub fn split_fields<'a, 'n>(
    text: &'a str,
    delimiter: &str,
    storage_vars: &'n [String],
) -> Vec<(&'n str, &'a str)> {
    let parts: Vec<&str> = text.split(delimiter).collect();
    storage_vars
        .iter()
        .zip(parts)
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, part)| (name.as_str(), part))
        .collect()
}

/// Device utilization derived from a failure rate: `"≤1.23%"` gives `"≥ 98.77%"`.
///
/// Returns `None` when no percentage can be found.
pub fn utilization_rate(failure_rate: &str) -> Option<String> {
    let compact: String = failure_rate.chars().filter(|c| *c != ' ').collect();
    let caps = PERCENT_REGEX.captures(&compact)?;
    let rate = parse_decimal(&caps[2])?;
    Some(format!("≥ {:.2}%", 100.0 - rate))
}

/// Parse a decimal number written with ASCII or fullwidth digits.
pub(crate) fn parse_decimal(s: &str) -> Option<f64> {
    let ascii: String = s
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect();
    ascii.parse().ok()
}
