//! Deck discovery and report naming.
//!
//! Project folders hold several revisions of a deck (`..._V3.1.pptx`,
//! `..._v3.2.pptx`); only the highest v3 revision in each folder is
//! processed, and its report is named after the part before `v3`.

use crate::text::parse_decimal;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[vV]([0-9０-９]+\.?[0-9０-９]?)").unwrap());

static PREFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*?)[vV]3").unwrap());

/// Directory names that hold generated or auxiliary files, never decks.
pub const EXCLUDED_DIRS: &[&str] = &["result", "temp", "config", "__pycache__"];

/// Suffix appended to the report name prefix.
pub const REPORT_SUFFIX: &str = "_v1_发包规范";

/// Version number in a deck file name, e.g. `3.1` for `Demo_V3.1.pptx`.
pub fn deck_version(file_name: &str) -> Option<f64> {
    VERSION_REGEX
        .captures(file_name)
        .and_then(|caps| parse_decimal(&caps[1]))
}

/// Highest-version v3 deck of each directory, ordered by directory.
///
/// Files must end with `.{extension}` (case-insensitive) and mention `v3`.
/// Directories with an excluded component are ignored.
pub fn latest_decks<P: AsRef<Path>>(paths: &[P], extension: &str) -> Vec<PathBuf> {
    let suffix = format!(".{}", extension.to_lowercase());
    let mut best: BTreeMap<PathBuf, (f64, PathBuf)> = BTreeMap::new();

    for path in paths {
        let path = path.as_ref();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lower = name.to_lowercase();
        if !lower.ends_with(&suffix) || !lower.contains("v3") {
            continue;
        }
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if is_excluded(&dir) {
            continue;
        }
        let Some(version) = deck_version(name) else {
            continue;
        };

        let replace = best
            .get(&dir)
            .map_or(true, |(current, _)| version > *current);
        if replace {
            best.insert(dir, (version, path.to_path_buf()));
        }
    }

    best.into_values().map(|(_, path)| path).collect()
}

fn is_excluded(dir: &Path) -> bool {
    dir.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
    })
}

/// Part of a deck stem before `v3`, with underscores trimmed.
pub fn report_prefix(stem: &str) -> &str {
    match PREFIX_REGEX.captures(stem).and_then(|caps| caps.get(1)) {
        Some(prefix) => prefix.as_str().trim_matches('_'),
        None => stem,
    }
}

/// File name of the report produced for a deck stem.
pub fn report_file_name(stem: &str, extension: &str) -> String {
    format!("{}{}.{}", report_prefix(stem), REPORT_SUFFIX, extension)
}

/// Name of the `attempt`-th result directory: `result`, `result_1`, ...
pub fn result_dir_name(attempt: usize) -> String {
    if attempt == 0 {
        "result".to_string()
    } else {
        format!("result_{}", attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_version() {
        assert_eq!(deck_version("Demo_V3.1.pptx"), Some(3.1));
        assert_eq!(deck_version("demo_v3.pptx"), Some(3.0));
        assert_eq!(deck_version("展示_Ｖ3.2.pptx"), None);
        assert_eq!(deck_version("展示_v３.２.pptx"), Some(3.2));
        assert_eq!(deck_version("demo.pptx"), None);
    }

    #[test]
    fn test_latest_decks_per_directory() {
        let paths = vec![
            PathBuf::from("projects/a/Demo_V3.1.json"),
            PathBuf::from("projects/a/Demo_V3.2.json"),
            PathBuf::from("projects/a/Demo_V2.9.json"),
            PathBuf::from("projects/b/Other_v3.json"),
            PathBuf::from("projects/b/notes.txt"),
            PathBuf::from("projects/b/result/Other_v3.5.json"),
        ];
        let decks = latest_decks(&paths, "json");
        assert_eq!(
            decks,
            vec![
                PathBuf::from("projects/a/Demo_V3.2.json"),
                PathBuf::from("projects/b/Other_v3.json"),
            ]
        );
    }

    #[test]
    fn test_report_names() {
        assert_eq!(report_prefix("Demo测试机器_V3.2"), "Demo测试机器");
        assert_eq!(report_prefix("NoVersion"), "NoVersion");
        assert_eq!(
            report_file_name("Demo_v3.1", "json"),
            "Demo_v1_发包规范.json"
        );
        assert_eq!(result_dir_name(0), "result");
        assert_eq!(result_dir_name(2), "result_2");
    }
}
