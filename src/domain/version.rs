//! Version folder naming
//!
//! Folders named `V<n>` (case insensitive) hold one versioned set of
//! artifacts. Listings present them newest first.

use regex::Regex;
use std::sync::OnceLock;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[Vv](\d+)$").expect("static regex is valid"))
}

/// Version number of a `V<n>` folder name
pub fn version_number(folder: &str) -> Option<u64> {
    version_pattern()
        .captures(folder)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Order folders: version folders newest first, then everything else in
/// the order given.
pub fn order_folders(folders: Vec<String>) -> Vec<String> {
    let (mut versions, others): (Vec<String>, Vec<String>) = folders
        .into_iter()
        .partition(|name| version_number(name).is_some());

    versions.sort_by_key(|name| std::cmp::Reverse(version_number(name).unwrap_or(0)));
    versions.extend(others);
    versions
}

/// Next free version folder after the ones present
pub fn next_version_folder(folders: &[String]) -> String {
    let next = folders
        .iter()
        .filter_map(|name| version_number(name))
        .max()
        .map(|n| n + 1)
        .unwrap_or(1);
    format!("V{}", next)
}
