//! Opening/closing tag balance check for the app's HTML templates.

use std::collections::BTreeMap;

use aistudy_common::{Error, Result};
use regex::Regex;
use serde::Serialize;

/// Elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "br", "hr", "img", "input", "meta", "link", "area", "base", "col", "embed", "source", "track",
    "wbr", "circle",
];

const MOST_COMMON_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub opening: usize,
    pub closing: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagReport {
    /// Non-void tags whose opening and closing counts differ, sorted by name.
    pub unbalanced: Vec<TagCount>,
    pub total_opening: usize,
    pub total_closing: usize,
    /// Most frequent opening tags, highest count first.
    pub most_common: Vec<(String, usize)>,
}

impl TagReport {
    pub fn is_balanced(&self) -> bool {
        self.unbalanced.is_empty()
    }
}

pub struct TagScanner {
    opening: Regex,
    closing: Regex,
}

impl TagScanner {
    pub fn new() -> Result<Self> {
        let compile =
            |pattern: &str| Regex::new(pattern).map_err(|e| Error::Maintenance(e.to_string()));
        Ok(Self {
            opening: compile(r"<([a-zA-Z][a-zA-Z0-9]*)([^>]*)>")?,
            closing: compile(r"</([a-zA-Z][a-zA-Z0-9]*)>")?,
        })
    }

    pub fn scan(&self, html: &str) -> TagReport {
        let mut opening: BTreeMap<&str, usize> = BTreeMap::new();
        let mut closing: BTreeMap<&str, usize> = BTreeMap::new();

        for caps in self.opening.captures_iter(html) {
            // `<x ... />` closes itself
            if caps.get(2).is_some_and(|rest| rest.as_str().ends_with('/')) {
                continue;
            }
            if let Some(tag) = caps.get(1) {
                *opening.entry(tag.as_str()).or_default() += 1;
            }
        }
        for caps in self.closing.captures_iter(html) {
            if let Some(tag) = caps.get(1) {
                *closing.entry(tag.as_str()).or_default() += 1;
            }
        }

        let mut names: Vec<&str> = opening.keys().chain(closing.keys()).copied().collect();
        names.sort_unstable();
        names.dedup();

        let unbalanced = names
            .into_iter()
            .filter(|tag| !VOID_ELEMENTS.contains(tag))
            .map(|tag| TagCount {
                tag: tag.to_string(),
                opening: opening.get(tag).copied().unwrap_or(0),
                closing: closing.get(tag).copied().unwrap_or(0),
            })
            .filter(|count| count.opening != count.closing)
            .collect();

        let mut most_common: Vec<(String, usize)> = opening
            .iter()
            .map(|(tag, count)| (tag.to_string(), *count))
            .collect();
        // stable sort keeps name order among equal counts
        most_common.sort_by(|a, b| b.1.cmp(&a.1));
        most_common.truncate(MOST_COMMON_LIMIT);

        TagReport {
            unbalanced,
            total_opening: opening.values().sum(),
            total_closing: closing.values().sum(),
            most_common,
        }
    }
}

/// Count opening and closing tags in `html` and report the ones that do not
/// pair up.
pub fn check_tag_balance(html: &str) -> Result<TagReport> {
    Ok(TagScanner::new()?.scan(html))
}
