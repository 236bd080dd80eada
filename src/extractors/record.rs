// src/extractors/record.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::extractors::layout::{LayoutRule, LayoutTable};
use crate::pages::PageText;
use crate::utils::error::ExtractError;

// --- Constants ---
/// Line (0-indexed) holding "<Country> (<Region>)<rank><score>" on every country page.
pub const DEFAULT_COUNTRY_LINE: usize = 13;

/// Column order of the tabular export.
pub const RECORD_COLUMNS: [&str; 7] = ["country", "page_number", "rank", "score", "diff", "left", "right"];

// --- Regex Patterns (Lazy Static) ---
static LEADING_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\d]+)").expect("Failed to compile LEADING_LABEL_RE"));

// Trailing footnote or region annotation, e.g. "Norway (Europe and Central Asia)"
static TRAILING_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(.*\)$").expect("Failed to compile TRAILING_PAREN_RE"));

// --- Data Structures ---
/// One country's values for one indicator. Every field except the page number may be absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    pub country: Option<String>,
    pub page_number: u32,
    pub rank: Option<u32>,
    pub score: Option<f64>,
    pub diff: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
}

impl ExtractedRecord {
    pub fn new(page_number: u32) -> Self {
        Self {
            country: None,
            page_number,
            rank: None,
            score: None,
            diff: None,
            left: None,
            right: None,
        }
    }

    /// True when every numeric slot was filled.
    pub fn is_complete(&self) -> bool {
        self.rank.is_some()
            && self.score.is_some()
            && self.diff.is_some()
            && self.left.is_some()
            && self.right.is_some()
    }
}

/// Result of extracting one page: the record plus every non-fatal problem met on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: ExtractedRecord,
    pub issues: Vec<ExtractError>,
}

// --- Main Extractor Structure ---
pub struct RecordExtractor {
    layouts: LayoutTable,
    section_marker: Option<String>,
    country_line: usize,
}

impl RecordExtractor {
    pub fn new(layouts: LayoutTable) -> Self {
        Self {
            layouts,
            section_marker: None,
            country_line: DEFAULT_COUNTRY_LINE,
        }
    }

    /// Start the indicator search after the first line containing `marker`, when the page has one.
    pub fn with_section_marker(mut self, marker: Option<String>) -> Self {
        self.section_marker = marker
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());
        self
    }

    pub fn with_country_line(mut self, line: usize) -> Self {
        self.country_line = line;
        self
    }

    pub fn layouts(&self) -> &LayoutTable {
        &self.layouts
    }

    /// Extracts the country label and the `indicator` row from one page.
    pub fn extract(&self, page: &PageText, indicator: &str) -> Extraction {
        let mut record = ExtractedRecord::new(page.page_number);
        let mut issues = Vec::new();

        // 1. Country label from its fixed line
        match page.line(self.country_line) {
            Some(line) => match parse_country(line) {
                Some(country) => {
                    tracing::debug!("Page {}: extracted country '{}'", page.page_number, country);
                    record.country = Some(country);
                }
                None => {
                    tracing::warn!(
                        "Page {}: failed to find country name on line {}: '{}'",
                        page.page_number,
                        self.country_line,
                        line
                    );
                    issues.push(ExtractError::CountryNotFound(self.country_line));
                }
            },
            None => {
                tracing::warn!(
                    "Page {}: only {} lines, no country line {}",
                    page.page_number,
                    page.lines.len(),
                    self.country_line
                );
            }
        }

        // 2. Locate the indicator row
        let rule = self.layouts.rule_for(indicator);
        let start = self.scan_start(page);
        let Some(line) = find_indicator_line(&page.lines[start..], &rule) else {
            tracing::warn!("Page {}: indicator '{}' not found", page.page_number, rule.indicator);
            self.log_near_misses(page, &rule.indicator);
            issues.push(ExtractError::PatternNotFound(rule.indicator));
            return Extraction { record, issues };
        };
        tracing::debug!("Page {}: matched line '{}'", page.page_number, line);

        // 3. Tokenize it with the indicator's layout
        if let Err(e) = rule.apply(line, &mut record) {
            tracing::warn!("Page {}: parsing error: {}", page.page_number, e);
            tracing::debug!(
                "Page {}: line '{}' split into {:?}",
                page.page_number,
                line,
                line.split_whitespace().collect::<Vec<_>>()
            );
            issues.push(e);
        }

        Extraction { record, issues }
    }

    /// Index of the first line to search for the indicator row.
    fn scan_start(&self, page: &PageText) -> usize {
        let Some(marker) = &self.section_marker else {
            return 0;
        };
        match page
            .lines
            .iter()
            .position(|line| line.to_lowercase().contains(marker.as_str()))
        {
            Some(index) => {
                tracing::trace!("Page {}: section marker on line {}", page.page_number, index);
                index + 1
            }
            None => {
                tracing::debug!("Page {}: section marker '{}' absent, scanning from top", page.page_number, marker);
                0
            }
        }
    }

    fn log_near_misses(&self, page: &PageText, indicator: &str) {
        let words: Vec<&str> = indicator.split_whitespace().filter(|w| w.len() > 3).collect();
        for (index, line) in page.lines.iter().enumerate() {
            let lowered = line.to_lowercase();
            if words.iter().any(|w| lowered.contains(w)) {
                tracing::debug!("Page {}: near miss on line {}: '{}'", page.page_number, index, line);
            }
        }
    }
}

/// First line satisfying the layout's match rule; the search stops there.
fn find_indicator_line<'a>(lines: &'a [String], rule: &LayoutRule) -> Option<&'a str> {
    lines.iter().find(|line| rule.matches(line)).map(String::as_str)
}

/// Country label: leading non-digit run, trimmed, without a trailing parenthetical.
pub fn parse_country(line: &str) -> Option<String> {
    let label = LEADING_LABEL_RE.captures(line)?.get(1)?.as_str().trim();
    let country = TRAILING_PAREN_RE.replace(label, "").trim().to_string();
    if country.is_empty() {
        None
    } else {
        Some(country)
    }
}
