// src/extractors/layout.rs

// --- Imports ---
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::extractors::record::ExtractedRecord;
use crate::utils::error::{AppError, ExtractError};

// --- Constants ---
// Cells the publication leaves unpublished are rendered as a dash.
const PLACEHOLDER_DASHES: [&str; 3] = ["-", "\u{2013}", "\u{2014}"];

// --- Data Structures ---

/// Token positions of the differential and the two bound columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsOffsets {
    pub diff: usize,
    pub left: usize,
    pub right: usize,
}

/// Which trailing columns a row carries after rank and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Columns {
    /// Rank and score only (literacy-style rows).
    RankScore,
    /// Differential and bounds always present; the line must be long enough to hold them.
    WithBounds(BoundsOffsets),
    /// Summary rows: differential and bounds may be missing or dashed out.
    OptionalBounds(BoundsOffsets),
}

/// How one indicator's row is laid out once the line is split on whitespace.
/// Offsets count the tokens consumed by the indicator's label in the publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRule {
    pub indicator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_prefix: Option<String>,
    pub rank_offset: usize,
    pub score_offset: usize,
    pub columns: Columns,
}

/// Layout used for indicator names without a dedicated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackLayout {
    pub rank_offset: usize,
    pub score_offset: usize,
    pub columns: Columns,
}

impl Default for FallbackLayout {
    fn default() -> Self {
        Self {
            rank_offset: 4,
            score_offset: 5,
            columns: Columns::WithBounds(BoundsOffsets { diff: 6, left: 7, right: 8 }),
        }
    }
}

/// Indicator name → row layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutTable {
    rules: Vec<LayoutRule>,
    fallback: FallbackLayout,
}

/// On-disk shape of a layout override file.
#[derive(Debug, Deserialize)]
struct LayoutFile {
    #[serde(default)]
    rules: Vec<LayoutRule>,
    #[serde(default)]
    fallback: Option<FallbackLayout>,
}

// --- LayoutRule ---

impl LayoutRule {
    fn new(
        indicator: &str,
        line_prefix: Option<&str>,
        rank_offset: usize,
        score_offset: usize,
        columns: Columns,
    ) -> Self {
        Self {
            indicator: indicator.to_string(),
            line_prefix: line_prefix.map(str::to_string),
            rank_offset,
            score_offset,
            columns,
        }
    }

    /// Minimum number of whitespace tokens a matched line must have.
    pub fn min_tokens(&self) -> usize {
        let mut required = self.rank_offset.max(self.score_offset);
        if let Columns::WithBounds(b) = self.columns {
            required = required.max(b.diff).max(b.left).max(b.right);
        }
        required + 1
    }

    /// True when `line` is this indicator's row.
    pub fn matches(&self, line: &str) -> bool {
        let lowered = line.to_lowercase();
        if !lowered.contains(&self.indicator) {
            return false;
        }
        match &self.line_prefix {
            Some(prefix) => lowered.trim_start().starts_with(prefix.as_str()),
            None => true,
        }
    }

    /// Parses the matched line into `record`, in column order rank, score, diff, left, right.
    /// Fields assigned before a failing token keep their values.
    pub fn apply(&self, line: &str, record: &mut ExtractedRecord) -> Result<(), ExtractError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let required = self.min_tokens();
        if tokens.len() < required {
            return Err(ExtractError::TooFewTokens {
                indicator: self.indicator.clone(),
                found: tokens.len(),
                required,
            });
        }

        record.rank = Some(parse_rank(token_at(&tokens, self.rank_offset, "rank")?, self.rank_offset)?);
        record.score = Some(parse_decimal(token_at(&tokens, self.score_offset, "score")?, self.score_offset, "score")?);

        match self.columns {
            Columns::RankScore => {}
            Columns::WithBounds(b) => {
                record.diff = parse_published(token_at(&tokens, b.diff, "diff")?, b.diff, "diff")?;
                record.left = parse_published(token_at(&tokens, b.left, "left")?, b.left, "left")?;
                record.right = parse_published(token_at(&tokens, b.right, "right")?, b.right, "right")?;
            }
            Columns::OptionalBounds(b) => {
                record.diff = parse_optional(&tokens, b.diff, "diff")?;
                record.left = parse_optional(&tokens, b.left, "left")?;
                record.right = parse_optional(&tokens, b.right, "right")?;
            }
        }
        Ok(())
    }

    fn offsets(&self) -> Vec<usize> {
        let mut offsets = vec![self.rank_offset, self.score_offset];
        match self.columns {
            Columns::RankScore => {}
            Columns::WithBounds(b) | Columns::OptionalBounds(b) => {
                offsets.extend([b.diff, b.left, b.right]);
            }
        }
        offsets
    }

    fn normalize(mut self) -> Result<Self, AppError> {
        self.indicator = self.indicator.trim().to_lowercase();
        if self.indicator.is_empty() {
            return Err(AppError::Config("Layout rule has an empty indicator name".to_string()));
        }
        self.line_prefix = self
            .line_prefix
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty());

        let offsets = self.offsets();
        let distinct: HashSet<usize> = offsets.iter().copied().collect();
        if distinct.len() != offsets.len() {
            return Err(AppError::Config(format!(
                "Layout rule '{}' reuses a token offset: {:?}",
                self.indicator, offsets
            )));
        }
        Ok(self)
    }
}

// --- Token parsing helpers ---

fn token_at<'a>(tokens: &[&'a str], position: usize, field: &'static str) -> Result<&'a str, ExtractError> {
    tokens.get(position).copied().ok_or(ExtractError::TokenParse {
        field,
        token: String::new(),
        position,
    })
}

/// Ranks are printed with ordinal suffixes ("87th"); only the digits count.
fn parse_rank(token: &str, position: usize) -> Result<u32, ExtractError> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u32>().map_err(|_| ExtractError::TokenParse {
        field: "rank",
        token: token.to_string(),
        position,
    })
}

fn parse_decimal(token: &str, position: usize, field: &'static str) -> Result<f64, ExtractError> {
    token.parse::<f64>().map_err(|_| ExtractError::TokenParse {
        field,
        token: token.to_string(),
        position,
    })
}

fn is_placeholder(token: &str) -> bool {
    PLACEHOLDER_DASHES.contains(&token)
}

fn parse_published(token: &str, position: usize, field: &'static str) -> Result<Option<f64>, ExtractError> {
    if is_placeholder(token) {
        return Ok(None);
    }
    parse_decimal(token, position, field).map(Some)
}

fn parse_optional(tokens: &[&str], position: usize, field: &'static str) -> Result<Option<f64>, ExtractError> {
    match tokens.get(position) {
        Some(token) => parse_published(token, position, field),
        None => Ok(None),
    }
}

// --- LayoutTable ---

impl LayoutTable {
    /// Row layouts of the country pages as printed in the publication.
    pub fn builtin() -> Self {
        let bounds = |diff, left, right| BoundsOffsets { diff, left, right };
        Self {
            rules: vec![
                LayoutRule::new("literacy", None, 2, 3, Columns::RankScore),
                LayoutRule::new(
                    "educational attainment",
                    Some("educational attainment"),
                    2,
                    3,
                    Columns::RankScore,
                ),
                LayoutRule::new(
                    "labour-force participation rate",
                    None,
                    3,
                    4,
                    Columns::WithBounds(bounds(5, 6, 7)),
                ),
                LayoutRule::new(
                    "professional and technical workers",
                    None,
                    4,
                    5,
                    Columns::WithBounds(bounds(6, 7, 8)),
                ),
                LayoutRule::new("legislators", None, 5, 6, Columns::WithBounds(bounds(7, 8, 9))),
                LayoutRule::new("wage equality", None, 6, 7, Columns::WithBounds(bounds(8, 9, 10))),
                LayoutRule::new("earned income", None, 5, 6, Columns::WithBounds(bounds(7, 8, 9))),
                LayoutRule::new(
                    "economic participation",
                    Some("economic participation and opportunity"),
                    4,
                    5,
                    Columns::OptionalBounds(bounds(6, 7, 8)),
                ),
            ],
            fallback: FallbackLayout::default(),
        }
    }

    /// Built-in table with overrides from a JSON file applied.
    /// Rules in the file replace built-in rules of the same indicator name and add new ones;
    /// a `fallback` entry replaces the generic layout.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&content).map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        tracing::info!("Loaded {} layout rules from {}", table.rules.len(), path.display());
        Ok(table)
    }

    pub fn from_json_str(content: &str) -> Result<Self, AppError> {
        let file: LayoutFile = serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("Invalid layout file: {}", e)))?;

        let mut table = Self::builtin();
        let mut seen = HashSet::new();
        for rule in file.rules {
            let rule = rule.normalize()?;
            if !seen.insert(rule.indicator.clone()) {
                return Err(AppError::Config(format!(
                    "Duplicate layout rule for '{}'",
                    rule.indicator
                )));
            }
            match table.rules.iter_mut().find(|r| r.indicator == rule.indicator) {
                Some(existing) => {
                    tracing::debug!("Overriding built-in layout for '{}'", rule.indicator);
                    *existing = rule;
                }
                None => table.rules.push(rule),
            }
        }

        if let Some(fallback) = file.fallback {
            // Validate through the same path as named rules.
            LayoutRule::new("fallback", None, fallback.rank_offset, fallback.score_offset, fallback.columns)
                .normalize()?;
            table.fallback = fallback;
        }
        Ok(table)
    }

    /// Layout for an indicator name (case-insensitive). Unknown names get the
    /// generic layout, matched on the name itself.
    pub fn rule_for(&self, indicator: &str) -> LayoutRule {
        let name = indicator.trim().to_lowercase();
        if let Some(rule) = self.rules.iter().find(|r| r.indicator == name) {
            return rule.clone();
        }
        tracing::debug!("No dedicated layout for '{}', using generic layout", name);
        LayoutRule {
            indicator: name,
            line_prefix: None,
            rank_offset: self.fallback.rank_offset,
            score_offset: self.fallback.score_offset,
            columns: self.fallback.columns,
        }
    }

    pub fn rules(&self) -> &[LayoutRule] {
        &self.rules
    }
}

impl Default for LayoutTable {
    fn default() -> Self {
        Self::builtin()
    }
}
