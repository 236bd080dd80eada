// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::BatchOutcome;
use crate::extractors::layout::LayoutRule;
use crate::extractors::record::{ExtractedRecord, RECORD_COLUMNS};
use crate::pages::PageRange;
use crate::utils::error::StorageError;

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes the records as a delimited file named after the indicator.
    /// The header row is always written; absent fields become empty cells.
    pub fn save_records(
        &self,
        indicator: &str,
        records: &[ExtractedRecord],
        delimiter: u8,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}.csv", file_stem(indicator)));

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_path(&file_path)?;

        writer.write_record(RECORD_COLUMNS)?;
        for record in records {
            writer.serialize(record)?;
        }
        // Check for error rather than implicitly flushing on drop.
        writer.flush()?;

        tracing::info!("Saved {} rows to {}", records.len(), file_path.display());

        Ok(file_path)
    }

    /// Saves metadata about a batch run in JSON format next to the delimited file
    pub fn save_run_metadata(
        &self,
        indicator: &str,
        range: &PageRange,
        rule: &LayoutRule,
        outcome: &BatchOutcome,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}_meta.json", file_stem(indicator)));

        let layout = serde_json::to_value(rule)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let metadata = serde_json::json!({
            "indicator": indicator,
            "page_range": range,
            "rows": outcome.records.len(),
            "pages_loaded": outcome.loaded,
            "pages_unavailable": outcome.unavailable,
            "pages_with_issues": outcome.incomplete,
            "layout": layout,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());

        Ok(file_path)
    }
}

/// File-name-safe form of an indicator name: lowercase, runs of other characters as `_`.
pub fn file_stem(indicator: &str) -> String {
    let mut stem = String::with_capacity(indicator.len());
    for c in indicator.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            stem.push(c);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "records".to_string()
    } else {
        stem.to_string()
    }
}

/// Fixed-width text table of records, absent values shown as `-`.
pub fn render_table(records: &[ExtractedRecord]) -> String {
    let rows: Vec<[String; 7]> = records
        .iter()
        .map(|r| {
            [
                r.country.clone().unwrap_or_else(|| "-".to_string()),
                r.page_number.to_string(),
                cell(r.rank),
                cell(r.score),
                cell(r.diff),
                cell(r.left),
                cell(r.right),
            ]
        })
        .collect();

    let mut widths = RECORD_COLUMNS.map(str::len);
    for row in &rows {
        for (width, value) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(value.chars().count());
        }
    }

    let format_row = |values: &[&str]| -> String {
        values
            .iter()
            .zip(widths.iter())
            .map(|(value, width)| format!("{:<width$}", value, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = format_row(&RECORD_COLUMNS);
    out.push('\n');
    for row in &rows {
        let values: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&format_row(&values));
        out.push('\n');
    }
    out
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::LayoutTable;

    fn chile() -> ExtractedRecord {
        ExtractedRecord {
            country: Some("Chile".to_string()),
            page_number: 117,
            rank: Some(104),
            score: Some(0.679),
            diff: Some(-19.9),
            left: Some(42.17),
            right: Some(62.07),
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Labour-force participation rate"), "labour_force_participation_rate");
        assert_eq!(file_stem("  wage equality "), "wage_equality");
        assert_eq!(file_stem("earned income (int'l $)"), "earned_income_int_l");
        assert_eq!(file_stem("***"), "records");
    }

    #[test]
    fn test_save_records_writes_header_and_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("out")).unwrap();

        let mut partial = ExtractedRecord::new(119);
        partial.country = Some("Peru".to_string());
        let path = storage.save_records("Literacy", &[chile(), partial], b',').unwrap();

        assert_eq!(path, dir.path().join("out").join("literacy.csv"));
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "country,page_number,rank,score,diff,left,right");
        assert_eq!(lines[1], "Chile,117,104,0.679,-19.9,42.17,62.07");
        assert_eq!(lines[2], "Peru,119,,,,,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_save_records_with_no_rows_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let path = storage.save_records("wage equality", &[], b'\t').unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "country\tpage_number\trank\tscore\tdiff\tleft\tright\n");
    }

    #[test]
    fn test_save_run_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let range = PageRange::new(83, 87, 2).unwrap();
        let rule = LayoutTable::builtin().rule_for("literacy");
        let outcome = BatchOutcome {
            records: vec![chile(), ExtractedRecord::new(85)],
            loaded: 1,
            unavailable: 1,
            incomplete: 0,
        };

        let path = storage.save_run_metadata("literacy", &range, &rule, &outcome).unwrap();
        assert!(path.ends_with("literacy_meta.json"));

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["indicator"], "literacy");
        assert_eq!(json["rows"], 2);
        assert_eq!(json["pages_unavailable"], 1);
        assert_eq!(json["page_range"]["step"], 2);
        assert_eq!(json["layout"]["rank_offset"], 2);
        assert_eq!(json["layout"]["columns"], "rank_score");
        assert!(json["extraction_timestamp"].is_string());
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&[chile(), ExtractedRecord::new(119)]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("country  page_number  rank  score"));
        assert!(lines[1].starts_with("Chile    117          104   0.679  -19.9"));
        assert!(lines[2].starts_with("-        119          -     -"));
    }
}
