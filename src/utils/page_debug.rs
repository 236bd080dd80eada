// src/utils/page_debug.rs
use std::fs::File;
use std::io::Write;
use std::path::Path;

use regex::Regex;

use crate::pages::PageText;
use crate::utils::error::AppError;

/// Saves the page's lines to a file, numbered, with tagged lines marked
pub fn save_debug_dump(page: &PageText, filename: &Path, highlights: &[(usize, &str)]) -> Result<(), AppError> {
    let mut file = File::create(filename)?;

    let mut dump = format!("# page {} ({} lines)\n", page.page_number, page.lines.len());
    for (index, line) in page.lines.iter().enumerate() {
        let mut tags: Vec<&str> = highlights
            .iter()
            .filter(|(line_index, _)| *line_index == index)
            .map(|(_, tag)| *tag)
            .collect();
        tags.dedup();

        let marker = if tags.is_empty() { "  " } else { ">>" };
        dump.push_str(&format!("{} {:03} | {}", marker, index, line));
        if !tags.is_empty() {
            dump.push_str(&format!("    [{}]", tags.join(", ")));
        }
        dump.push('\n');
    }

    file.write_all(dump.as_bytes())?;

    tracing::info!("Saved debug dump to {}", filename.display());
    Ok(())
}

/// Creates a debug dump of a page with every line matching one of the regex patterns tagged.
/// `fixed` tags lines by index regardless of content (e.g. the country line).
pub fn create_debug_dump(
    page: &PageText,
    filename: &Path,
    patterns: &[(&str, &str)],
    fixed: &[(usize, &str)],
) -> Result<(), AppError> {
    let mut highlights: Vec<(usize, &str)> = fixed.to_vec();

    for (pattern, tag) in patterns {
        let re = Regex::new(pattern).map_err(|e| {
            AppError::Config(format!("Invalid regex pattern '{}': {}", pattern, e))
        })?;

        for (index, line) in page.lines.iter().enumerate() {
            if re.is_match(line) {
                highlights.push((index, *tag));
            }
        }
    }

    highlights.sort_by_key(|h| h.0);
    save_debug_dump(page, filename, &highlights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_tags_matching_and_fixed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_117.txt");
        let page = PageText::from_text(117, "Title\nNorway (Europe)1st0.874\nLiteracy rate 87th 0.977");

        create_debug_dump(&page, &path, &[(r"(?i)literacy", "indicator")], &[(1, "country")]).unwrap();

        let dump = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "# page 117 (3 lines)");
        assert_eq!(lines[1], "   000 | Title");
        assert_eq!(lines[2], ">> 001 | Norway (Europe)1st0.874    [country]");
        assert_eq!(lines[3], ">> 002 | Literacy rate 87th 0.977    [indicator]");
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let page = PageText::from_text(1, "x");
        let result = create_debug_dump(&page, &dir.path().join("d.txt"), &[("(", "bad")], &[]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
