// src/main.rs
mod batch;
mod extractors;
mod pages;
mod storage;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use batch::{BatchDriver, DEFAULT_JOBS};
use extractors::record::DEFAULT_COUNTRY_LINE;
use extractors::{LayoutTable, RecordExtractor};
use pages::{PageRange, PageSource, PdfPageSource, TextPageSource};
use storage::StorageManager;
use utils::AppError;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Extract the demonstration page with verbose diagnostics and print the result
    Debug,
    /// Extract every page in the range and write a delimited file
    Batch,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceKind {
    /// page_NNN.pdf files
    Pdf,
    /// Pre-extracted page_NNN.txt files
    Text,
}

/// Command Line Interface for the country report page extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Indicator name to extract, e.g. "literacy" or "wage equality"
    indicator: String,

    /// Single-page debug run or full batch run
    #[arg(short, long, value_enum, default_value_t = Mode::Debug)]
    mode: Mode,

    /// Directory holding the split-out report pages
    #[arg(long, default_value = "pages")]
    pages_dir: PathBuf,

    /// Kind of page files to read
    #[arg(long, value_enum, default_value_t = SourceKind::Pdf)]
    source: SourceKind,

    /// Page extracted in debug mode
    #[arg(long, default_value_t = 117)]
    debug_page: u32,

    /// First page of the batch range
    #[arg(long, default_value_t = 83)]
    start: u32,

    /// End of the batch range (exclusive)
    #[arg(long, default_value_t = 375)]
    end: u32,

    /// Distance between country pages
    #[arg(long, default_value_t = 2)]
    step: u32,

    /// Output directory for extracted tables
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// JSON file with layout rule overrides
    #[arg(long)]
    layouts: Option<PathBuf>,

    /// Start searching for the indicator after the line containing this phrase
    #[arg(long)]
    section_marker: Option<String>,

    /// Line (0-indexed) holding the country name
    #[arg(long, default_value_t = DEFAULT_COUNTRY_LINE)]
    country_line: usize,

    /// Number of pages extracted concurrently (default: $EXTRACTOR_JOBS or 4)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Field delimiter of the output file
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var); debug mode is verbose by default
    let default_level = match args.mode {
        Mode::Debug => "debug",
        Mode::Batch => "info",
    };
    utils::logging::setup_logging(default_level);
    tracing::info!("Starting processing for args: {:?}", args);

    let delimiter = delimiter_byte(args.delimiter)?;
    let jobs = resolve_jobs(args.jobs);

    // 3. Build the extractor from the layout table
    let layouts = match &args.layouts {
        Some(path) => LayoutTable::from_json_file(path)?,
        None => LayoutTable::builtin(),
    };
    let extractor = RecordExtractor::new(layouts)
        .with_section_marker(args.section_marker.clone())
        .with_country_line(args.country_line);

    // 4. Initialize page source and storage
    let source: Arc<dyn PageSource> = match args.source {
        SourceKind::Pdf => Arc::new(PdfPageSource::new(&args.pages_dir)),
        SourceKind::Text => Arc::new(TextPageSource::new(&args.pages_dir)),
    };
    let storage = StorageManager::new(&args.output_dir)?;

    match args.mode {
        Mode::Debug => run_debug(&args, source.as_ref(), &extractor, &storage),
        Mode::Batch => run_batch(&args, source, extractor, &storage, jobs, delimiter).await,
    }
}

fn run_debug(
    args: &Args,
    source: &dyn PageSource,
    extractor: &RecordExtractor,
    storage: &StorageManager,
) -> Result<(), AppError> {
    let known: Vec<&str> = extractor
        .layouts()
        .rules()
        .iter()
        .map(|rule| rule.indicator.as_str())
        .collect();
    tracing::debug!("Indicators with dedicated layouts: {:?}", known);

    let page_number = args.debug_page;
    tracing::info!("Processing page {}...", page_number);
    let page = source.load_page(page_number)?;

    let extraction = extractor.extract(&page, &args.indicator);
    for issue in &extraction.issues {
        tracing::debug!("Page {}: {}", page_number, issue);
    }
    tracing::debug!("Record complete: {}", extraction.record.is_complete());

    // Save the page text with the lines that drove the extraction marked
    let debug_dir = storage.base_dir().join("debug");
    std::fs::create_dir_all(&debug_dir)?;
    let dump_path = debug_dir.join(format!(
        "page_{:03}_{}.txt",
        page_number,
        storage::file_stem(&args.indicator)
    ));
    let indicator_pattern = format!("(?i){}", regex::escape(args.indicator.trim()));
    let marker_pattern = args
        .section_marker
        .as_ref()
        .map(|marker| format!("(?i){}", regex::escape(marker.trim())));
    let mut patterns = vec![(indicator_pattern.as_str(), "indicator")];
    if let Some(pattern) = &marker_pattern {
        patterns.push((pattern.as_str(), "section"));
    }
    if let Err(e) = utils::page_debug::create_debug_dump(
        &page,
        &dump_path,
        &patterns,
        &[(args.country_line, "country")],
    ) {
        tracing::warn!("Failed to create debug dump: {}", e);
    }

    println!("\nExtracted results:");
    print!("{}", storage::render_table(std::slice::from_ref(&extraction.record)));
    Ok(())
}

async fn run_batch(
    args: &Args,
    source: Arc<dyn PageSource>,
    extractor: RecordExtractor,
    storage: &StorageManager,
    jobs: usize,
    delimiter: u8,
) -> Result<(), AppError> {
    let range = PageRange::new(args.start, args.end, args.step)?;
    let rule = extractor.layouts().rule_for(&args.indicator);
    tracing::info!(
        "Batch over pages {}..{} step {} ({} pages) from {}",
        range.start,
        range.end,
        range.step,
        range.page_count(),
        args.pages_dir.display()
    );

    let driver = BatchDriver::new(source, Arc::new(extractor), jobs);
    let outcome = driver.run(range, &args.indicator).await;

    let path = storage.save_records(&args.indicator, &outcome.records, delimiter)?;
    tracing::info!("Saved {} records to: {}", outcome.records.len(), path.display());

    match storage.save_run_metadata(&args.indicator, &range, &rule, &outcome) {
        Ok(path) => tracing::info!("Saved run metadata to: {}", path.display()),
        Err(e) => tracing::error!("Failed to save run metadata: {}", e),
    }

    if outcome.loaded == 0 && outcome.unavailable > 0 {
        return Err(AppError::Processing(format!(
            "None of the {} pages in {}..{} could be loaded from {}",
            outcome.unavailable,
            range.start,
            range.end,
            args.pages_dir.display()
        )));
    }

    Ok(())
}

/// Worker count from the command line, then `EXTRACTOR_JOBS`, then the default.
fn resolve_jobs(cli: Option<usize>) -> usize {
    if let Some(jobs) = cli {
        tracing::debug!("Using {} workers from command-line argument", jobs);
        return jobs.max(1);
    }
    match std::env::var("EXTRACTOR_JOBS") {
        Ok(value) => match value.parse::<usize>() {
            Ok(jobs) if jobs > 0 => {
                tracing::debug!("Using {} workers from EXTRACTOR_JOBS", jobs);
                jobs
            }
            _ => {
                tracing::warn!("Ignoring invalid EXTRACTOR_JOBS value '{}'", value);
                DEFAULT_JOBS
            }
        },
        Err(_) => DEFAULT_JOBS,
    }
}

fn delimiter_byte(delimiter: char) -> Result<u8, AppError> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(AppError::Config(format!(
            "Delimiter '{}' must be a single ASCII character",
            delimiter
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["country_page_extractor", "literacy"]).unwrap();
        assert_eq!(args.mode, Mode::Debug);
        assert_eq!(args.source, SourceKind::Pdf);
        assert_eq!(args.debug_page, 117);
        assert_eq!((args.start, args.end, args.step), (83, 375, 2));
        assert_eq!(args.country_line, 13);
        assert_eq!(args.delimiter, ',');
        assert!(args.layouts.is_none());
    }

    #[test]
    fn test_cli_batch_mode() {
        let args = Args::try_parse_from([
            "country_page_extractor",
            "wage equality",
            "--mode",
            "batch",
            "--source",
            "text",
            "--jobs",
            "8",
            "--section-marker",
            "Key indicators",
        ])
        .unwrap();
        assert_eq!(args.indicator, "wage equality");
        assert_eq!(args.mode, Mode::Batch);
        assert_eq!(args.source, SourceKind::Text);
        assert_eq!(args.jobs, Some(8));
        assert_eq!(args.section_marker.as_deref(), Some("Key indicators"));
    }

    #[test]
    fn test_delimiter_must_be_ascii() {
        assert_eq!(delimiter_byte('\t').unwrap(), b'\t');
        assert!(matches!(delimiter_byte('§'), Err(AppError::Config(_))));
    }

    #[test]
    fn test_cli_jobs_take_precedence() {
        assert_eq!(resolve_jobs(Some(6)), 6);
        assert_eq!(resolve_jobs(Some(0)), 1);
    }
}
