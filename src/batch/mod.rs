// src/batch/mod.rs
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::extractors::{ExtractedRecord, Extraction, RecordExtractor};
use crate::pages::{PageRange, PageSource};
use crate::utils::error::SourceError;

/// Default number of pages extracted at the same time.
pub const DEFAULT_JOBS: usize = 4;

/// Records of a batch run, in page order, plus per-page bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub records: Vec<ExtractedRecord>,
    pub loaded: usize,
    pub unavailable: usize,
    pub incomplete: usize,
}

enum PageOutcome {
    Extracted(Extraction),
    Unavailable(SourceError),
}

/// Runs the record extractor over a range of pages.
pub struct BatchDriver {
    source: Arc<dyn PageSource>,
    extractor: Arc<RecordExtractor>,
    jobs: usize,
}

impl BatchDriver {
    pub fn new(source: Arc<dyn PageSource>, extractor: Arc<RecordExtractor>, jobs: usize) -> Self {
        Self {
            source,
            extractor,
            jobs: jobs.max(1),
        }
    }

    /// Extracts `indicator` from every page in `range`.
    /// Always returns exactly one record per page, in ascending page order; pages whose
    /// source is unavailable come back with only the page number set.
    pub async fn run(&self, range: PageRange, indicator: &str) -> BatchOutcome {
        let pages: Vec<u32> = range.pages().collect();
        tracing::info!(
            "Extracting '{}' from {} pages ({} workers)",
            indicator,
            pages.len(),
            self.jobs
        );

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let indicator: Arc<str> = Arc::from(indicator);
        let mut tasks = JoinSet::new();

        for (position, page_number) in pages.iter().copied().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let extractor = Arc::clone(&self.extractor);
            let indicator = Arc::clone(&indicator);

            tasks.spawn(async move {
                // The semaphore is never closed; a failed acquire just runs unthrottled.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = tokio::task::spawn_blocking(move || {
                    process_page(source.as_ref(), &extractor, page_number, &indicator)
                })
                .await;
                (position, page_number, outcome)
            });
        }

        let mut slots: Vec<Option<ExtractedRecord>> = vec![None; pages.len()];
        let mut loaded = 0;
        let mut unavailable = 0;
        let mut incomplete = 0;

        while let Some(joined) = tasks.join_next().await {
            let (position, page_number, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Page task failed to complete: {}", e);
                    continue;
                }
            };

            let record = match outcome {
                Ok(PageOutcome::Extracted(extraction)) => {
                    loaded += 1;
                    if !extraction.issues.is_empty() {
                        incomplete += 1;
                    }
                    extraction.record
                }
                Ok(PageOutcome::Unavailable(e)) => {
                    tracing::error!("Page {}: source unavailable: {}", page_number, e);
                    unavailable += 1;
                    ExtractedRecord::new(page_number)
                }
                Err(e) => {
                    tracing::error!("Page {}: extraction worker failed: {}", page_number, e);
                    unavailable += 1;
                    ExtractedRecord::new(page_number)
                }
            };
            slots[position] = Some(record);
        }

        let records: Vec<ExtractedRecord> = slots
            .into_iter()
            .zip(pages.iter().copied())
            .map(|(slot, page_number)| slot.unwrap_or_else(|| ExtractedRecord::new(page_number)))
            .collect();

        tracing::info!(
            "Batch finished. Loaded: {}, Unavailable: {}, With issues: {}",
            loaded,
            unavailable,
            incomplete
        );

        BatchOutcome {
            records,
            loaded,
            unavailable,
            incomplete,
        }
    }
}

fn process_page(
    source: &dyn PageSource,
    extractor: &RecordExtractor,
    page_number: u32,
    indicator: &str,
) -> PageOutcome {
    tracing::info!("Processing page {}...", page_number);
    match source.load_page(page_number) {
        Ok(page) => PageOutcome::Extracted(extractor.extract(&page, indicator)),
        Err(e) => PageOutcome::Unavailable(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::LayoutTable;
    use crate::pages::PageText;
    use std::collections::HashMap;

    /// Pages kept in memory; page 13 blows up to simulate a crashing renderer.
    struct MemorySource {
        pages: HashMap<u32, String>,
    }

    impl PageSource for MemorySource {
        fn load_page(&self, page_number: u32) -> Result<PageText, SourceError> {
            if page_number == 13 {
                panic!("renderer crashed on page 13");
            }
            self.pages
                .get(&page_number)
                .map(|text| PageText::from_text(page_number, text))
                .ok_or_else(|| SourceError::DocumentNotFound(format!("page_{:03}.pdf", page_number)))
        }
    }

    fn country_page(country: &str, row: &str) -> String {
        let mut lines: Vec<String> = (0..13).map(|i| format!("header {}", i)).collect();
        lines.push(format!("{} (Somewhere)10th0.800", country));
        lines.push(row.to_string());
        lines.join("\n")
    }

    fn driver(jobs: usize) -> BatchDriver {
        let mut pages = HashMap::new();
        pages.insert(1, country_page("Norway", "Literacy rate 1st 1.000"));
        pages.insert(3, country_page("Chad", "Literacy rate 140th 0.512"));
        pages.insert(7, country_page("Peru", "Literacy rate n/a"));
        pages.insert(9, country_page("Fiji", "No matching row"));

        BatchDriver::new(
            Arc::new(MemorySource { pages }),
            Arc::new(RecordExtractor::new(LayoutTable::builtin())),
            jobs,
        )
    }

    #[test]
    fn test_one_row_per_page_in_order() {
        let range = PageRange::new(1, 12, 2).unwrap();
        let outcome = tokio_test::block_on(driver(3).run(range, "literacy"));

        let pages: Vec<u32> = outcome.records.iter().map(|r| r.page_number).collect();
        assert_eq!(pages, vec![1, 3, 5, 7, 9, 11]);

        assert_eq!(outcome.records[0].country.as_deref(), Some("Norway"));
        assert_eq!(outcome.records[0].rank, Some(1));
        assert_eq!(outcome.records[1].rank, Some(140));
        assert_eq!(outcome.records[1].score, Some(0.512));

        // Missing documents keep only the page number.
        assert_eq!(outcome.records[2], ExtractedRecord::new(5));
        assert_eq!(outcome.records[5], ExtractedRecord::new(11));

        // Partial failures keep the country.
        assert_eq!(outcome.records[3].country.as_deref(), Some("Peru"));
        assert_eq!(outcome.records[3].rank, None);
        assert_eq!(outcome.records[4].country.as_deref(), Some("Fiji"));

        assert_eq!(outcome.loaded, 4);
        assert_eq!(outcome.unavailable, 2);
        assert_eq!(outcome.incomplete, 2);
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let range = PageRange::new(1, 10, 1).unwrap();
        let sequential = tokio_test::block_on(driver(1).run(range, "literacy"));
        let parallel = tokio_test::block_on(driver(8).run(range, "literacy"));
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.records.len(), 9);
    }

    #[tokio::test]
    async fn test_panicking_page_still_yields_a_row() {
        let range = PageRange::new(11, 16, 1).unwrap();
        let outcome = driver(2).run(range, "literacy").await;

        let pages: Vec<u32> = outcome.records.iter().map(|r| r.page_number).collect();
        assert_eq!(pages, vec![11, 12, 13, 14, 15]);
        assert_eq!(outcome.records[2], ExtractedRecord::new(13));
        assert_eq!(outcome.unavailable, 5);
        assert_eq!(outcome.loaded, 0);
    }

    #[test]
    fn test_empty_range() {
        let range = PageRange::new(4, 4, 1).unwrap();
        let outcome = tokio_test::block_on(driver(2).run(range, "literacy"));
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.loaded + outcome.unavailable, 0);
    }
}
