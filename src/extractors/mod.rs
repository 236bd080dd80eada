// src/extractors/mod.rs
pub mod layout;
pub mod record;

// Re-export key extraction types for convenience
pub use layout::LayoutTable;
pub use record::{ExtractedRecord, Extraction, RecordExtractor};
