// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Page document not found: {0}")]
    DocumentNotFound(String),

    #[error("Failed to render page {page}: {reason}")]
    PageRender { page: u32, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal problems found while extracting a single page.
/// These never abort a page; they are collected next to the record and logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("No country label found on line {0}")]
    CountryNotFound(usize),

    #[error("Indicator '{0}' not found in page text")]
    PatternNotFound(String),

    #[error("Line for '{indicator}' has {found} tokens, layout needs at least {required}")]
    TooFewTokens {
        indicator: String,
        found: usize,
        required: usize,
    },

    #[error("Token '{token}' at position {position} is not a valid {field}")]
    TokenParse {
        field: &'static str,
        token: String,
        position: usize,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Page source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
