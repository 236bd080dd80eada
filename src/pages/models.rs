// src/pages/models.rs
use serde::Serialize;

use crate::utils::error::AppError;

/// Plain text of one rendered report page, split into lines in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: u32,
    pub lines: Vec<String>,
}

impl PageText {
    /// Splits raw extracted text on newlines, dropping carriage returns.
    pub fn from_text(page_number: u32, text: &str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        Self { page_number, lines }
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }
}

/// Half-open range of page identifiers `[start, end)` walked with a fixed step.
/// Country pages alternate with chart pages in the publication, hence the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32, step: u32) -> Result<Self, AppError> {
        if step == 0 {
            return Err(AppError::Config("Page step must be greater than zero".to_string()));
        }
        if start > end {
            return Err(AppError::Config(format!(
                "Page range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end, step })
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        (self.start..self.end).step_by(self.step as usize)
    }

    pub fn page_count(&self) -> usize {
        self.pages().count()
    }
}
