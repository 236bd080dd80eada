// src/pages/mod.rs
pub mod loader;
pub mod models;

pub use loader::{PageSource, PdfPageSource, TextPageSource};
pub use models::{PageRange, PageText};
