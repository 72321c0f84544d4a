//! tabscrape Common Library
//!
//! Shared error and configuration types for the query engine and its drivers.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use crate::config::{OutputEncoding, ParseSettings, ScriptEncoding, ShellSettings};
pub use crate::error::{Result, ScrapeError};
