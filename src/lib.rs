//! Linkscour: a broken-link audit engine
//!
//! This crate crawls web pages to discover hyperlinks and determine which of
//! them are broken (unreachable, erroring, or invalid). It is built as a
//! library: the layered checkers in [`checker`] can be embedded in any tool
//! that needs to audit a site for dead links.

pub mod checker;
pub mod config;
pub mod link;
pub mod robots;
pub mod scrape;
pub mod url;

use thiserror::Error;

/// Main error type for Linkscour operations
#[derive(Debug, Error)]
pub enum ScourError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("A scan is already in progress on this checker")]
    AlreadyScanning,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Failure to retrieve or parse a document that was queued for scanning.
///
/// These are reported per page (or per site), never folded into a
/// [`link::Link`]: no Link exists yet when a page fetch fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("HTTP {0} when fetching document")]
    Http(u16),

    #[error("Expected an HTML document, got {0:?}")]
    ContentType(Option<String>),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTML scan error: {0}")]
    Scan(String),
}

/// Result type alias for Linkscour operations
pub type Result<T> = std::result::Result<T, ScourError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use checker::{CheckEvent, HtmlChecker, HtmlUrlChecker, SiteChecker, UrlChecker};
pub use config::{CheckOptions, RequestMethod};
pub use link::{BrokenReason, CheckOutcome, ExcludedReason, Exclusion, Link};
