//! Configuration module for Linkscour
//!
//! This module handles the option set that controls checking behavior, plus
//! loading and validating TOML option files.
//!
//! # Example
//!
//! ```no_run
//! use linkscour::config::load_options;
//! use std::path::Path;
//!
//! let options = load_options(Path::new("linkscour.toml")).unwrap();
//! println!("Filter level: {}", options.filter_level);
//! ```

mod parser;
mod types;
mod validation;

pub use parser::load_options;
pub use types::{CheckOptions, RequestMethod};
pub use validation::validate;
