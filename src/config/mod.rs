//! Configuration module for the archive ingester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; an empty file yields the defaults used against the
//! public Fotoladu service.
//!
//! # Example
//!
//! ```no_run
//! use fotoladu_ingest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fotoladu.toml")).unwrap();
//! println!("Downloading into {}", config.storage.download_root);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, LimitsConfig, ServiceConfig, StorageConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, default_config_with_hash, load_config, load_config_with_hash,
};
pub use validation::validate;
