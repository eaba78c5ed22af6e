//! Configuration module for sitetree
//!
//! Settings are layered: built-in defaults, an optional TOML file, `SITETREE_*`
//! environment variables and finally command-line flags. The result is
//! validated once before any request is made.
//!
//! # Example
//!
//! ```no_run
//! use sitetree::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitetree.toml")).unwrap();
//! println!("Crawling {} to depth {}", config.scan.url, config.scan.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Browser, ClientConfig, CollectConfig, Config, OutputConfig, RenderConfig, ScanConfig,
    DEFAULT_MAX_BODY_SIZE,
};

// Re-export parser functions
pub use parser::{
    apply_env, apply_env_overrides, compute_config_hash, load_config, load_config_with_hash,
    parse_config,
};
pub use validation::validate;
