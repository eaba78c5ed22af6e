//! URL handling module for sitetree
//!
//! This module provides host extraction, domain allow-list matching and
//! resolution of attribute values found in HTML against the page they came from.

mod domain;
mod matcher;
mod resolve;

// Re-export main functions
pub use domain::{domain_of, extract_domain};
pub use matcher::{matches_pattern, validate_pattern, AllowList};
pub use resolve::{parse_seed, resolve_reference};
