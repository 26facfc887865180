//! URL handling module for Scout
//!
//! This module provides target URL validation, link normalization and domain
//! extraction. The domain is the partition key of the circuit breaker.

mod domain;
mod normalize;

pub use domain::{domain_key, extract_domain};
pub use normalize::{normalize_url, parse_target_url};
