//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`string`]: text normalization helpers used by prompts and adapters

pub mod error;
pub mod string;
