//! Error types for Greenlight core.

use std::{error::Error, fmt};

/// Error type for Greenlight core operations.
#[derive(Debug)]
pub enum GreenlightError {
    /// A rule set failed validation while the catalog was being built.
    Catalog(String),
    /// A single rule check failed internally.
    Rule(String),
    /// A snapshot provider could not produce a snapshot.
    Provider(String),
}

impl fmt::Display for GreenlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog(message) => write!(f, "catalog error: {message}"),
            Self::Rule(message) => write!(f, "rule error: {message}"),
            Self::Provider(message) => write!(f, "provider error: {message}"),
        }
    }
}

impl Error for GreenlightError {}

/// Convenience result type for Greenlight core.
pub type Result<T> = std::result::Result<T, GreenlightError>;
