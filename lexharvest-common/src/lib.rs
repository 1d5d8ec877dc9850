//! Common types and utilities shared across lexharvest crates.
//!
//! This crate defines the document record every other crate passes around,
//! observability helpers, and the shared error type. It is intentionally
//! lightweight so that all crates can depend on it without introducing heavy
//! transitive costs.
//!
//! # Overview
//!
//! - [`DocumentRecord`]: one listing entry (id, title, canonical link)
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`HarvestError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use lexharvest_common::DocumentRecord;
//!
//! let record = DocumentRecord::new("-42", "Tax Code", "https://lex.uz/docs/-42");
//! assert_eq!(record.id, "-42");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// A single document listing as exposed by the portal.
///
/// `id` stays textual: the sign is significant (two disjoint identifier
/// spaces) and nothing ever does arithmetic on it. Two records describe the
/// same document exactly when their ids are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub url: String,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Error types used across the lexharvest workspace.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// A listing URL could not be assembled from configuration values.
    #[error("Invalid listing URL: {0}")]
    Url(String),

    /// A (category, language) pair named on the command line is not configured.
    #[error("Unknown {kind}: {name}")]
    Unknown { kind: &'static str, name: String },
}

/// Convenient alias for results that use [`HarvestError`].
pub type Result<T> = std::result::Result<T, HarvestError>;
