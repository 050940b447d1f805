#![deny(missing_docs)]
//! Greenlight core library.
//!
//! This crate contains the rule catalog, evaluation engine, and report
//! aggregation that power the broader Greenlight compliance checker.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod provider;
pub mod report;
/// Rule definitions, check bodies, and outcome types.
pub mod rule;
pub mod snapshot;

pub use catalog::{Catalog, PathInterests, build_catalog};
pub use engine::evaluate;
pub use error::{GreenlightError, Result};
pub use provider::{SnapshotProvider, run_inspection};
pub use report::{
    CategoryScore, Report, Suggestion, aggregate, format_score, render_json, render_markdown,
};
pub use rule::{
    Applicability, Category, CheckKind, MetadataExpectation, Outcome, Rule, SUGGESTION_DETAIL,
    Severity, Status,
};
pub use snapshot::{FileEntry, MetadataValue, Snapshot, TargetKind, normalize_path};
