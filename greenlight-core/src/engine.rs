//! Evaluation engine: applies every catalog rule to one snapshot.

use crate::catalog::Catalog;
use crate::report::{Report, aggregate};
use crate::rule::Outcome;
use crate::snapshot::Snapshot;

/// Evaluate every catalog rule against a snapshot and aggregate the outcomes.
///
/// Every rule yields exactly one outcome, in catalog order: rules that do not
/// apply to the snapshot's target kind are recorded as skipped, and a rule
/// whose check faults internally is recorded as unknown without aborting the
/// remaining rules. The snapshot is never mutated, so the same catalog can be
/// evaluated concurrently from multiple threads.
pub fn evaluate(snapshot: &Snapshot, catalog: &Catalog) -> Report {
    let mut outcomes = Vec::with_capacity(catalog.len());
    for rule in catalog.iter() {
        let outcome = if !rule.applies_to.covers(snapshot.target_kind) {
            Outcome::skipped(&rule.id)
        } else {
            match rule.check(snapshot) {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::warn!("rule {} faulted: {err}", rule.id);
                    Outcome::unknown(&rule.id, format!("rule_error:{}", rule.id))
                }
            }
        };
        outcomes.push(outcome);
    }
    aggregate(catalog, outcomes)
}
