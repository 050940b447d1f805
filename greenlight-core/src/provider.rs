//! Snapshot provider seam between the engine and artifact fetchers.

use crate::catalog::Catalog;
use crate::engine::evaluate;
use crate::error::Result;
use crate::report::Report;
use crate::snapshot::{Snapshot, TargetKind};

/// Produces snapshots of GitLab targets for evaluation.
///
/// Implementations must populate the file index only with paths they actually
/// attempted to resolve, and leave unknown metadata keys absent rather than
/// supplying placeholders.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotProvider {
    /// Capture a snapshot of the given target.
    fn fetch_snapshot(&self, target_kind: TargetKind, target_ref: &str) -> Result<Snapshot>;
}

/// Fetch a snapshot for a target and evaluate the catalog against it.
pub fn run_inspection<P: SnapshotProvider + ?Sized>(
    provider: &P,
    catalog: &Catalog,
    target_kind: TargetKind,
    target_ref: &str,
) -> Result<Report> {
    let snapshot = provider.fetch_snapshot(target_kind, target_ref)?;
    Ok(evaluate(&snapshot, catalog))
}

#[cfg(test)]
mod tests {
    use super::{MockSnapshotProvider, run_inspection};
    use crate::catalog::build_catalog;
    use crate::error::GreenlightError;
    use crate::rule::Status;
    use crate::snapshot::{FileEntry, Snapshot, TargetKind};

    #[test]
    fn inspection_fetches_then_evaluates() {
        let mut provider = MockSnapshotProvider::new();
        provider
            .expect_fetch_snapshot()
            .withf(|kind, target| {
                *kind == TargetKind::Project && target == "group/project"
            })
            .returning(|kind, target| {
                let mut snapshot = Snapshot::new(kind, target);
                snapshot
                    .file_index
                    .insert("README.md".to_string(), FileEntry::present());
                Ok(snapshot)
            });

        let catalog = build_catalog().expect("catalog");
        let report = run_inspection(&provider, &catalog, TargetKind::Project, "group/project")
            .expect("report");

        let readme = report
            .outcomes
            .iter()
            .find(|outcome| outcome.rule_id == "readme")
            .expect("readme outcome");
        assert_eq!(readme.status, Status::Pass);
    }

    #[test]
    fn fetch_failure_propagates() {
        let mut provider = MockSnapshotProvider::new();
        provider
            .expect_fetch_snapshot()
            .returning(|_, _| Err(GreenlightError::Provider("project not found".to_string())));

        let catalog = build_catalog().expect("catalog");
        let result = run_inspection(&provider, &catalog, TargetKind::Project, "missing/project");

        assert!(result.is_err());
    }
}
