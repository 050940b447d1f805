//! Rule definitions, check bodies, and per-rule outcomes.

use serde::{Deserialize, Serialize};

use crate::error::{GreenlightError, Result};
use crate::snapshot::{MetadataValue, Snapshot, TargetKind};

/// Placeholder token interpolated into suggestion templates.
pub const SUGGESTION_DETAIL: &str = "{{DETAIL}}";

/// Rule category used for grouped scoring.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Presence of required or recommended files.
    Files,
    /// Validity of configuration files.
    Config,
    /// Documentation quality.
    Docs,
    /// Project settings supplied by the fetcher.
    Metadata,
}

impl Category {
    /// Stable lowercase label for rendering.
    pub fn label(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Config => "config",
            Self::Docs => "docs",
            Self::Metadata => "metadata",
        }
    }
}

/// Rule severity; weights the overall score.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Must-have items.
    Required,
    /// Should-have items.
    Recommended,
    /// Nice-to-have items.
    Optional,
}

impl Severity {
    /// Scoring weight for this severity.
    pub fn weight(self) -> u32 {
        match self {
            Self::Required => 3,
            Self::Recommended => 2,
            Self::Optional => 1,
        }
    }

    /// Stable lowercase label for rendering.
    pub fn label(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Recommended => "recommended",
            Self::Optional => "optional",
        }
    }
}

/// Target kinds a rule applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    /// Project snapshots only.
    Project,
    /// User-profile snapshots only.
    UserProfile,
    /// Every target kind.
    Any,
}

impl Applicability {
    /// Whether a snapshot of the given kind is in scope for the rule.
    pub fn covers(self, kind: TargetKind) -> bool {
        match self {
            Self::Project => kind == TargetKind::Project,
            Self::UserProfile => kind == TargetKind::UserProfile,
            Self::Any => true,
        }
    }
}

/// Expectation applied to a metadata value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataExpectation {
    /// The value is text with non-whitespace content.
    NonEmptyText,
    /// The value is an integer greater than zero.
    PositiveInt,
}

/// Closed set of check kinds a rule body can be built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    /// Pass when the first existing candidate path is found.
    FileExists {
        /// Candidate paths in preference order.
        candidates: Vec<String>,
    },
    /// Pass when an existing candidate's text contains a marker.
    ContentPattern {
        /// Candidate paths in preference order.
        candidates: Vec<String>,
        /// Substring that must appear in the file text.
        marker: String,
    },
    /// Pass when a configuration file parses as YAML and carries required keys.
    ConfigKeys {
        /// Path of the configuration file.
        path: String,
        /// Keys that must be present with non-null values.
        required_keys: Vec<String>,
    },
    /// Pass when a metadata value satisfies an expectation.
    MetadataPredicate {
        /// Metadata key to inspect.
        key: String,
        /// Expectation the value must satisfy.
        expect: MetadataExpectation,
    },
    /// Pass when any markdown file exists under a directory.
    TemplateDir {
        /// Directory scanned for `.md` files.
        dir: String,
    },
}

/// Per-rule verdict for one snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The rule's requirement is met.
    Pass,
    /// The rule's requirement is not met.
    Fail,
    /// The rule does not apply to the snapshot's target kind.
    Skipped,
    /// The snapshot lacked the data needed to decide.
    Unknown,
}

impl Status {
    /// Stable lowercase label for rendering.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome of evaluating one rule against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Id of the rule that produced the outcome.
    pub rule_id: String,
    /// Verdict.
    pub status: Status,
    /// Short machine-checkable reason code.
    pub detail: String,
    /// Remediation text, present iff the status is `Fail`.
    pub suggestion: Option<String>,
}

impl Outcome {
    /// Passing outcome with a reason code.
    pub fn pass(rule_id: &str, detail: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            status: Status::Pass,
            detail: detail.into(),
            suggestion: None,
        }
    }

    /// Failing outcome with a reason code and remediation text.
    pub fn fail(rule_id: &str, detail: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            status: Status::Fail,
            detail: detail.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Outcome for a rule that does not apply to the target kind.
    pub fn skipped(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            status: Status::Skipped,
            detail: "not_applicable".to_string(),
            suggestion: None,
        }
    }

    /// Outcome for a rule the snapshot could not decide.
    pub fn unknown(rule_id: &str, detail: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            status: Status::Unknown,
            detail: detail.into(),
            suggestion: None,
        }
    }
}

/// A compliance rule: predicate plus remediation-text generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable unique identifier.
    pub id: String,
    /// Scoring category.
    pub category: Category,
    /// Scoring severity.
    pub severity: Severity,
    /// Target kinds the rule applies to.
    pub applies_to: Applicability,
    /// Check body.
    pub check: CheckKind,
    /// Remediation template; may carry the `{{DETAIL}}` placeholder.
    pub suggestion: String,
}

impl Rule {
    /// Run the rule's check against a snapshot.
    ///
    /// Side-effect free: the snapshot is only read. An `Err` signals an
    /// internal fault (e.g. the fetcher broke the metadata type contract),
    /// which the engine converts to an `Unknown` outcome.
    pub fn check(&self, snapshot: &Snapshot) -> Result<Outcome> {
        let outcome = match &self.check {
            CheckKind::FileExists { candidates } => self.check_file_exists(snapshot, candidates),
            CheckKind::ContentPattern { candidates, marker } => {
                self.check_content_pattern(snapshot, candidates, marker)
            }
            CheckKind::ConfigKeys {
                path,
                required_keys,
            } => self.check_config_keys(snapshot, path, required_keys),
            CheckKind::MetadataPredicate { key, expect } => {
                self.check_metadata(snapshot, key, *expect)?
            }
            CheckKind::TemplateDir { dir } => self.check_template_dir(snapshot, dir),
        };
        Ok(outcome)
    }

    /// Render the remediation text for a failure with the given reason code.
    pub fn suggestion_text(&self, detail: &str) -> String {
        if self.suggestion.contains(SUGGESTION_DETAIL) {
            self.suggestion
                .replace(SUGGESTION_DETAIL, &describe_detail(detail))
        } else {
            self.suggestion.clone()
        }
    }

    fn failed(&self, detail: &str) -> Outcome {
        Outcome::fail(&self.id, detail, self.suggestion_text(detail))
    }

    fn check_file_exists(&self, snapshot: &Snapshot, candidates: &[String]) -> Outcome {
        let mut attempted = false;
        for candidate in candidates {
            match snapshot.entry(candidate) {
                Some(entry) if entry.exists => {
                    return Outcome::pass(&self.id, format!("found:{candidate}"));
                }
                Some(_) => attempted = true,
                None => {}
            }
        }
        if attempted {
            self.failed("missing_file")
        } else {
            Outcome::unknown(&self.id, "not_fetched")
        }
    }

    fn check_content_pattern(
        &self,
        snapshot: &Snapshot,
        candidates: &[String],
        marker: &str,
    ) -> Outcome {
        let mut attempted = false;
        for candidate in candidates {
            let Some(entry) = snapshot.entry(candidate) else {
                continue;
            };
            attempted = true;
            if !entry.exists {
                continue;
            }
            let text = entry.content.as_deref().or_else(|| {
                if is_readme_path(candidate) {
                    snapshot.readme_text.as_deref()
                } else {
                    None
                }
            });
            return match text {
                Some(text) if text.contains(marker) => Outcome::pass(&self.id, "marker_found"),
                Some(_) => self.failed("missing_marker"),
                None => Outcome::unknown(&self.id, "content_unavailable"),
            };
        }
        if attempted {
            self.failed("missing_file")
        } else {
            Outcome::unknown(&self.id, "not_fetched")
        }
    }

    fn check_config_keys(
        &self,
        snapshot: &Snapshot,
        path: &str,
        required_keys: &[String],
    ) -> Outcome {
        let Some(entry) = snapshot.entry(path) else {
            return Outcome::unknown(&self.id, "not_fetched");
        };
        if !entry.exists {
            return self.failed("missing_file");
        }
        let Some(content) = entry.content.as_deref() else {
            return Outcome::unknown(&self.id, "content_unavailable");
        };
        let parsed: serde_yaml::Value = match serde_yaml::from_str(content) {
            Ok(value) => value,
            Err(_) => return self.failed("invalid_format"),
        };
        if !parsed.is_mapping() {
            return self.failed("invalid_format");
        }
        for key in required_keys {
            let present = matches!(
                parsed.get(key.as_str()),
                Some(value) if !value.is_null()
            );
            if !present {
                return self.failed(&format!("missing_key:{key}"));
            }
        }
        Outcome::pass(&self.id, "valid")
    }

    fn check_metadata(
        &self,
        snapshot: &Snapshot,
        key: &str,
        expect: MetadataExpectation,
    ) -> Result<Outcome> {
        let Some(value) = snapshot.metadata.get(key) else {
            return Ok(Outcome::unknown(&self.id, "metadata_unavailable"));
        };
        let matched = match (expect, value) {
            (MetadataExpectation::NonEmptyText, MetadataValue::Text(text)) => {
                !text.trim().is_empty()
            }
            (MetadataExpectation::PositiveInt, MetadataValue::Int(count)) => *count > 0,
            _ => {
                return Err(GreenlightError::Rule(format!(
                    "metadata value for `{key}` has an unexpected type"
                )));
            }
        };
        Ok(if matched {
            Outcome::pass(&self.id, "matched")
        } else {
            self.failed("unmatched")
        })
    }

    fn check_template_dir(&self, snapshot: &Snapshot, dir: &str) -> Outcome {
        let mut attempted = false;
        for (path, entry) in snapshot.entries_under(dir) {
            attempted = true;
            if entry.exists && path.to_ascii_lowercase().ends_with(".md") {
                return Outcome::pass(&self.id, format!("found:{path}"));
            }
        }
        if attempted {
            self.failed("missing_template")
        } else {
            Outcome::unknown(&self.id, "not_fetched")
        }
    }
}

fn is_readme_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    name == "readme" || name.starts_with("readme.")
}

fn describe_detail(detail: &str) -> String {
    if let Some(key) = detail.strip_prefix("missing_key:") {
        return format!("the `{key}` key is missing");
    }
    match detail {
        "missing_file" => "the file is missing".to_string(),
        "invalid_format" => "the file does not parse".to_string(),
        "missing_marker" => "the expected marker was not found".to_string(),
        _ => detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Applicability, Category, CheckKind, MetadataExpectation, Rule, SUGGESTION_DETAIL, Severity,
        Status,
    };
    use crate::snapshot::{FileEntry, MetadataValue, Snapshot, TargetKind};

    fn file_rule(candidates: &[&str]) -> Rule {
        Rule {
            id: "readme".to_string(),
            category: Category::Files,
            severity: Severity::Required,
            applies_to: Applicability::Project,
            check: CheckKind::FileExists {
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            },
            suggestion: "Add a `README.md` file at the root of the repository.".to_string(),
        }
    }

    fn project_snapshot() -> Snapshot {
        Snapshot::new(TargetKind::Project, "group/project")
    }

    #[test]
    fn file_exists_fails_when_resolved_absent() {
        let mut snapshot = project_snapshot();
        snapshot
            .file_index
            .insert("README.md".to_string(), FileEntry::absent());

        let rule = file_rule(&["README.md", "README.rst"]);
        let outcome = rule.check(&snapshot).expect("check");

        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.detail, "missing_file");
        assert!(outcome.suggestion.as_deref().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn file_exists_unknown_when_never_attempted() {
        let snapshot = project_snapshot();
        let rule = file_rule(&["README.md", "README.rst"]);
        let outcome = rule.check(&snapshot).expect("check");

        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(outcome.detail, "not_fetched");
        assert!(outcome.suggestion.is_none());
    }

    #[test]
    fn file_exists_first_candidate_wins() {
        let mut snapshot = project_snapshot();
        snapshot
            .file_index
            .insert("README.md".to_string(), FileEntry::present());
        snapshot
            .file_index
            .insert("README.rst".to_string(), FileEntry::present());

        let rule = file_rule(&["README.md", "README.rst"]);
        let outcome = rule.check(&snapshot).expect("check");

        assert_eq!(outcome.status, Status::Pass);
        assert_eq!(outcome.detail, "found:README.md");
    }

    fn pattern_rule() -> Rule {
        Rule {
            id: "readme_title".to_string(),
            category: Category::Docs,
            severity: Severity::Recommended,
            applies_to: Applicability::Project,
            check: CheckKind::ContentPattern {
                candidates: vec!["README.md".to_string()],
                marker: "# ".to_string(),
            },
            suggestion: "Start the README with a top-level `#` heading.".to_string(),
        }
    }

    #[test]
    fn content_pattern_passes_on_marker() {
        let mut snapshot = project_snapshot();
        snapshot.file_index.insert(
            "README.md".to_string(),
            FileEntry::with_content("# Project\n\nUsage notes.\n"),
        );

        let outcome = pattern_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Pass);
        assert_eq!(outcome.detail, "marker_found");
    }

    #[test]
    fn content_pattern_unknown_when_content_missing() {
        let mut snapshot = project_snapshot();
        snapshot
            .file_index
            .insert("README.md".to_string(), FileEntry::present());

        let outcome = pattern_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(outcome.detail, "content_unavailable");
    }

    #[test]
    fn content_pattern_falls_back_to_readme_text() {
        let mut snapshot = project_snapshot();
        snapshot
            .file_index
            .insert("README.md".to_string(), FileEntry::present());
        snapshot.readme_text = Some("# Title\n".to_string());

        let outcome = pattern_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Pass);
    }

    #[test]
    fn content_pattern_fails_without_marker() {
        let mut snapshot = project_snapshot();
        snapshot.file_index.insert(
            "README.md".to_string(),
            FileEntry::with_content("plain text, no heading"),
        );

        let outcome = pattern_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.detail, "missing_marker");
    }

    fn ci_rule() -> Rule {
        Rule {
            id: "ci_config".to_string(),
            category: Category::Config,
            severity: Severity::Recommended,
            applies_to: Applicability::Project,
            check: CheckKind::ConfigKeys {
                path: ".gitlab-ci.yml".to_string(),
                required_keys: vec!["stages".to_string()],
            },
            suggestion: "Fix `.gitlab-ci.yml` so pipelines can run: {{DETAIL}}.".to_string(),
        }
    }

    #[test]
    fn config_keys_rejects_malformed_yaml() {
        let mut snapshot = project_snapshot();
        snapshot.file_index.insert(
            ".gitlab-ci.yml".to_string(),
            FileEntry::with_content("stages: [build\n  - test"),
        );

        let outcome = ci_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.detail, "invalid_format");
    }

    #[test]
    fn config_keys_reports_missing_key() {
        let mut snapshot = project_snapshot();
        snapshot.file_index.insert(
            ".gitlab-ci.yml".to_string(),
            FileEntry::with_content("build:\n  script: cargo build\n"),
        );

        let outcome = ci_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.detail, "missing_key:stages");
        assert_eq!(
            outcome.suggestion.as_deref(),
            Some("Fix `.gitlab-ci.yml` so pipelines can run: the `stages` key is missing.")
        );
    }

    #[test]
    fn config_keys_passes_with_required_keys() {
        let mut snapshot = project_snapshot();
        snapshot.file_index.insert(
            ".gitlab-ci.yml".to_string(),
            FileEntry::with_content("stages:\n  - build\n  - test\n"),
        );

        let outcome = ci_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Pass);
        assert_eq!(outcome.detail, "valid");
    }

    #[test]
    fn config_keys_unknown_when_content_unavailable() {
        let mut snapshot = project_snapshot();
        snapshot
            .file_index
            .insert(".gitlab-ci.yml".to_string(), FileEntry::present());

        let outcome = ci_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(outcome.detail, "content_unavailable");
    }

    fn metadata_rule(key: &str, expect: MetadataExpectation) -> Rule {
        Rule {
            id: "tags".to_string(),
            category: Category::Metadata,
            severity: Severity::Optional,
            applies_to: Applicability::Project,
            check: CheckKind::MetadataPredicate {
                key: key.to_string(),
                expect,
            },
            suggestion: "Tag your project releases.".to_string(),
        }
    }

    #[test]
    fn metadata_unknown_when_key_absent() {
        let snapshot = project_snapshot();
        let rule = metadata_rule("tag_count", MetadataExpectation::PositiveInt);
        let outcome = rule.check(&snapshot).expect("check");

        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(outcome.detail, "metadata_unavailable");
    }

    #[test]
    fn metadata_positive_int_checks_value() {
        let mut snapshot = project_snapshot();
        snapshot
            .metadata
            .insert("tag_count".to_string(), MetadataValue::Int(0));
        let rule = metadata_rule("tag_count", MetadataExpectation::PositiveInt);
        assert_eq!(rule.check(&snapshot).expect("check").status, Status::Fail);

        snapshot
            .metadata
            .insert("tag_count".to_string(), MetadataValue::Int(4));
        assert_eq!(rule.check(&snapshot).expect("check").status, Status::Pass);
    }

    #[test]
    fn metadata_type_mismatch_is_a_fault() {
        let mut snapshot = project_snapshot();
        snapshot.metadata.insert(
            "tag_count".to_string(),
            MetadataValue::Text("three".to_string()),
        );
        let rule = metadata_rule("tag_count", MetadataExpectation::PositiveInt);

        assert!(rule.check(&snapshot).is_err());
    }

    fn template_rule() -> Rule {
        Rule {
            id: "issue_templates".to_string(),
            category: Category::Files,
            severity: Severity::Recommended,
            applies_to: Applicability::Project,
            check: CheckKind::TemplateDir {
                dir: ".github/ISSUE_TEMPLATE".to_string(),
            },
            suggestion: "Add issue templates under `.github/ISSUE_TEMPLATE/`.".to_string(),
        }
    }

    #[test]
    fn template_dir_passes_on_markdown_file() {
        let mut snapshot = project_snapshot();
        snapshot.file_index.insert(
            ".github/ISSUE_TEMPLATE/bug_report.md".to_string(),
            FileEntry::present(),
        );

        let outcome = template_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Pass);
        assert_eq!(outcome.detail, "found:.github/ISSUE_TEMPLATE/bug_report.md");
    }

    #[test]
    fn template_dir_fails_when_directory_resolved_absent() {
        let mut snapshot = project_snapshot();
        snapshot
            .file_index
            .insert(".github/ISSUE_TEMPLATE".to_string(), FileEntry::absent());

        let outcome = template_rule().check(&snapshot).expect("check");
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.detail, "missing_template");
    }

    #[test]
    fn template_dir_unknown_when_never_listed() {
        let snapshot = project_snapshot();
        let outcome = template_rule().check(&snapshot).expect("check");

        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(outcome.detail, "not_fetched");
    }

    #[test]
    fn suggestion_template_interpolates_detail_placeholder() {
        let rule = ci_rule();
        assert!(rule.suggestion.contains(SUGGESTION_DETAIL));
        assert_eq!(
            rule.suggestion_text("invalid_format"),
            "Fix `.gitlab-ci.yml` so pipelines can run: the file does not parse."
        );
        // Templates without the placeholder pass through untouched.
        let plain = template_rule();
        assert_eq!(plain.suggestion_text("missing_template"), plain.suggestion);
    }

    #[test]
    fn severity_weights_are_ordered() {
        assert_eq!(Severity::Required.weight(), 3);
        assert_eq!(Severity::Recommended.weight(), 2);
        assert_eq!(Severity::Optional.weight(), 1);
    }

    #[test]
    fn applicability_covers_matching_kinds() {
        assert!(Applicability::Project.covers(TargetKind::Project));
        assert!(!Applicability::Project.covers(TargetKind::UserProfile));
        assert!(Applicability::Any.covers(TargetKind::UserProfile));
    }
}
