//! Built-in rule catalog and fail-fast rule-set validation.

use std::collections::BTreeSet;

use crate::error::{GreenlightError, Result};
use crate::rule::{Applicability, Category, CheckKind, MetadataExpectation, Rule, Severity};
use crate::snapshot::TargetKind;

/// Ordered, immutable set of rules.
///
/// Rule order is declaration order and is part of the reporting contract:
/// outcomes and suggestion tie-breaking follow it.
#[derive(Debug, Clone)]
pub struct Catalog {
    rules: Vec<Rule>,
}

impl Catalog {
    /// Validate a rule set and build a catalog from it.
    ///
    /// A malformed rule fails construction immediately; evaluation never sees
    /// a partially valid catalog.
    pub fn from_rules(rules: Vec<Rule>) -> Result<Self> {
        validate(&rules)?;
        Ok(Self { rules })
    }

    /// Load a catalog from a declarative YAML rule set.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let rules: Vec<Rule> = serde_yaml::from_str(source)
            .map_err(|err| GreenlightError::Catalog(format!("rule set does not parse: {err}")))?;
        Self::from_rules(rules)
    }

    /// All rules in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Number of rules in the catalog.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the catalog holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by id.
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Rules applicable to a target kind, in declaration order.
    pub fn rules_for(&self, kind: TargetKind) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to.covers(kind))
            .collect()
    }

    /// Paths a snapshot provider should attempt to resolve for a target kind.
    ///
    /// A path needed by any content-bearing check lands under `contents`, even
    /// when an existence check also names it.
    pub fn paths_of_interest(&self, kind: TargetKind) -> PathInterests {
        let mut interests = PathInterests::default();
        for rule in self.rules_for(kind) {
            match &rule.check {
                CheckKind::FileExists { candidates } => {
                    push_unique(&mut interests.files, candidates);
                }
                CheckKind::ContentPattern { candidates, .. } => {
                    push_unique(&mut interests.contents, candidates);
                }
                CheckKind::ConfigKeys { path, .. } => {
                    push_unique(&mut interests.contents, std::slice::from_ref(path));
                }
                CheckKind::TemplateDir { dir } => {
                    push_unique(&mut interests.template_dirs, std::slice::from_ref(dir));
                }
                CheckKind::MetadataPredicate { .. } => {}
            }
        }
        let contents = interests.contents.clone();
        interests.files.retain(|path| !contents.contains(path));
        interests
    }
}

/// Paths a snapshot provider should attempt to resolve.
///
/// A path listed under `files` only needs an existence verdict; a path under
/// `contents` additionally needs its text fetched; each directory under
/// `template_dirs` needs a listing of its markdown files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathInterests {
    /// Paths whose existence alone decides a rule.
    pub files: Vec<String>,
    /// Paths whose contents are needed.
    pub contents: Vec<String>,
    /// Directories scanned for markdown templates.
    pub template_dirs: Vec<String>,
}

/// Build the built-in compliance catalog.
pub fn build_catalog() -> Result<Catalog> {
    Catalog::from_rules(builtin_rules())
}

fn rule(
    id: &str,
    category: Category,
    severity: Severity,
    applies_to: Applicability,
    check: CheckKind,
    suggestion: &str,
) -> Rule {
    Rule {
        id: id.to_string(),
        category,
        severity,
        applies_to,
        check,
        suggestion: suggestion.to_string(),
    }
}

fn file_exists(candidates: &[&str]) -> CheckKind {
    CheckKind::FileExists {
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
    }
}

fn builtin_rules() -> Vec<Rule> {
    vec![
        rule(
            "readme",
            Category::Files,
            Severity::Required,
            Applicability::Project,
            file_exists(&["README.md", "README.rst", "README"]),
            "Add a `README.md` file at the root of the repository with setup and usage instructions.",
        ),
        rule(
            "license",
            Category::Files,
            Severity::Required,
            Applicability::Project,
            file_exists(&["LICENSE", "LICENSE.md", "LICENSE.txt"]),
            "Include a `LICENSE` file to define the legal usage of your project.",
        ),
        rule(
            "contributing",
            Category::Files,
            Severity::Recommended,
            Applicability::Project,
            file_exists(&["CONTRIBUTING.md"]),
            "Add a `CONTRIBUTING.md` file to guide collaborators on how to contribute to the project.",
        ),
        rule(
            "changelog",
            Category::Files,
            Severity::Recommended,
            Applicability::Project,
            file_exists(&["CHANGELOG", "CHANGELOG.md", "CHANGELOG.txt"]),
            "Maintain a `CHANGELOG.md` file to record changes across versions for better transparency.",
        ),
        rule(
            "issue_templates",
            Category::Files,
            Severity::Recommended,
            Applicability::Project,
            CheckKind::TemplateDir {
                dir: ".github/ISSUE_TEMPLATE".to_string(),
            },
            "Add issue templates under the `.github/ISSUE_TEMPLATE/` folder as `.md` files (e.g., `issue_template.md`).",
        ),
        rule(
            "merge_request_templates",
            Category::Files,
            Severity::Recommended,
            Applicability::Project,
            CheckKind::TemplateDir {
                dir: ".github/PULL_REQUEST_TEMPLATE".to_string(),
            },
            "Add merge request templates under the `.github/PULL_REQUEST_TEMPLATE/` folder as `.md` files (e.g., `merge_request.md`).",
        ),
        rule(
            "ci_config",
            Category::Config,
            Severity::Recommended,
            Applicability::Project,
            CheckKind::ConfigKeys {
                path: ".gitlab-ci.yml".to_string(),
                required_keys: vec!["stages".to_string()],
            },
            "Fix `.gitlab-ci.yml` so pipelines can run: {{DETAIL}}.",
        ),
        rule(
            "readme_title",
            Category::Docs,
            Severity::Recommended,
            Applicability::Project,
            CheckKind::ContentPattern {
                candidates: vec!["README.md".to_string()],
                marker: "# ".to_string(),
            },
            "Start the README with a top-level `# Title` heading so the project page has a name.",
        ),
        rule(
            "description",
            Category::Metadata,
            Severity::Recommended,
            Applicability::Project,
            CheckKind::MetadataPredicate {
                key: "description".to_string(),
                expect: MetadataExpectation::NonEmptyText,
            },
            "Provide a meaningful project description in GitLab settings.",
        ),
        rule(
            "tags",
            Category::Metadata,
            Severity::Optional,
            Applicability::Project,
            CheckKind::MetadataPredicate {
                key: "tag_count".to_string(),
                expect: MetadataExpectation::PositiveInt,
            },
            "Tag your project releases for version control and clarity.",
        ),
        rule(
            "profile_readme",
            Category::Files,
            Severity::Required,
            Applicability::UserProfile,
            file_exists(&["README.md"]),
            "Create a project with the exact same name as your username and add a `README.md` in it; it will appear on your GitLab profile page.",
        ),
        rule(
            "profile_readme_title",
            Category::Docs,
            Severity::Recommended,
            Applicability::UserProfile,
            CheckKind::ContentPattern {
                candidates: vec!["README.md".to_string()],
                marker: "# ".to_string(),
            },
            "Start your profile README with a top-level `# Title` heading.",
        ),
    ]
}

fn validate(rules: &[Rule]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for rule in rules {
        if rule.id.trim().is_empty() {
            return Err(GreenlightError::Catalog("a rule is missing an id".to_string()));
        }
        if !seen.insert(rule.id.as_str()) {
            return Err(GreenlightError::Catalog(format!(
                "duplicate rule id: {}",
                rule.id
            )));
        }
        if rule.suggestion.trim().is_empty() {
            return Err(malformed(&rule.id, "empty suggestion template"));
        }
        match &rule.check {
            CheckKind::FileExists { candidates } => {
                validate_paths(&rule.id, candidates, "candidate paths")?;
            }
            CheckKind::ContentPattern { candidates, marker } => {
                validate_paths(&rule.id, candidates, "candidate paths")?;
                if marker.is_empty() {
                    return Err(malformed(&rule.id, "empty content marker"));
                }
            }
            CheckKind::ConfigKeys {
                path,
                required_keys,
            } => {
                if path.trim().is_empty() {
                    return Err(malformed(&rule.id, "empty config path"));
                }
                validate_paths(&rule.id, required_keys, "required keys")?;
            }
            CheckKind::MetadataPredicate { key, .. } => {
                if key.trim().is_empty() {
                    return Err(malformed(&rule.id, "empty metadata key"));
                }
            }
            CheckKind::TemplateDir { dir } => {
                if dir.trim().is_empty() {
                    return Err(malformed(&rule.id, "empty template directory"));
                }
            }
        }
    }
    Ok(())
}

fn push_unique(list: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !list.contains(value) {
            list.push(value.clone());
        }
    }
}

fn validate_paths(rule_id: &str, values: &[String], what: &str) -> Result<()> {
    if values.is_empty() || values.iter().any(|value| value.trim().is_empty()) {
        return Err(malformed(rule_id, &format!("missing {what}")));
    }
    Ok(())
}

fn malformed(rule_id: &str, message: &str) -> GreenlightError {
    GreenlightError::Catalog(format!("rule {rule_id}: {message}"))
}
