//! Report aggregation and rendering.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::rule::{Category, Outcome, Severity, Status};

/// Pass/evaluable counts for one category.
///
/// `evaluable` excludes skipped and unknown outcomes, so a category where
/// nothing could be decided scores as undefined rather than zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Rules that passed.
    pub passed: usize,
    /// Rules that passed or failed.
    pub evaluable: usize,
}

impl CategoryScore {
    /// Pass ratio, undefined when nothing was evaluable.
    pub fn ratio(&self) -> Option<f64> {
        if self.evaluable == 0 {
            None
        } else {
            Some(self.passed as f64 / self.evaluable as f64)
        }
    }
}

/// One remediation entry for a failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Rule the suggestion belongs to.
    pub rule_id: String,
    /// Severity of the failed rule.
    pub severity: Severity,
    /// Remediation text.
    pub text: String,
}

/// Aggregated, scored result of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Per-rule outcomes in catalog order.
    pub outcomes: Vec<Outcome>,
    /// Pass/evaluable counts per category.
    pub category_scores: BTreeMap<Category, CategoryScore>,
    /// Severity-weighted pass ratio over evaluable rules, when any exist.
    pub overall_score: Option<f64>,
    /// Suggestions for failed rules, severity-descending then catalog order.
    pub suggestions: Vec<Suggestion>,
}

/// Fold an outcome sequence into category scores, the overall score, and the
/// ordered suggestion list.
///
/// Pure and deterministic: the same catalog and outcome sequence always yield
/// the same report. Outcomes whose rule id is not in the catalog stay in the
/// outcome list but cannot be weighted, so they are left out of the scores.
pub fn aggregate(catalog: &Catalog, outcomes: Vec<Outcome>) -> Report {
    let mut category_scores: BTreeMap<Category, CategoryScore> = BTreeMap::new();
    let mut passed_weight = 0u32;
    let mut evaluable_weight = 0u32;
    let mut failures: Vec<(usize, Suggestion)> = Vec::new();

    for (index, outcome) in outcomes.iter().enumerate() {
        let Some(rule) = catalog.rule(&outcome.rule_id) else {
            log::warn!("outcome for unknown rule {} left unscored", outcome.rule_id);
            continue;
        };
        let score = category_scores.entry(rule.category).or_default();
        match outcome.status {
            Status::Pass => {
                score.passed += 1;
                score.evaluable += 1;
                passed_weight += rule.severity.weight();
                evaluable_weight += rule.severity.weight();
            }
            Status::Fail => {
                score.evaluable += 1;
                evaluable_weight += rule.severity.weight();
                if let Some(text) = &outcome.suggestion {
                    failures.push((
                        index,
                        Suggestion {
                            rule_id: outcome.rule_id.clone(),
                            severity: rule.severity,
                            text: text.clone(),
                        },
                    ));
                }
            }
            Status::Skipped | Status::Unknown => {}
        }
    }

    failures.sort_by_key(|(index, suggestion)| (Reverse(suggestion.severity.weight()), *index));
    let suggestions = failures
        .into_iter()
        .map(|(_, suggestion)| suggestion)
        .collect();
    let overall_score = if evaluable_weight == 0 {
        None
    } else {
        Some(f64::from(passed_weight) / f64::from(evaluable_weight))
    };

    Report {
        outcomes,
        category_scores,
        overall_score,
        suggestions,
    }
}

/// Format an optional score as a percentage.
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{:.1}%", value * 100.0),
        None => "not evaluable".to_string(),
    }
}

/// Render a report as Markdown sections.
pub fn render_markdown(report: &Report) -> String {
    let mut output = String::new();
    append_outcomes(&mut output, &report.outcomes);
    append_scores(&mut output, report);
    append_suggestions(&mut output, &report.suggestions);
    output
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

fn append_outcomes(output: &mut String, outcomes: &[Outcome]) {
    if outcomes.is_empty() {
        let _ = writeln!(output, "### Outcomes\nNo rules evaluated.\n");
        return;
    }
    let _ = writeln!(output, "### Outcomes");
    for outcome in outcomes {
        let _ = writeln!(
            output,
            "- {} `{}` ({})",
            outcome.status.label(),
            outcome.rule_id,
            outcome.detail
        );
    }
    let _ = writeln!(output);
}

fn append_scores(output: &mut String, report: &Report) {
    let _ = writeln!(output, "### Scores");
    for (category, score) in &report.category_scores {
        match score.ratio() {
            Some(ratio) => {
                let _ = writeln!(
                    output,
                    "- {}: {}/{} ({})",
                    category.label(),
                    score.passed,
                    score.evaluable,
                    format_score(Some(ratio))
                );
            }
            None => {
                let _ = writeln!(output, "- {}: no evaluable rules", category.label());
            }
        }
    }
    let _ = writeln!(output, "- overall: {}", format_score(report.overall_score));
    let _ = writeln!(output);
}

fn append_suggestions(output: &mut String, suggestions: &[Suggestion]) {
    if suggestions.is_empty() {
        let _ = writeln!(output, "### Suggestions\nNothing to fix.\n");
        return;
    }
    let _ = writeln!(output, "### Suggestions");
    for suggestion in suggestions {
        let _ = writeln!(
            output,
            "- [{}] `{}`: {}",
            suggestion.severity.label(),
            suggestion.rule_id,
            suggestion.text
        );
    }
    let _ = writeln!(output);
}
