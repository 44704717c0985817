//! Evaluation loops behind the CLI commands.
//!
//! Each resource change is routed to the comparer of its category. Failures
//! are collected per resource; one failing change never stops the others
//! from being reported.

use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::{ComparerSet, Styler};
use crate::plan::{ChangeCategory, ResourceChangeView};

/// Verdict for one resource change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The change is acceptable.
    Pass,
    /// The change violates the ruleset.
    Fail,
    /// No ruleset section covers the change's category.
    Unmatched,
}

/// The result of judging one resource change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOutcome {
    /// Resource address.
    pub address: String,
    /// Change category, if the change has one.
    pub category: Option<ChangeCategory>,
    /// Verdict.
    pub status: OutcomeStatus,
    /// Rendered verdict.
    pub diff: String,
}

impl ResourceOutcome {
    /// Returns true unless the change failed or was unmatched.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == OutcomeStatus::Pass
    }
}

/// Outcomes of a `diff` run, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    /// Per-resource outcomes.
    pub outcomes: Vec<ResourceOutcome>,
}

impl EvaluationReport {
    /// Returns true if every reported change passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(ResourceOutcome::passed)
    }

    /// Counts outcomes with the given status.
    #[must_use]
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Counts outcomes with the given status in one category.
    #[must_use]
    pub fn count_in(&self, category: ChangeCategory, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.category == Some(category) && o.status == status)
            .count()
    }
}

/// Returns true if every change passes, stopping at the first failure.
///
/// No-op changes are skipped; a change whose category has no section fails
/// only when `strict` is set.
#[must_use]
pub fn run_compare(changes: &[ResourceChangeView], comparers: &ComparerSet, strict: bool) -> bool {
    for change in changes.iter().filter(|c| !c.is_no_op()) {
        let passed = comparers
            .for_change(change)
            .map_or(!strict, |comparer| comparer.compare(change));

        if !passed {
            debug!("{} failed comparison", change.address);
            return false;
        }
    }
    true
}

/// Judges every change and renders its verdict.
///
/// Changes whose category has no section are reported only when `strict`
/// is set.
#[must_use]
pub fn run_diff(
    changes: &[ResourceChangeView],
    comparers: &ComparerSet,
    styler: &Styler,
    strict: bool,
) -> EvaluationReport {
    let mut report = EvaluationReport::default();

    for change in changes {
        let Some(category) = change.category() else {
            debug!("Skipping {}: no changes", change.address);
            continue;
        };

        let outcome = match comparers.for_category(category) {
            Some(comparer) => {
                let (diff, passed) = comparer.diff(change, styler);
                ResourceOutcome {
                    address: change.address.clone(),
                    category: Some(category),
                    status: if passed { OutcomeStatus::Pass } else { OutcomeStatus::Fail },
                    diff,
                }
            }
            None if strict => {
                warn!("No comparer for {category} change {}", change.address);
                ResourceOutcome {
                    address: change.address.clone(),
                    category: Some(category),
                    status: OutcomeStatus::Unmatched,
                    diff: format!("{} {} (no matching comparer)", styler.unknown_glyph(), change.address),
                }
            }
            None => continue,
        };
        report.outcomes.push(outcome);
    }

    report
}

/// Returns the addresses of changes that pass, or that fail when `invert`
/// is set. A change whose category has no section never passes.
#[must_use]
pub fn run_match(changes: &[ResourceChangeView], comparers: &ComparerSet, invert: bool) -> Vec<String> {
    changes
        .iter()
        .filter(|c| !c.is_no_op())
        .filter(|change| {
            let matched = comparers
                .for_change(change)
                .is_some_and(|comparer| comparer.compare(change));
            matched != invert
        })
        .map(|change| change.address.clone())
        .collect()
}
