//! Final grade calculation and pass/fail classification for one enrollment.

use serde::{Deserialize, Serialize};

use crate::models::Evaluation;

/// Minimum final grade, inclusive, for a course to count as passed.
pub const PASSING_GRADE: f64 = 61.0;

/// Weighted final grade over the evaluations that carry a score.
///
/// Unscored evaluations are left out of both sums, so a partially graded
/// course is renormalized to a 0-100 scale instead of being penalized for the
/// pending weight. Returns `None` when nothing is gradable yet.
pub fn compute_final_grade(evaluations: &[Evaluation]) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for evaluation in evaluations {
        let (Some(score), Some(weight)) = (evaluation.score, evaluation.weight) else {
            continue;
        };
        weighted_sum += score * weight / 100.0;
        weight_total += weight;
    }

    if weight_total == 0.0 {
        return None;
    }

    let grade = (weighted_sum * 100.0) / weight_total;
    grade.is_finite().then(|| round_half_up(grade, 2))
}

/// Rounds half away from zero at `decimals` places.
///
/// The value is first snapped to six extra places so that binary noise
/// (85.555 stored as 85.55499999...) does not push a midpoint down.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    let snapped = (value * factor * 1e6).round() / 1e6;
    snapped.round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Ungraded,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Neutral,
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub status: ApprovalStatus,
    pub label: String,
    pub passed: bool,
    pub severity: Severity,
}

pub fn classify_approval(final_grade: Option<f64>) -> ApprovalOutcome {
    let (status, label, severity) = match final_grade {
        None => (ApprovalStatus::Ungraded, "Ungraded", Severity::Neutral),
        Some(grade) if grade >= PASSING_GRADE => {
            (ApprovalStatus::Passed, "Passed", Severity::Positive)
        }
        Some(_) => (ApprovalStatus::Failed, "Failed", Severity::Negative),
    };

    ApprovalOutcome {
        status,
        label: label.to_string(),
        passed: status == ApprovalStatus::Passed,
        severity,
    }
}
