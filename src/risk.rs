use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::TermKey;
use crate::semester::SemesterSummary;

/// Institution-tunable limits for the per-semester checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionThresholds {
    /// Credits below which a semester counts as a low academic load.
    pub min_credit_load: u32,
    /// Passed/enrolled ratio below which a semester is flagged.
    pub min_pass_rate: f64,
}

impl Default for ProgressionThresholds {
    fn default() -> Self {
        Self {
            min_credit_load: 12,
            min_pass_rate: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    LowLoad,
    Failures,
    LowPassRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionAlert {
    pub term: TermKey,
    pub category: AlertCategory,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressionTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ProgressionTier {
    pub fn from_alert_count(alert_count: usize) -> Self {
        match alert_count {
            0 => ProgressionTier::Excellent,
            1..=2 => ProgressionTier::Good,
            3..=4 => ProgressionTier::Fair,
            _ => ProgressionTier::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressionTier::Excellent => "Excellent",
            ProgressionTier::Good => "Good",
            ProgressionTier::Fair => "Fair",
            ProgressionTier::Poor => "Poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionAssessment {
    pub tier: ProgressionTier,
    pub alerts: Vec<ProgressionAlert>,
    pub recommendations: Vec<String>,
    pub needs_attention: bool,
    pub alert_count: usize,
    pub semesters_with_failures: usize,
    pub semesters_evaluated: usize,
}

pub fn evaluate_progression(
    semesters: &[SemesterSummary],
    thresholds: &ProgressionThresholds,
) -> ProgressionAssessment {
    let mut alerts = Vec::new();
    let mut semesters_with_failures = 0usize;

    for semester in semesters {
        if semester.total_credits < thresholds.min_credit_load {
            alerts.push(ProgressionAlert {
                term: semester.key(),
                category: AlertCategory::LowLoad,
                message: format!(
                    "{}: low academic load ({} credits)",
                    semester.label, semester.total_credits
                ),
            });
        }

        if semester.failed_courses > 0 {
            semesters_with_failures += 1;
            alerts.push(ProgressionAlert {
                term: semester.key(),
                category: AlertCategory::Failures,
                message: format!(
                    "{}: {} course(s) failed",
                    semester.label, semester.failed_courses
                ),
            });
        }

        if let Some(rate) = semester.pass_rate() {
            if rate < thresholds.min_pass_rate {
                alerts.push(ProgressionAlert {
                    term: semester.key(),
                    category: AlertCategory::LowPassRate,
                    message: format!(
                        "{}: low approval percentage ({:.1}%)",
                        semester.label,
                        rate * 100.0
                    ),
                });
            }
        }
    }

    let alert_count = alerts.len();
    let tier = ProgressionTier::from_alert_count(alert_count);
    debug!(alert_count, semesters_with_failures, ?tier, "evaluated progression");

    ProgressionAssessment {
        tier,
        recommendations: recommendations_for(&alerts, thresholds),
        needs_attention: alert_count > 2,
        alert_count,
        semesters_with_failures,
        semesters_evaluated: semesters.len(),
        alerts,
    }
}

fn recommendations_for(
    alerts: &[ProgressionAlert],
    thresholds: &ProgressionThresholds,
) -> Vec<String> {
    if alerts.is_empty() {
        return vec![
            "Keep up the current study habits and course load".to_string(),
            "Consider electives or advanced courses that build on your strengths".to_string(),
        ];
    }

    let fired = |category: AlertCategory| alerts.iter().any(|alert| alert.category == category);
    let mut recommendations = Vec::new();

    if fired(AlertCategory::Failures) {
        recommendations.push("Retake failed courses in the next available term".to_string());
        recommendations.push("Seek tutoring for the subjects with failing grades".to_string());
    }
    if fired(AlertCategory::LowLoad) {
        recommendations.push(format!(
            "Increase the course load to at least {} credits per semester",
            thresholds.min_credit_load
        ));
    }
    if fired(AlertCategory::LowPassRate) {
        recommendations.push("Review study methods and time management".to_string());
        recommendations.push("Request psycho-pedagogical support from student services".to_string());
    }

    recommendations
}
