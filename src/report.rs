use std::fmt::Write;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::grading::{ApprovalStatus, PASSING_GRADE};
use crate::models::{Evaluation, StudentInfo};
use crate::risk::ProgressionAssessment;
use crate::semester::{self, CourseOutcome, SemesterSummary};

/// What a report covers: one term, or the whole enrollment history.
#[derive(Debug, Clone, Copy)]
pub enum ReportScope<'a> {
    Semester(&'a SemesterSummary),
    Progression {
        semesters: &'a [SemesterSummary],
        assessment: &'a ProgressionAssessment,
    },
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub include_details: bool,
    pub include_charts: bool,
    pub generated_on: NaiveDate,
}

impl ReportOptions {
    pub fn new(include_details: bool) -> Self {
        Self {
            include_details,
            include_charts: false,
            generated_on: Utc::now().date_naive(),
        }
    }

    pub fn with_charts(mut self, include_charts: bool) -> Self {
        self.include_charts = include_charts;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
    pub header: ReportHeader,
    pub course_table: Vec<CourseRow>,
    pub summary: Vec<SummaryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_details: Option<Vec<CourseEvaluationDetail>>,
    pub observations: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<ChartData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportHeader {
    pub title: String,
    pub student_id: Uuid,
    pub student_name: String,
    pub period: String,
    pub generated_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseRow {
    pub term: String,
    pub code: String,
    pub name: String,
    pub credits: u32,
    pub enrollment_status: String,
    pub final_grade: Option<f64>,
    pub approval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseEvaluationDetail {
    pub term: String,
    pub code: String,
    pub name: String,
    pub final_grade: Option<f64>,
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub grade_distribution: ChartSeries,
    pub approval_counts: ChartSeries,
}

/// Textual performance band for an average grade.
pub fn performance_label(average: Option<f64>) -> &'static str {
    match average {
        None => "Not available",
        Some(avg) if avg >= 90.0 => "Excellent",
        Some(avg) if avg >= 80.0 => "Very Good",
        Some(avg) if avg >= 70.0 => "Good",
        Some(avg) if avg >= PASSING_GRADE => "Satisfactory",
        Some(_) => "Unsatisfactory",
    }
}

fn format_grade(grade: Option<f64>) -> String {
    grade.map_or_else(|| "-".to_string(), |value| format!("{value:.2}"))
}

fn entry(label: &str, value: impl ToString) -> SummaryEntry {
    SummaryEntry {
        label: label.to_string(),
        value: value.to_string(),
    }
}

pub fn assemble_report_data(
    student: &StudentInfo,
    scope: ReportScope<'_>,
    options: &ReportOptions,
) -> ReportData {
    let semesters: &[SemesterSummary] = match scope {
        ReportScope::Semester(summary) => std::slice::from_ref(summary),
        ReportScope::Progression { semesters, .. } => semesters,
    };

    let (title, period) = match scope {
        ReportScope::Semester(summary) => ("Semester Grade Report", summary.label.clone()),
        ReportScope::Progression { semesters, .. } => {
            ("Academic Progress Report", history_period(semesters))
        }
    };

    let (summary, observations, recommendations) = match scope {
        ReportScope::Semester(summary) => (
            semester_summary_entries(summary),
            semester_observations(summary),
            Vec::new(),
        ),
        ReportScope::Progression {
            semesters,
            assessment,
        } => (
            progression_summary_entries(semesters, assessment),
            progression_observations(semesters, assessment),
            assessment.recommendations.clone(),
        ),
    };

    ReportData {
        header: ReportHeader {
            title: title.to_string(),
            student_id: student.id,
            student_name: student.full_name(),
            period,
            generated_on: options.generated_on,
        },
        course_table: course_rows(semesters),
        summary,
        evaluation_details: options.include_details.then(|| evaluation_details(semesters)),
        observations,
        recommendations,
        charts: options.include_charts.then(|| chart_data(semesters)),
    }
}

fn history_period(semesters: &[SemesterSummary]) -> String {
    match (semesters.first(), semesters.last()) {
        (Some(first), Some(last)) if first.key() == last.key() => first.label.clone(),
        (Some(first), Some(last)) => format!("{} - {}", first.label, last.label),
        _ => "No enrolled terms".to_string(),
    }
}

fn courses_with_terms(
    semesters: &[SemesterSummary],
) -> impl Iterator<Item = (&SemesterSummary, &CourseOutcome)> {
    semesters
        .iter()
        .flat_map(|semester| semester.courses.iter().map(move |course| (semester, course)))
}

fn course_rows(semesters: &[SemesterSummary]) -> Vec<CourseRow> {
    courses_with_terms(semesters)
        .map(|(semester, outcome)| CourseRow {
            term: semester.label.clone(),
            code: outcome.course.code.clone(),
            name: outcome.course.name.clone(),
            credits: outcome.course.credits,
            enrollment_status: outcome.status.to_string(),
            final_grade: outcome.final_grade,
            approval: outcome.approval.label.clone(),
        })
        .collect()
}

fn evaluation_details(semesters: &[SemesterSummary]) -> Vec<CourseEvaluationDetail> {
    courses_with_terms(semesters)
        .map(|(semester, outcome)| CourseEvaluationDetail {
            term: semester.label.clone(),
            code: outcome.course.code.clone(),
            name: outcome.course.name.clone(),
            final_grade: outcome.final_grade,
            evaluations: outcome.evaluations.clone(),
        })
        .collect()
}

fn semester_summary_entries(summary: &SemesterSummary) -> Vec<SummaryEntry> {
    vec![
        entry("Total courses", summary.total_courses),
        entry("Graded courses", summary.graded_courses),
        entry("Passed courses", summary.passed_courses),
        entry("Failed courses", summary.failed_courses),
        entry("Pending courses", summary.pending_courses()),
        entry("Total credits", summary.total_credits),
        entry("Passed credits", summary.passed_credits),
        entry("Weighted average", format_grade(summary.weighted_average)),
        entry("Performance", performance_label(summary.weighted_average)),
    ]
}

fn progression_summary_entries(
    semesters: &[SemesterSummary],
    assessment: &ProgressionAssessment,
) -> Vec<SummaryEntry> {
    let total_courses: usize = semesters.iter().map(|s| s.total_courses).sum();
    let total_credits: u32 = semesters.iter().map(|s| s.total_credits).sum();
    let passed_credits: u32 = semesters.iter().map(|s| s.passed_credits).sum();
    let average = semester::cumulative_average(semesters);

    vec![
        entry("Semesters", semesters.len()),
        entry("Total courses", total_courses),
        entry("Total credits", total_credits),
        entry("Passed credits", passed_credits),
        entry("Cumulative average", format_grade(average)),
        entry("Performance", performance_label(average)),
        entry("Progression tier", assessment.tier.label()),
        entry("Alerts", assessment.alert_count),
        entry(
            "Needs attention",
            if assessment.needs_attention { "Yes" } else { "No" },
        ),
    ]
}

fn semester_observations(summary: &SemesterSummary) -> Vec<String> {
    let mut observations = Vec::new();

    match summary.weighted_average {
        Some(average) => observations.push(format!(
            "Semester average of {average:.2} ({})",
            performance_label(Some(average))
        )),
        None => observations.push("No graded courses yet this semester".to_string()),
    }

    if summary.failed_courses > 0 {
        observations.push(format!(
            "{} course(s) failed this semester",
            summary.failed_courses
        ));
    } else if summary.graded_courses > 0 {
        observations.push("All graded courses were passed".to_string());
    }

    if summary.pending_courses() > 0 {
        observations.push(format!(
            "{} course(s) still pending grading",
            summary.pending_courses()
        ));
    }

    observations
}

fn progression_observations(
    semesters: &[SemesterSummary],
    assessment: &ProgressionAssessment,
) -> Vec<String> {
    let mut observations = vec![format!(
        "Overall progression is {} across {} semester(s)",
        assessment.tier.label().to_lowercase(),
        semesters.len()
    )];

    if assessment.semesters_with_failures > 0 {
        observations.push(format!(
            "Failed courses appear in {} semester(s)",
            assessment.semesters_with_failures
        ));
    }

    observations.extend(assessment.alerts.iter().map(|alert| alert.message.clone()));

    if assessment.needs_attention {
        observations.push("This student needs academic follow-up".to_string());
    }

    observations
}

fn chart_data(semesters: &[SemesterSummary]) -> ChartData {
    let bands: [(&str, f64); 4] = [
        ("90-100", 90.0),
        ("80-89", 80.0),
        ("70-79", 70.0),
        ("61-69", PASSING_GRADE),
    ];
    let mut distribution = [0usize; 5];
    let mut approvals = [0usize; 3];

    for (_, outcome) in courses_with_terms(semesters) {
        match outcome.approval.status {
            ApprovalStatus::Passed => approvals[0] += 1,
            ApprovalStatus::Failed => approvals[1] += 1,
            ApprovalStatus::Ungraded => approvals[2] += 1,
        }

        if let Some(grade) = outcome.final_grade {
            let band = bands
                .iter()
                .position(|(_, floor)| grade >= *floor)
                .unwrap_or(bands.len());
            distribution[band] += 1;
        }
    }

    let mut labels: Vec<String> = bands.iter().map(|(label, _)| label.to_string()).collect();
    labels.push("Below 61".to_string());

    ChartData {
        grade_distribution: ChartSeries {
            labels,
            values: distribution.to_vec(),
        },
        approval_counts: ChartSeries {
            labels: vec!["Passed".to_string(), "Failed".to_string(), "Pending".to_string()],
            values: approvals.to_vec(),
        },
    }
}

/// Renders report data as a markdown document.
pub fn render_markdown(report: &ReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", report.header.title);
    let _ = writeln!(
        output,
        "Generated for {} ({}) on {}",
        report.header.student_name, report.header.period, report.header.generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses");

    if report.course_table.is_empty() {
        let _ = writeln!(output, "No enrollments recorded for this period.");
    } else {
        let _ = writeln!(output, "| Term | Code | Course | Credits | Status | Grade | Result |");
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for row in report.course_table.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} |",
                row.term,
                row.code,
                row.name,
                row.credits,
                row.enrollment_status,
                format_grade(row.final_grade),
                row.approval
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    for item in report.summary.iter() {
        let _ = writeln!(output, "- {}: {}", item.label, item.value);
    }

    if let Some(details) = &report.evaluation_details {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Evaluation Detail");
        for course in details.iter() {
            let _ = writeln!(
                output,
                "### {} {} ({}) final {}",
                course.code,
                course.name,
                course.term,
                format_grade(course.final_grade)
            );
            if course.evaluations.is_empty() {
                let _ = writeln!(output, "No evaluations recorded.");
            }
            for evaluation in course.evaluations.iter() {
                let _ = writeln!(
                    output,
                    "- {}: {} (weight {})",
                    evaluation.assessment_type,
                    format_grade(evaluation.score),
                    format_grade(evaluation.weight)
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Observations");
    for observation in report.observations.iter() {
        let _ = writeln!(output, "- {observation}");
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recommendations");
        for recommendation in report.recommendations.iter() {
            let _ = writeln!(output, "- {recommendation}");
        }
    }

    output
}
