//! Per-term rollup of a student's enrollments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::grading::{self, ApprovalOutcome, ApprovalStatus};
use crate::models::{Course, Enrollment, EnrollmentStatus, Evaluation, Term, TermKey};

/// One enrollment after grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub enrollment_id: Uuid,
    pub course: Course,
    pub status: EnrollmentStatus,
    pub final_grade: Option<f64>,
    pub approval: ApprovalOutcome,
    pub evaluations: Vec<Evaluation>,
}

impl CourseOutcome {
    pub fn from_enrollment(enrollment: &Enrollment) -> Self {
        let final_grade = grading::compute_final_grade(&enrollment.evaluations);
        Self {
            enrollment_id: enrollment.id,
            course: enrollment.course.clone(),
            status: enrollment.status,
            final_grade,
            approval: grading::classify_approval(final_grade),
            evaluations: enrollment.evaluations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterSummary {
    pub term: Term,
    pub label: String,
    pub total_courses: usize,
    pub graded_courses: usize,
    pub passed_courses: usize,
    pub failed_courses: usize,
    pub total_credits: u32,
    pub passed_credits: u32,
    pub weighted_average: Option<f64>,
    pub courses: Vec<CourseOutcome>,
}

impl SemesterSummary {
    pub fn key(&self) -> TermKey {
        self.term.key
    }

    /// Share of enrolled courses that were passed, `None` for an empty term.
    pub fn pass_rate(&self) -> Option<f64> {
        if self.total_courses == 0 {
            None
        } else {
            Some(self.passed_courses as f64 / self.total_courses as f64)
        }
    }

    pub fn pending_courses(&self) -> usize {
        self.total_courses - self.graded_courses
    }

    fn from_outcomes(term: Term, courses: Vec<CourseOutcome>) -> Self {
        let mut summary = SemesterSummary {
            label: term.key.label(),
            term,
            total_courses: courses.len(),
            graded_courses: 0,
            passed_courses: 0,
            failed_courses: 0,
            total_credits: 0,
            passed_credits: 0,
            weighted_average: None,
            courses: Vec::new(),
        };

        for course in &courses {
            summary.total_credits += course.course.credits;
            if course.final_grade.is_some() {
                summary.graded_courses += 1;
            }
            match course.approval.status {
                ApprovalStatus::Passed => {
                    summary.passed_courses += 1;
                    summary.passed_credits += course.course.credits;
                }
                ApprovalStatus::Failed => summary.failed_courses += 1,
                ApprovalStatus::Ungraded => {}
            }
        }

        summary.weighted_average = credit_weighted_average(&courses);
        summary.courses = courses;
        summary
    }
}

/// Groups enrollments by term and summarizes each one, oldest term first.
pub fn aggregate_by_semester(enrollments: &[Enrollment]) -> Vec<SemesterSummary> {
    let mut groups: BTreeMap<TermKey, (Term, Vec<CourseOutcome>)> = BTreeMap::new();

    for enrollment in enrollments {
        groups
            .entry(enrollment.term.key)
            .or_insert_with(|| (enrollment.term.clone(), Vec::new()))
            .1
            .push(CourseOutcome::from_enrollment(enrollment));
    }

    groups
        .into_values()
        .map(|(term, courses)| {
            let summary = SemesterSummary::from_outcomes(term, courses);
            debug!(
                term = %summary.key(),
                courses = summary.total_courses,
                graded = summary.graded_courses,
                average = ?summary.weighted_average,
                "aggregated semester"
            );
            summary
        })
        .collect()
}

/// Credit-weighted average over every graded course in every semester.
pub fn cumulative_average(semesters: &[SemesterSummary]) -> Option<f64> {
    let courses: Vec<CourseOutcome> = semesters
        .iter()
        .flat_map(|semester| semester.courses.iter().cloned())
        .collect();
    credit_weighted_average(&courses)
}

fn credit_weighted_average(courses: &[CourseOutcome]) -> Option<f64> {
    let (weighted, credits) = courses
        .iter()
        .filter_map(|course| {
            course
                .final_grade
                .map(|grade| (grade * course.course.credits as f64, course.course.credits))
        })
        .fold((0.0, 0u32), |(sum, total), (weighted, credits)| {
            (sum + weighted, total + credits)
        });

    if credits == 0 {
        None
    } else {
        Some(grading::round_half_up(weighted / credits as f64, 2))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn term(year: i32, number: u8) -> Term {
        let start_month = if number == 1 { 1 } else { 7 };
        Term {
            key: TermKey { year, number },
            start_date: NaiveDate::from_ymd_opt(year, start_month, 15).unwrap(),
            end_date: NaiveDate::from_ymd_opt(year, start_month + 4, 30).unwrap(),
        }
    }

    fn enrollment(code: &str, credits: u32, term: Term, evaluations: Vec<Evaluation>) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            course: Course {
                code: code.to_string(),
                name: format!("Course {code}"),
                credits,
            },
            term,
            status: EnrollmentStatus::Completed,
            evaluations,
        }
    }

    #[test]
    fn graded_and_ungraded_courses_in_one_term() {
        let spring = term(2024, 1);
        let enrollments = vec![
            enrollment(
                "A",
                4,
                spring.clone(),
                vec![
                    Evaluation::new("midterm", Some(90.0), 50.0),
                    Evaluation::new("final", Some(80.0), 50.0),
                ],
            ),
            enrollment("B", 3, spring, Vec::new()),
        ];

        let summaries = aggregate_by_semester(&enrollments);
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.total_courses, 2);
        assert_eq!(summary.graded_courses, 1);
        assert_eq!(summary.passed_courses, 1);
        assert_eq!(summary.failed_courses, 0);
        assert_eq!(summary.total_credits, 7);
        assert_eq!(summary.passed_credits, 4);
        assert_eq!(summary.weighted_average, Some(85.0));
        assert_eq!(summary.pending_courses(), 1);
        assert_eq!(summary.label, "First Semester 2024");
    }

    #[test]
    fn terms_are_ordered_oldest_first() {
        let enrollments = vec![
            enrollment("C", 3, term(2025, 1), Vec::new()),
            enrollment("B", 3, term(2024, 2), Vec::new()),
            enrollment("A", 3, term(2024, 1), Vec::new()),
            enrollment("D", 3, term(2024, 2), Vec::new()),
        ];

        let keys: Vec<String> = aggregate_by_semester(&enrollments)
            .iter()
            .map(|summary| summary.key().to_string())
            .collect();
        assert_eq!(keys, vec!["2024-1", "2024-2", "2025-1"]);
    }

    #[test]
    fn average_is_weighted_by_credits() {
        let fall = term(2023, 2);
        let enrollments = vec![
            enrollment("A", 4, fall.clone(), vec![Evaluation::new("final", Some(90.0), 100.0)]),
            enrollment("B", 2, fall.clone(), vec![Evaluation::new("final", Some(45.0), 100.0)]),
            enrollment("C", 5, fall, vec![Evaluation::new("final", None, 100.0)]),
        ];

        let summary = &aggregate_by_semester(&enrollments)[0];
        // (90 * 4 + 45 * 2) / 6
        assert_eq!(summary.weighted_average, Some(75.0));
        assert_eq!(summary.failed_courses, 1);
        assert_eq!(summary.passed_credits, 4);
        assert_eq!(summary.total_credits, 11);
        assert_eq!(summary.pass_rate(), Some(1.0 / 3.0));
    }

    #[test]
    fn ungraded_term_has_no_average() {
        let enrollments = vec![enrollment("A", 3, term(2024, 1), Vec::new())];
        let summary = &aggregate_by_semester(&enrollments)[0];
        assert_eq!(summary.weighted_average, None);
        assert_eq!(summary.graded_courses, 0);
    }

    #[test]
    fn empty_input_yields_no_summaries() {
        assert!(aggregate_by_semester(&[]).is_empty());
        assert_eq!(cumulative_average(&[]), None);
    }

    #[test]
    fn cumulative_average_spans_terms() {
        let enrollments = vec![
            enrollment("A", 3, term(2024, 1), vec![Evaluation::new("final", Some(70.0), 100.0)]),
            enrollment("B", 1, term(2024, 2), vec![Evaluation::new("final", Some(90.0), 100.0)]),
        ];
        let summaries = aggregate_by_semester(&enrollments);
        assert_eq!(cumulative_average(&summaries), Some(75.0));
    }

    #[test]
    fn aggregation_is_repeatable() {
        let enrollments = vec![
            enrollment("A", 3, term(2024, 1), vec![Evaluation::new("final", Some(64.4), 60.0)]),
            enrollment("B", 4, term(2024, 2), vec![Evaluation::new("final", Some(58.0), 100.0)]),
        ];
        assert_eq!(aggregate_by_semester(&enrollments), aggregate_by_semester(&enrollments));
    }
}
