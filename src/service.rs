//! Request-level entry points: validate identifiers, fetch a snapshot from the
//! record source, and run the engine over it.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Enrollment, StudentInfo, Term, TermKey};
use crate::report::{self, ReportData, ReportOptions, ReportScope};
use crate::risk::{self, ProgressionAssessment, ProgressionThresholds};
use crate::semester::{self, CourseOutcome, SemesterSummary};

/// Lookup capabilities the engine needs from the data-access layer.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_student(&self, student_id: Uuid) -> anyhow::Result<Option<StudentInfo>>;

    /// Enrollments with course, term and evaluations resolved, optionally
    /// limited to one term.
    async fn fetch_enrollments(
        &self,
        student_id: Uuid,
        term: Option<TermKey>,
    ) -> anyhow::Result<Vec<Enrollment>>;

    async fn fetch_term(&self, key: TermKey) -> anyhow::Result<Option<Term>>;
}

pub fn parse_student_id(raw: &str) -> Result<Uuid, EngineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid("student id is required"));
    }
    Uuid::parse_str(trimmed)
        .map_err(|_| EngineError::invalid(format!("student id '{trimmed}' is not a valid UUID")))
}

/// Both coordinates or neither; a lone year or term number is rejected.
pub fn resolve_term(year: Option<i32>, number: Option<u8>) -> Result<Option<TermKey>, EngineError> {
    match (year, number) {
        (None, None) => Ok(None),
        (Some(year), Some(number)) => TermKey::new(year, number).map(Some),
        (Some(_), None) => Err(EngineError::invalid("term number is required when year is given")),
        (None, Some(_)) => Err(EngineError::invalid("year is required when term number is given")),
    }
}

#[derive(Debug, Clone)]
pub struct ProgressionReport {
    pub student: StudentInfo,
    pub semesters: Vec<SemesterSummary>,
    pub assessment: ProgressionAssessment,
}

pub struct GradeService<S> {
    source: S,
    thresholds: ProgressionThresholds,
}

impl<S: RecordSource> GradeService<S> {
    pub fn new(source: S, thresholds: ProgressionThresholds) -> Self {
        Self { source, thresholds }
    }

    async fn student(&self, student_id: Uuid) -> Result<StudentInfo, EngineError> {
        self.source
            .fetch_student(student_id)
            .await?
            .ok_or_else(|| EngineError::not_found("student", student_id))
    }

    async fn term(&self, key: TermKey) -> Result<Term, EngineError> {
        self.source
            .fetch_term(key)
            .await?
            .ok_or_else(|| EngineError::not_found("term", key))
    }

    /// Final grade and approval for each enrollment, optionally in one term.
    pub async fn course_grades(
        &self,
        student_id: Uuid,
        term: Option<TermKey>,
    ) -> Result<Vec<(TermKey, CourseOutcome)>, EngineError> {
        self.student(student_id).await?;
        if let Some(key) = term {
            self.term(key).await?;
        }

        let mut enrollments = self.source.fetch_enrollments(student_id, term).await?;
        enrollments.sort_by(|a, b| {
            a.term
                .key
                .cmp(&b.term.key)
                .then_with(|| a.course.code.cmp(&b.course.code))
        });

        Ok(enrollments
            .iter()
            .map(|enrollment| (enrollment.term.key, CourseOutcome::from_enrollment(enrollment)))
            .collect())
    }

    /// Summary for one term. A term the student never enrolled in yields an
    /// empty summary rather than an error.
    pub async fn semester_summary(
        &self,
        student_id: Uuid,
        key: TermKey,
    ) -> Result<(StudentInfo, SemesterSummary), EngineError> {
        let student = self.student(student_id).await?;
        let term = self.term(key).await?;
        let enrollments = self.source.fetch_enrollments(student_id, Some(key)).await?;
        info!(student = %student_id, term = %key, enrollments = enrollments.len(), "semester summary");

        let summary = semester::aggregate_by_semester(&enrollments)
            .into_iter()
            .find(|summary| summary.key() == key)
            .unwrap_or_else(|| empty_summary(term));
        Ok((student, summary))
    }

    pub async fn progression(&self, student_id: Uuid) -> Result<ProgressionReport, EngineError> {
        let student = self.student(student_id).await?;
        let enrollments = self.source.fetch_enrollments(student_id, None).await?;
        let semesters = semester::aggregate_by_semester(&enrollments);
        let assessment = risk::evaluate_progression(&semesters, &self.thresholds);
        info!(
            student = %student_id,
            semesters = semesters.len(),
            tier = ?assessment.tier,
            "progression evaluated"
        );

        Ok(ProgressionReport {
            student,
            semesters,
            assessment,
        })
    }

    pub async fn semester_report(
        &self,
        student_id: Uuid,
        key: TermKey,
        options: &ReportOptions,
    ) -> Result<ReportData, EngineError> {
        let (student, summary) = self.semester_summary(student_id, key).await?;
        Ok(report::assemble_report_data(
            &student,
            ReportScope::Semester(&summary),
            options,
        ))
    }

    pub async fn history_report(
        &self,
        student_id: Uuid,
        options: &ReportOptions,
    ) -> Result<ReportData, EngineError> {
        let progression = self.progression(student_id).await?;
        Ok(report::assemble_report_data(
            &progression.student,
            ReportScope::Progression {
                semesters: &progression.semesters,
                assessment: &progression.assessment,
            },
            options,
        ))
    }
}

fn empty_summary(term: Term) -> SemesterSummary {
    SemesterSummary {
        label: term.key.label(),
        term,
        total_courses: 0,
        graded_courses: 0,
        passed_courses: 0,
        failed_courses: 0,
        total_credits: 0,
        passed_credits: 0,
        weighted_average: None,
        courses: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Course, EnrollmentStatus, Evaluation};
    use crate::risk::ProgressionTier;

    struct MemorySource {
        students: Vec<StudentInfo>,
        terms: Vec<Term>,
        enrollments: Vec<Enrollment>,
        fail: bool,
    }

    #[async_trait]
    impl RecordSource for MemorySource {
        async fn fetch_student(&self, student_id: Uuid) -> anyhow::Result<Option<StudentInfo>> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.students.iter().find(|s| s.id == student_id).cloned())
        }

        async fn fetch_enrollments(
            &self,
            student_id: Uuid,
            term: Option<TermKey>,
        ) -> anyhow::Result<Vec<Enrollment>> {
            Ok(self
                .enrollments
                .iter()
                .filter(|e| e.student_id == student_id)
                .filter(|e| term.map_or(true, |key| e.term.key == key))
                .cloned()
                .collect())
        }

        async fn fetch_term(&self, key: TermKey) -> anyhow::Result<Option<Term>> {
            Ok(self.terms.iter().find(|t| t.key == key).cloned())
        }
    }

    fn term(year: i32, number: u8) -> Term {
        Term {
            key: TermKey { year, number },
            start_date: NaiveDate::from_ymd_opt(year, 1, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(year, 5, 20).unwrap(),
        }
    }

    fn fixture() -> (MemorySource, Uuid) {
        let student_id = Uuid::new_v4();
        let spring = term(2024, 1);
        let fall = term(2024, 2);
        let course = |code: &str, credits: u32, t: &Term, score: Option<f64>| Enrollment {
            id: Uuid::new_v4(),
            student_id,
            course: Course {
                code: code.to_string(),
                name: code.to_string(),
                credits,
            },
            term: t.clone(),
            status: EnrollmentStatus::Completed,
            evaluations: vec![Evaluation::new("final", score, 100.0)],
        };

        let source = MemorySource {
            students: vec![StudentInfo {
                id: student_id,
                first_name: "Jules".to_string(),
                middle_name: None,
                last_name: "Moreno".to_string(),
            }],
            terms: vec![spring.clone(), fall.clone(), term(2025, 1)],
            enrollments: vec![
                course("MAT201", 4, &fall, Some(55.0)),
                course("BIO101", 4, &spring, Some(88.0)),
                course("CHE101", 4, &spring, Some(79.0)),
                course("ENG101", 4, &spring, Some(91.0)),
            ],
            fail: false,
        };
        (source, student_id)
    }

    #[test]
    fn student_id_must_be_present_and_valid() {
        assert!(matches!(parse_student_id(""), Err(EngineError::InvalidInput(_))));
        assert!(matches!(parse_student_id("abc"), Err(EngineError::InvalidInput(_))));
        let id = Uuid::new_v4();
        assert_eq!(parse_student_id(&format!(" {id} ")).unwrap(), id);
    }

    #[test]
    fn term_needs_both_coordinates() {
        assert_eq!(resolve_term(None, None).unwrap(), None);
        assert_eq!(
            resolve_term(Some(2024), Some(2)).unwrap(),
            Some(TermKey { year: 2024, number: 2 })
        );
        assert!(matches!(resolve_term(Some(2024), None), Err(EngineError::InvalidInput(_))));
        assert!(matches!(resolve_term(None, Some(1)), Err(EngineError::InvalidInput(_))));
        assert!(matches!(resolve_term(Some(2024), Some(3)), Err(EngineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let (source, _) = fixture();
        let service = GradeService::new(source, ProgressionThresholds::default());
        let err = service.progression(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "student", .. }));
    }

    #[tokio::test]
    async fn unknown_term_is_not_found() {
        let (source, student_id) = fixture();
        let service = GradeService::new(source, ProgressionThresholds::default());
        let key = TermKey { year: 2030, number: 1 };
        let err = service.semester_summary(student_id, key).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "term", .. }));
    }

    #[tokio::test]
    async fn source_failures_pass_through() {
        let (mut source, student_id) = fixture();
        source.fail = true;
        let service = GradeService::new(source, ProgressionThresholds::default());
        let err = service.progression(student_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Source(_)));
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn semester_summary_uses_requested_term() {
        let (source, student_id) = fixture();
        let service = GradeService::new(source, ProgressionThresholds::default());
        let (student, summary) = service
            .semester_summary(student_id, TermKey { year: 2024, number: 1 })
            .await
            .unwrap();

        assert_eq!(student.full_name(), "Jules Moreno");
        assert_eq!(summary.total_courses, 3);
        assert_eq!(summary.passed_courses, 3);
        assert_eq!(summary.total_credits, 12);
        assert_eq!(summary.weighted_average, Some(86.0));
    }

    #[tokio::test]
    async fn term_without_enrollments_is_empty() {
        let (source, student_id) = fixture();
        let service = GradeService::new(source, ProgressionThresholds::default());
        let (_, summary) = service
            .semester_summary(student_id, TermKey { year: 2025, number: 1 })
            .await
            .unwrap();
        assert_eq!(summary.total_courses, 0);
        assert_eq!(summary.weighted_average, None);
        assert_eq!(summary.label, "First Semester 2025");
    }

    #[tokio::test]
    async fn progression_flags_failing_term() {
        let (source, student_id) = fixture();
        let service = GradeService::new(source, ProgressionThresholds::default());
        let progression = service.progression(student_id).await.unwrap();

        assert_eq!(progression.semesters.len(), 2);
        // Fall 2024: 4 credits, one failure, 0% pass rate.
        assert_eq!(progression.assessment.alert_count, 3);
        assert_eq!(progression.assessment.tier, ProgressionTier::Fair);
        assert!(progression.assessment.needs_attention);
    }

    #[tokio::test]
    async fn course_grades_are_sorted_by_term_then_code() {
        let (source, student_id) = fixture();
        let service = GradeService::new(source, ProgressionThresholds::default());
        let grades = service.course_grades(student_id, None).await.unwrap();
        let codes: Vec<&str> = grades.iter().map(|(_, c)| c.course.code.as_str()).collect();
        assert_eq!(codes, vec!["BIO101", "CHE101", "ENG101", "MAT201"]);
        assert_eq!(grades[3].1.final_grade, Some(55.0));
    }

    #[tokio::test]
    async fn reports_are_assembled_for_both_scopes() {
        let (source, student_id) = fixture();
        let service = GradeService::new(source, ProgressionThresholds::default());
        let options = ReportOptions::new(true);

        let semester = service
            .semester_report(student_id, TermKey { year: 2024, number: 2 }, &options)
            .await
            .unwrap();
        assert_eq!(semester.course_table.len(), 1);
        assert!(semester.evaluation_details.is_some());

        let history = service.history_report(student_id, &options).await.unwrap();
        assert_eq!(history.course_table.len(), 4);
        assert_eq!(history.header.title, "Academic Progress Report");
        assert!(!history.recommendations.is_empty());
    }
}
