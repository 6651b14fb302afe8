use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    coerce_number, Course, Enrollment, EnrollmentStatus, Evaluation, StudentInfo, Term, TermKey,
};
use crate::service::RecordSource;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct StudentRow<'a> {
    email: &'a str,
    first_name: &'a str,
    middle_name: Option<&'a str>,
    last_name: &'a str,
}

async fn upsert_student(pool: &PgPool, student: &StudentRow<'_>) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_progress.students (id, first_name, middle_name, last_name, email)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE
        SET first_name = EXCLUDED.first_name,
            middle_name = EXCLUDED.middle_name,
            last_name = EXCLUDED.last_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student.first_name)
    .bind(student.middle_name)
    .bind(student.last_name)
    .bind(student.email)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_course(pool: &PgPool, course: &Course) -> anyhow::Result<()> {
    let credits = i32::try_from(course.credits).context("course credits out of range")?;
    sqlx::query(
        r#"
        INSERT INTO academic_progress.courses (code, name, credits)
        VALUES ($1, $2, $3)
        ON CONFLICT (code) DO UPDATE
        SET name = EXCLUDED.name, credits = EXCLUDED.credits
        "#,
    )
    .bind(&course.code)
    .bind(&course.name)
    .bind(credits)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_term(pool: &PgPool, term: &Term) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO academic_progress.terms (year, number, start_date, end_date)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (year, number) DO NOTHING
        "#,
    )
    .bind(term.key.year)
    .bind(i16::from(term.key.number))
    .bind(term.start_date)
    .bind(term.end_date)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_enrollment(
    pool: &PgPool,
    student_id: Uuid,
    course_code: &str,
    key: TermKey,
    status: EnrollmentStatus,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_progress.enrollments
        (id, student_id, course_code, term_year, term_number, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (student_id, course_code, term_year, term_number) DO UPDATE
        SET status = EXCLUDED.status
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(course_code)
    .bind(key.year)
    .bind(i16::from(key.number))
    .bind(status.as_str())
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

/// Returns `true` when the evaluation was new.
async fn insert_evaluation(
    pool: &PgPool,
    enrollment_id: Uuid,
    evaluation: &Evaluation,
    weight: f64,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO academic_progress.evaluations
        (id, enrollment_id, assessment_type, score, weight, evaluated_on, notes, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(enrollment_id)
    .bind(&evaluation.assessment_type)
    .bind(evaluation.score)
    .bind(weight)
    .bind(evaluation.evaluated_on)
    .bind(&evaluation.notes)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Calendar used when an import names a term the database has not seen.
pub fn default_term(key: TermKey) -> anyhow::Result<Term> {
    let (start, end) = match key.number {
        1 => ((1, 15), (6, 15)),
        _ => ((7, 15), (12, 15)),
    };
    Ok(Term {
        key,
        start_date: NaiveDate::from_ymd_opt(key.year, start.0, start.1).context("invalid date")?,
        end_date: NaiveDate::from_ymd_opt(key.year, end.0, end.1).context("invalid date")?,
    })
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = [
        StudentRow {
            email: "avery.lee@groupscholar.com",
            first_name: "Avery",
            middle_name: None,
            last_name: "Lee",
        },
        StudentRow {
            email: "jules.moreno@groupscholar.com",
            first_name: "Jules",
            middle_name: Some("Andrea"),
            last_name: "Moreno",
        },
        StudentRow {
            email: "kiara.patel@groupscholar.com",
            first_name: "Kiara",
            middle_name: None,
            last_name: "Patel",
        },
    ];

    let courses = [
        ("MAT101", "Calculus I", 4),
        ("PHY101", "General Physics", 4),
        ("ENG110", "Academic Writing", 3),
        ("HIS120", "World History", 3),
        ("MAT201", "Linear Algebra", 4),
        ("CS150", "Introduction to Programming", 4),
    ];
    for (code, name, credits) in courses {
        upsert_course(
            pool,
            &Course {
                code: code.to_string(),
                name: name.to_string(),
                credits,
            },
        )
        .await?;
    }

    let spring = TermKey::new(2025, 1)?;
    let fall = TermKey::new(2025, 2)?;
    for key in [spring, fall] {
        upsert_term(pool, &default_term(key)?).await?;
    }

    // (student, course, term, status, [(type, score, weight)])
    let records: Vec<(usize, &str, TermKey, EnrollmentStatus, Vec<(&str, Option<f64>, f64)>)> = vec![
        (0, "MAT101", spring, EnrollmentStatus::Completed, vec![("midterm", Some(88.0), 40.0), ("final", Some(92.0), 60.0)]),
        (0, "PHY101", spring, EnrollmentStatus::Completed, vec![("labs", Some(79.0), 30.0), ("final", Some(84.0), 70.0)]),
        (0, "ENG110", spring, EnrollmentStatus::Completed, vec![("essay", Some(90.0), 50.0), ("portfolio", Some(95.0), 50.0)]),
        (0, "MAT201", fall, EnrollmentStatus::Active, vec![("midterm", Some(81.0), 40.0), ("final", None, 60.0)]),
        (1, "MAT101", spring, EnrollmentStatus::Completed, vec![("midterm", Some(45.0), 40.0), ("final", Some(58.0), 60.0)]),
        (1, "HIS120", spring, EnrollmentStatus::Completed, vec![("final", Some(73.5), 100.0)]),
        (1, "MAT101", fall, EnrollmentStatus::Active, vec![("midterm", Some(62.0), 40.0), ("final", None, 60.0)]),
        (2, "CS150", spring, EnrollmentStatus::Completed, vec![("projects", Some(97.0), 50.0), ("final", Some(89.0), 50.0)]),
        (2, "MAT101", spring, EnrollmentStatus::Completed, vec![("midterm", Some(70.0), 40.0), ("final", Some(66.0), 60.0)]),
        (2, "PHY101", spring, EnrollmentStatus::Completed, vec![("labs", Some(85.0), 30.0), ("final", Some(55.0), 70.0)]),
        (2, "ENG110", spring, EnrollmentStatus::Withdrawn, Vec::new()),
    ];

    let mut student_ids = Vec::with_capacity(students.len());
    for student in students.iter() {
        student_ids.push(upsert_student(pool, student).await?);
    }

    for (student, course_code, key, status, evaluations) in records {
        let enrollment_id =
            upsert_enrollment(pool, student_ids[student], course_code, key, status).await?;
        for (assessment_type, score, weight) in evaluations {
            let evaluation = Evaluation::new(assessment_type, score, weight);
            let source_key = format!(
                "seed-{}-{course_code}-{key}-{assessment_type}",
                students[student].email
            );
            insert_evaluation(pool, enrollment_id, &evaluation, weight, &source_key).await?;
        }
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    email: String,
    first_name: String,
    middle_name: Option<String>,
    last_name: String,
    course_code: String,
    course_name: String,
    credits: u32,
    year: i32,
    term: u8,
    status: Option<String>,
    assessment_type: String,
    score: Option<String>,
    weight: Option<String>,
    evaluated_on: Option<NaiveDate>,
    notes: Option<String>,
    source_key: Option<String>,
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<ImportSummary> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary::default();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed CSV row at line {line}"))?;

        let key = match TermKey::new(row.year, row.term) {
            Ok(key) => key,
            Err(err) => {
                warn!(line, %err, "skipping row");
                summary.skipped += 1;
                continue;
            }
        };
        let Some(weight) = row.weight.as_deref().and_then(coerce_number) else {
            warn!(line, weight = ?row.weight, "skipping row without a numeric weight");
            summary.skipped += 1;
            continue;
        };
        let status = match row.status.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => raw.parse::<EnrollmentStatus>()?,
            None => EnrollmentStatus::Active,
        };

        let student_id = upsert_student(
            pool,
            &StudentRow {
                email: &row.email,
                first_name: &row.first_name,
                middle_name: row.middle_name.as_deref().filter(|m| !m.trim().is_empty()),
                last_name: &row.last_name,
            },
        )
        .await?;
        upsert_course(
            pool,
            &Course {
                code: row.course_code.clone(),
                name: row.course_name.clone(),
                credits: row.credits,
            },
        )
        .await?;
        upsert_term(pool, &default_term(key)?).await?;
        let enrollment_id =
            upsert_enrollment(pool, student_id, &row.course_code, key, status).await?;

        let evaluation = Evaluation {
            assessment_type: row.assessment_type,
            score: row.score.as_deref().and_then(coerce_number),
            weight: Some(weight),
            evaluated_on: row.evaluated_on,
            notes: row.notes.filter(|n| !n.trim().is_empty()),
        };
        let source_key = row
            .source_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_evaluation(pool, enrollment_id, &evaluation, weight, &source_key).await? {
            summary.inserted += 1;
        }
    }

    Ok(summary)
}

/// Postgres-backed record source.
pub struct PgRecords {
    pool: PgPool,
}

impl PgRecords {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for PgRecords {
    async fn fetch_student(&self, student_id: Uuid) -> anyhow::Result<Option<StudentInfo>> {
        let row = sqlx::query(
            "SELECT id, first_name, middle_name, last_name \
             FROM academic_progress.students WHERE id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up student")?;

        Ok(row.map(|row| StudentInfo {
            id: row.get("id"),
            first_name: row.get("first_name"),
            middle_name: row.get("middle_name"),
            last_name: row.get("last_name"),
        }))
    }

    async fn fetch_enrollments(
        &self,
        student_id: Uuid,
        term: Option<TermKey>,
    ) -> anyhow::Result<Vec<Enrollment>> {
        let mut query = String::from(
            "SELECT e.id, e.student_id, e.status, c.code, c.name, c.credits, \
             t.year, t.number, t.start_date, t.end_date \
             FROM academic_progress.enrollments e \
             JOIN academic_progress.courses c ON c.code = e.course_code \
             JOIN academic_progress.terms t ON t.year = e.term_year AND t.number = e.term_number \
             WHERE e.student_id = $1",
        );
        if term.is_some() {
            query.push_str(" AND e.term_year = $2 AND e.term_number = $3");
        }
        query.push_str(" ORDER BY t.year, t.number, c.code");

        let mut rows = sqlx::query(&query).bind(student_id);
        if let Some(key) = term {
            rows = rows.bind(key.year).bind(i16::from(key.number));
        }
        let records = rows
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch enrollments")?;

        let ids: Vec<Uuid> = records.iter().map(|row| row.get("id")).collect();
        let mut evaluations = self.fetch_evaluations(&ids).await?;

        let mut enrollments = Vec::with_capacity(records.len());
        for row in records {
            let id: Uuid = row.get("id");
            let credits: i32 = row.get("credits");
            let number: i16 = row.get("number");
            let status: String = row.get("status");

            enrollments.push(Enrollment {
                id,
                student_id: row.get("student_id"),
                course: Course {
                    code: row.get("code"),
                    name: row.get("name"),
                    credits: u32::try_from(credits)
                        .with_context(|| format!("negative credits on enrollment {id}"))?,
                },
                term: Term {
                    key: TermKey {
                        year: row.get("year"),
                        number: u8::try_from(number).context("term number out of range")?,
                    },
                    start_date: row.get("start_date"),
                    end_date: row.get("end_date"),
                },
                status: status.parse()?,
                evaluations: evaluations.remove(&id).unwrap_or_default(),
            });
        }

        Ok(enrollments)
    }

    async fn fetch_term(&self, key: TermKey) -> anyhow::Result<Option<Term>> {
        let row = sqlx::query(
            "SELECT start_date, end_date FROM academic_progress.terms \
             WHERE year = $1 AND number = $2",
        )
        .bind(key.year)
        .bind(i16::from(key.number))
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up term")?;

        Ok(row.map(|row| Term {
            key,
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
        }))
    }
}

impl PgRecords {
    async fn fetch_evaluations(
        &self,
        enrollment_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, Vec<Evaluation>>> {
        if enrollment_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT enrollment_id, assessment_type, score, weight, evaluated_on, notes \
             FROM academic_progress.evaluations \
             WHERE enrollment_id = ANY($1) \
             ORDER BY evaluated_on NULLS LAST, assessment_type",
        )
        .bind(enrollment_ids)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch evaluations")?;

        let mut grouped: HashMap<Uuid, Vec<Evaluation>> = HashMap::new();
        for row in rows {
            let score: Option<f64> = row.get("score");
            let weight: f64 = row.get("weight");
            grouped
                .entry(row.get("enrollment_id"))
                .or_default()
                .push(Evaluation {
                    assessment_type: row.get("assessment_type"),
                    score: score.filter(|s| s.is_finite()),
                    weight: Some(weight).filter(|w| w.is_finite()),
                    evaluated_on: row.get("evaluated_on"),
                    notes: row.get("notes"),
                });
        }
        Ok(grouped)
    }
}
