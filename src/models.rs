use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub assessment_type: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub evaluated_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Evaluation {
    pub fn new(assessment_type: impl Into<String>, score: Option<f64>, weight: f64) -> Self {
        Self {
            assessment_type: assessment_type.into(),
            score,
            weight: Some(weight),
            evaluated_on: None,
            notes: None,
        }
    }
}

/// Parses a score or weight typed as text. Blank, unparseable and non-finite
/// values are absent.
pub fn coerce_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<LenientNumber>::deserialize(deserializer)?;
    Ok(match raw {
        Some(LenientNumber::Number(value)) if value.is_finite() => Some(value),
        Some(LenientNumber::Text(text)) => coerce_number(&text),
        Some(LenientNumber::Number(_)) | Some(LenientNumber::Other(_)) | None => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Active,
    Withdrawn,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Withdrawn => "WITHDRAWN",
            EnrollmentStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(EnrollmentStatus::Active),
            "WITHDRAWN" => Ok(EnrollmentStatus::Withdrawn),
            "COMPLETED" => Ok(EnrollmentStatus::Completed),
            other => Err(EngineError::invalid(format!(
                "unknown enrollment status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub name: String,
    pub credits: u32,
}

/// Academic term identity: a year plus term number 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermKey {
    pub year: i32,
    pub number: u8,
}

impl TermKey {
    pub fn new(year: i32, number: u8) -> Result<Self, EngineError> {
        if year <= 0 {
            return Err(EngineError::invalid(format!("year must be positive, got {year}")));
        }
        if !matches!(number, 1 | 2) {
            return Err(EngineError::invalid(format!(
                "term number must be 1 or 2, got {number}"
            )));
        }
        Ok(Self { year, number })
    }

    pub fn label(&self) -> String {
        let ordinal = match self.number {
            1 => "First",
            2 => "Second",
            _ => "Unknown",
        };
        format!("{ordinal} Semester {}", self.year)
    }
}

impl fmt::Display for TermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub key: TermKey,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub id: Uuid,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

impl StudentInfo {
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course: Course,
    pub term: Term,
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}
