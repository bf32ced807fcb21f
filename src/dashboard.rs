//! Assembles the dashboard tabs from one dataset.
//!
//! Every panel is computed independently; a failure in one (say, a grade-only
//! upload without attendance data) is reported in that panel and the rest of
//! the report still renders.

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::analytics::{
    self, BucketCount, ColumnSummary, RiskFlag, SubjectAverage, DEFAULT_RANKING_SIZE, PERFORMANCE_MARGIN,
};
use crate::data::{Dataset, ExamType, StudentRecord};
use crate::error::{DashboardError, Result};
use crate::model::{self, Prediction};
use crate::recommendation::LearningPath;
use crate::schema::{self, NumericColumn};

/// A panel's content, or the message to show in its place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Panel<T> {
    Ok { data: T },
    Error { message: String },
}

impl<T> Panel<T> {
    fn build(name: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Panel::Ok { data },
            Err(e) => {
                warn!("{} panel unavailable: {}", name, e);
                Panel::Error { message: e.to_string() }
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Panel::Ok { data } => Some(data),
            Panel::Error { .. } => None,
        }
    }
}

/// Selections made on the dashboard. Unset selections default to the first
/// student in the upload and that student's first subject.
#[derive(Debug, Clone)]
pub struct DashboardQuery {
    pub student: Option<String>,
    pub subject: Option<String>,
    pub top_n: usize,
}

impl Default for DashboardQuery {
    fn default() -> Self {
        Self { student: None, subject: None, top_n: DEFAULT_RANKING_SIZE }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub total_students: usize,
    pub total_features: usize,
    pub columns: Vec<String>,
    pub statistics: Vec<ColumnSummary>,
    pub learning_path: Panel<LearningPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    pub subject: String,
    pub score: Option<f64>,
}

impl RankedEntry {
    fn new(record: &StudentRecord, column: NumericColumn) -> Self {
        Self { name: record.name.clone(), subject: record.subject.clone(), score: column.value(record) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub score_column: NumericColumn,
    pub class_average: f64,
    pub top_performer_count: usize,
    pub needs_help_count: usize,
    pub top_students: Vec<RankedEntry>,
    pub attention_students: Vec<RankedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectInsights {
    pub score_column: NumericColumn,
    pub averages: Vec<SubjectAverage>,
    pub strongest: Option<SubjectAverage>,
    pub weakest: Option<SubjectAverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceEntry {
    pub name: String,
    pub attendance_rate: Option<f64>,
    pub previous_grade: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceAnalysis {
    pub average_attendance: f64,
    pub average_previous_grade: Option<f64>,
    pub distribution: Vec<BucketCount>,
    pub low_attendance: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamPoint {
    pub exam_type: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamProgression {
    pub student: String,
    pub subject: String,
    pub score_column: NumericColumn,
    pub points: Vec<ExamPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub profile: Panel<ProfileSummary>,
    pub performance: Panel<PerformanceSummary>,
    pub subjects: Panel<SubjectInsights>,
    pub attendance: Panel<AttendanceAnalysis>,
    pub risk: Panel<Vec<RiskFlag>>,
    pub comparison: Panel<ExamProgression>,
    pub prediction: Panel<Prediction>,
}

fn selected_student<'a>(dataset: &'a Dataset, query: &'a DashboardQuery) -> Result<&'a str> {
    match &query.student {
        Some(name) => Ok(dataset.find_student(name)?.name.as_str()),
        None => dataset.student_names().first().copied().ok_or(DashboardError::EmptyDataset),
    }
}

pub fn profile_summary(dataset: &Dataset, query: &DashboardQuery) -> ProfileSummary {
    let learning_path = selected_student(dataset, query).and_then(|name| learning_path(dataset, name));
    ProfileSummary {
        total_students: dataset.len(),
        total_features: dataset.columns().len(),
        columns: dataset.columns().to_vec(),
        statistics: analytics::describe(dataset),
        learning_path: Panel::build("learning path", learning_path),
    }
}

/// Recommendation from the student's first `PreviousGrade`.
pub fn learning_path(dataset: &Dataset, name: &str) -> Result<LearningPath> {
    schema::require_columns(dataset, &[schema::PREVIOUS_GRADE])?;
    let (row, record) = dataset
        .records()
        .iter()
        .enumerate()
        .find(|(_, r)| r.name == name)
        .ok_or_else(|| DashboardError::unknown_student(name))?;
    let grade = record
        .previous_grade
        .ok_or_else(|| DashboardError::MissingValue { column: schema::PREVIOUS_GRADE.to_string(), row })?;
    Ok(LearningPath::for_grade(name, grade))
}

pub fn performance_summary(dataset: &Dataset, score: NumericColumn, top_n: usize) -> Result<PerformanceSummary> {
    let entries = |records: Vec<&StudentRecord>| records.into_iter().map(|r| RankedEntry::new(r, score)).collect();
    Ok(PerformanceSummary {
        score_column: score,
        class_average: analytics::class_average(dataset, score)?,
        top_performer_count: analytics::top_performers(dataset, score, PERFORMANCE_MARGIN)?.len(),
        needs_help_count: analytics::at_risk_students(dataset, score, PERFORMANCE_MARGIN)?.len(),
        top_students: entries(analytics::ranked_top_n(dataset, score, top_n, false)?),
        attention_students: entries(analytics::ranked_top_n(dataset, score, top_n, true)?),
    })
}

pub fn subject_insights(dataset: &Dataset, score: NumericColumn) -> Result<SubjectInsights> {
    let averages = analytics::subject_averages(dataset, score)?;
    Ok(SubjectInsights {
        score_column: score,
        strongest: averages.first().cloned(),
        weakest: averages.last().cloned(),
        averages,
    })
}

pub fn attendance_analysis(dataset: &Dataset) -> Result<AttendanceAnalysis> {
    let average_previous_grade = if dataset.has_column(schema::PREVIOUS_GRADE) {
        analytics::class_average(dataset, NumericColumn::PreviousGrade).ok()
    } else {
        None
    };
    Ok(AttendanceAnalysis {
        average_attendance: analytics::class_average(dataset, NumericColumn::AttendanceRate)?,
        average_previous_grade,
        distribution: analytics::attendance_distribution(dataset)?,
        low_attendance: analytics::low_attendance_students(dataset)?
            .into_iter()
            .map(|r| AttendanceEntry {
                name: r.name.clone(),
                attendance_rate: r.attendance_rate,
                previous_grade: r.previous_grade,
            })
            .collect(),
    })
}

/// One student's results in one subject, Unit Test through Final. Rows
/// with an unrecognised exam type come last, in upload order.
pub fn exam_progression(
    dataset: &Dataset,
    score: NumericColumn,
    student: &str,
    subject: Option<&str>,
) -> Result<ExamProgression> {
    schema::require_columns(dataset, &[schema::SUBJECT, schema::EXAM_TYPE])?;
    let subjects = dataset.subjects_for(student)?;
    let subject = match subject {
        Some(subject) if subjects.contains(&subject) => subject,
        Some(subject) => return Err(DashboardError::unknown_subject(subject)),
        None => subjects.first().copied().ok_or(DashboardError::EmptyDataset)?,
    };

    let mut rows: Vec<&StudentRecord> =
        dataset.records().iter().filter(|r| r.name == student && r.subject == subject).collect();
    rows.sort_by_key(|r| r.exam().map_or(u8::MAX, |exam: ExamType| exam as u8));

    Ok(ExamProgression {
        student: student.to_string(),
        subject: subject.to_string(),
        score_column: score,
        points: rows
            .into_iter()
            .map(|r| ExamPoint { exam_type: r.exam_type.clone(), score: score.value(r) })
            .collect(),
    })
}

/// Builds every tab of the dashboard for one upload.
pub fn build_report(dataset: &Dataset, query: &DashboardQuery) -> DashboardReport {
    let subject = query.subject.as_deref();
    let score = || schema::resolve_score_column(dataset);

    DashboardReport {
        generated_at: Utc::now(),
        profile: Panel::Ok { data: profile_summary(dataset, query) },
        performance: Panel::build(
            "performance",
            score().and_then(|column| performance_summary(dataset, column, query.top_n)),
        ),
        subjects: Panel::build("subjects", score().and_then(|column| subject_insights(dataset, column))),
        attendance: Panel::build("attendance", attendance_analysis(dataset)),
        risk: Panel::build("risk", analytics::risk_alerts(dataset)),
        comparison: Panel::build(
            "comparison",
            selected_student(dataset, query)
                .and_then(|name| score().and_then(|column| exam_progression(dataset, column, name, subject))),
        ),
        prediction: Panel::build(
            "prediction",
            selected_student(dataset, query).and_then(|name| model::predict_for_student(dataset, name)),
        ),
    }
}
