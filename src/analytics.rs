//! Class-level statistics over a resolved numeric column.
//!
//! Missing cells are skipped the way a dataframe skips NaN: they never count
//! towards a mean, never qualify for a threshold set, and sort last in a
//! ranking regardless of direction.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::{Dataset, StudentRecord};
use crate::error::{DashboardError, Result};
use crate::schema::{self, NumericColumn};

/// Distance from the class average that separates top performers and
/// students needing help from the rest of the class.
pub const PERFORMANCE_MARGIN: f64 = 10.0;
pub const DEFAULT_RANKING_SIZE: usize = 5;

/// Attendance below this is `Low`.
pub const LOW_ATTENDANCE_LIMIT: f64 = 60.0;
/// Attendance at or above this is `High`.
pub const HIGH_ATTENDANCE_LIMIT: f64 = 80.0;

pub const RISK_ATTENDANCE_LIMIT: f64 = 60.0;
pub const RISK_GRADE_LIMIT: f64 = 50.0;
pub const RISK_STUDY_HOURS_LIMIT: f64 = 3.0;

fn column_values(dataset: &Dataset, column: NumericColumn) -> Result<Vec<f64>> {
    schema::require_columns(dataset, &[column.name()])?;
    Ok(dataset.records().iter().filter_map(|r| column.value(r)).collect())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn class_average(dataset: &Dataset, column: NumericColumn) -> Result<f64> {
    mean(&column_values(dataset, column)?).ok_or(DashboardError::EmptyDataset)
}

/// Records scoring more than `margin` above the class average.
pub fn top_performers(dataset: &Dataset, column: NumericColumn, margin: f64) -> Result<Vec<&StudentRecord>> {
    let cutoff = class_average(dataset, column)? + margin;
    Ok(dataset
        .records()
        .iter()
        .filter(|r| column.value(r).is_some_and(|v| v > cutoff))
        .collect())
}

/// Records scoring more than `margin` below the class average.
pub fn at_risk_students(dataset: &Dataset, column: NumericColumn, margin: f64) -> Result<Vec<&StudentRecord>> {
    let cutoff = class_average(dataset, column)? - margin;
    Ok(dataset
        .records()
        .iter()
        .filter(|r| column.value(r).is_some_and(|v| v < cutoff))
        .collect())
}

fn by_value(a: Option<f64>, b: Option<f64>, ascending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if ascending => x.total_cmp(&y),
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The first `n` records ordered by `column`; ties keep upload order.
pub fn ranked_top_n(
    dataset: &Dataset,
    column: NumericColumn,
    n: usize,
    ascending: bool,
) -> Result<Vec<&StudentRecord>> {
    schema::require_columns(dataset, &[column.name()])?;
    let mut ranked: Vec<&StudentRecord> = dataset.records().iter().collect();
    ranked.sort_by(|a, b| by_value(column.value(a), column.value(b), ascending));
    ranked.truncate(n);
    Ok(ranked)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAverage {
    pub subject: String,
    pub average: f64,
}

/// Mean of `column` per subject, highest first. Equal means keep the
/// alphabetical order of their subjects.
pub fn subject_averages(dataset: &Dataset, column: NumericColumn) -> Result<Vec<SubjectAverage>> {
    schema::require_columns(dataset, &[schema::SUBJECT, column.name()])?;

    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in dataset.records() {
        if let Some(value) = column.value(record) {
            groups.entry(record.subject.as_str()).or_default().push(value);
        }
    }

    let mut averages: Vec<SubjectAverage> = groups
        .into_iter()
        .filter_map(|(subject, values)| {
            mean(&values).map(|average| SubjectAverage { subject: subject.to_string(), average })
        })
        .collect();
    averages.sort_by(|a, b| b.average.total_cmp(&a.average));
    Ok(averages)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AttendanceBucket {
    Low,
    Medium,
    High,
}

impl AttendanceBucket {
    pub const ALL: [AttendanceBucket; 3] = [AttendanceBucket::Low, AttendanceBucket::Medium, AttendanceBucket::High];

    pub fn label(self) -> &'static str {
        match self {
            AttendanceBucket::Low => "Low (<60%)",
            AttendanceBucket::Medium => "Medium (60-80%)",
            AttendanceBucket::High => "High (>=80%)",
        }
    }
}

/// Rates below 0 fall into `Low` and rates above 100 into `High`.
pub fn attendance_bucket(rate: f64) -> AttendanceBucket {
    if rate >= HIGH_ATTENDANCE_LIMIT {
        AttendanceBucket::High
    } else if rate >= LOW_ATTENDANCE_LIMIT {
        AttendanceBucket::Medium
    } else {
        AttendanceBucket::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub bucket: AttendanceBucket,
    pub label: &'static str,
    pub count: usize,
}

/// Records per attendance bucket in Low, Medium, High order, empty buckets included.
pub fn attendance_distribution(dataset: &Dataset) -> Result<Vec<BucketCount>> {
    let rates = column_values(dataset, NumericColumn::AttendanceRate)?;
    Ok(AttendanceBucket::ALL
        .into_iter()
        .map(|bucket| BucketCount {
            bucket,
            label: bucket.label(),
            count: rates.iter().filter(|&&rate| attendance_bucket(rate) == bucket).count(),
        })
        .collect())
}

pub fn low_attendance_students(dataset: &Dataset) -> Result<Vec<&StudentRecord>> {
    schema::require_columns(dataset, &[schema::ATTENDANCE_RATE])?;
    Ok(dataset
        .records()
        .iter()
        .filter(|r| r.attendance_rate.is_some_and(|rate| attendance_bucket(rate) == AttendanceBucket::Low))
        .collect())
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: NumericColumn,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

/// Summaries for every numeric column the dataset carries with at least one value.
pub fn describe(dataset: &Dataset) -> Vec<ColumnSummary> {
    NumericColumn::ALL
        .into_iter()
        .filter(|column| dataset.has_column(column.name()))
        .filter_map(|column| {
            let mut values: Vec<f64> = dataset.records().iter().filter_map(|r| column.value(r)).collect();
            let average = mean(&values)?;
            values.sort_by(f64::total_cmp);
            let count = values.len();
            let std = (count > 1).then(|| {
                let sum_sq: f64 = values.iter().map(|v| (v - average).powi(2)).sum();
                (sum_sq / (count - 1) as f64).sqrt()
            });
            Some(ColumnSummary {
                column,
                count,
                mean: average,
                std,
                min: values[0],
                q25: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q75: quantile(&values, 0.75),
                max: values[count - 1],
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

pub fn risk_score(attendance_rate: f64, previous_grade: f64, study_hours: f64) -> f64 {
    (100.0 - attendance_rate) * 0.4 + (100.0 - previous_grade) * 0.4 + (5.0 - study_hours) * 4.0
}

pub fn risk_level(score: f64) -> RiskLevel {
    if score <= 50.0 {
        RiskLevel::Low
    } else if score <= 100.0 {
        RiskLevel::Moderate
    } else if score <= 150.0 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFlag {
    pub name: String,
    pub attendance_rate: Option<f64>,
    pub previous_grade: Option<f64>,
    pub study_hours: Option<f64>,
    /// Absent when any of the three inputs is missing.
    pub risk_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
}

/// Students with low attendance, a failing grade or too few study hours,
/// riskiest first.
pub fn risk_alerts(dataset: &Dataset) -> Result<Vec<RiskFlag>> {
    schema::require_columns(dataset, &[schema::ATTENDANCE_RATE, schema::PREVIOUS_GRADE, schema::STUDY_HOURS])?;

    let mut flags: Vec<RiskFlag> = dataset
        .records()
        .iter()
        .filter(|r| {
            r.attendance_rate.is_some_and(|v| v < RISK_ATTENDANCE_LIMIT)
                || r.previous_grade.is_some_and(|v| v < RISK_GRADE_LIMIT)
                || r.study_hours.is_some_and(|v| v < RISK_STUDY_HOURS_LIMIT)
        })
        .map(|r| {
            let score = match (r.attendance_rate, r.previous_grade, r.study_hours) {
                (Some(a), Some(g), Some(h)) => Some(risk_score(a, g, h)),
                _ => None,
            };
            RiskFlag {
                name: r.name.clone(),
                attendance_rate: r.attendance_rate,
                previous_grade: r.previous_grade,
                study_hours: r.study_hours,
                risk_score: score,
                risk_level: score.map(risk_level),
            }
        })
        .collect();
    flags.sort_by(|a, b| by_value(a.risk_score, b.risk_score, false));
    Ok(flags)
}
