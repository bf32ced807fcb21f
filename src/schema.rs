//! Column names, the column guide shown before upload, and resolution of
//! the primary score column.

use log::debug;
use serde::Serialize;

use crate::data::{Dataset, StudentRecord};
use crate::error::{DashboardError, Result};

pub const STUDENT_ID: &str = "StudentID";
pub const NAME: &str = "Name";
pub const GENDER: &str = "Gender";
pub const ATTENDANCE_RATE: &str = "AttendanceRate";
pub const STUDY_HOURS: &str = "StudyHours";
pub const PREVIOUS_GRADE: &str = "PreviousGrade";
pub const SUBJECT: &str = "subject";
pub const EXAM_TYPE: &str = "exam_type";
pub const MARKS: &str = "marks";

/// The numeric columns a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NumericColumn {
    #[serde(rename = "AttendanceRate")]
    AttendanceRate,
    #[serde(rename = "StudyHours")]
    StudyHours,
    #[serde(rename = "PreviousGrade")]
    PreviousGrade,
    #[serde(rename = "marks")]
    Marks,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 4] = [
        NumericColumn::AttendanceRate,
        NumericColumn::StudyHours,
        NumericColumn::PreviousGrade,
        NumericColumn::Marks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::AttendanceRate => ATTENDANCE_RATE,
            NumericColumn::StudyHours => STUDY_HOURS,
            NumericColumn::PreviousGrade => PREVIOUS_GRADE,
            NumericColumn::Marks => MARKS,
        }
    }

    pub fn value(self, record: &StudentRecord) -> Option<f64> {
        match self {
            NumericColumn::AttendanceRate => record.attendance_rate,
            NumericColumn::StudyHours => record.study_hours,
            NumericColumn::PreviousGrade => record.previous_grade,
            NumericColumn::Marks => record.marks,
        }
    }
}

/// Picks the column every ranking and average runs on: `marks` for exam
/// result uploads, `PreviousGrade` for grade-only uploads.
pub fn resolve_score_column(dataset: &Dataset) -> Result<NumericColumn> {
    let column = if dataset.has_column(MARKS) {
        NumericColumn::Marks
    } else if dataset.has_column(PREVIOUS_GRADE) {
        NumericColumn::PreviousGrade
    } else {
        return Err(DashboardError::Schema(format!("{} or {}", MARKS, PREVIOUS_GRADE)));
    };
    debug!("Resolved primary score column to '{}'", column.name());
    Ok(column)
}

/// Fails on the first of `columns` the dataset does not carry.
pub fn require_columns(dataset: &Dataset, columns: &[&str]) -> Result<()> {
    match columns.iter().find(|c| !dataset.has_column(c)) {
        Some(missing) => Err(DashboardError::Schema(missing.to_string())),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnGuide {
    pub name: &'static str,
    pub data_type: &'static str,
    pub description: &'static str,
}

pub const COLUMN_GUIDE: [ColumnGuide; 9] = [
    ColumnGuide { name: STUDENT_ID, data_type: "STRING", description: "Unique ID, e.g., S001" },
    ColumnGuide { name: NAME, data_type: "STRING", description: "Student name, e.g., Tanvi Shah" },
    ColumnGuide { name: GENDER, data_type: "STRING", description: "Male / Female / Other" },
    ColumnGuide { name: ATTENDANCE_RATE, data_type: "FLOAT (0-100)", description: "Attendance %, e.g., 85.5" },
    ColumnGuide { name: STUDY_HOURS, data_type: "FLOAT", description: "Avg. study hours per week, e.g., 4.5" },
    ColumnGuide { name: PREVIOUS_GRADE, data_type: "FLOAT", description: "Previous grade, e.g., 67" },
    ColumnGuide { name: SUBJECT, data_type: "STRING", description: "Subject name, e.g., Mathematics" },
    ColumnGuide { name: EXAM_TYPE, data_type: "STRING", description: "Exam type, e.g., Unit Test" },
    ColumnGuide { name: MARKS, data_type: "FLOAT (0-100)", description: "Marks obtained, e.g., 78" },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with(columns: &[&str]) -> Dataset {
        Dataset::new(columns.iter().map(|c| c.to_string()).collect(), Vec::new()).unwrap()
    }

    #[test]
    fn marks_wins_over_previous_grade() {
        let dataset = dataset_with(&[NAME, PREVIOUS_GRADE, MARKS]);
        assert_eq!(resolve_score_column(&dataset).unwrap(), NumericColumn::Marks);
    }

    #[test]
    fn falls_back_to_previous_grade() {
        let dataset = dataset_with(&[NAME, PREVIOUS_GRADE]);
        assert_eq!(resolve_score_column(&dataset).unwrap(), NumericColumn::PreviousGrade);
    }

    #[test]
    fn no_score_column_is_a_schema_error() {
        let dataset = dataset_with(&[NAME, ATTENDANCE_RATE]);
        assert!(matches!(resolve_score_column(&dataset), Err(DashboardError::Schema(_))));
    }

    #[test]
    fn require_columns_reports_the_first_gap() {
        let dataset = dataset_with(&[NAME, STUDY_HOURS]);
        assert!(require_columns(&dataset, &[NAME, STUDY_HOURS]).is_ok());
        let err = require_columns(&dataset, &[STUDY_HOURS, ATTENDANCE_RATE, SUBJECT]).unwrap_err();
        assert!(matches!(err, DashboardError::Schema(col) if col == ATTENDANCE_RATE));
    }

    #[test]
    fn guide_lists_every_expected_column() {
        let names: Vec<&str> = COLUMN_GUIDE.iter().map(|g| g.name).collect();
        assert_eq!(names.len(), 9);
        assert!(names.contains(&MARKS));
    }
}
