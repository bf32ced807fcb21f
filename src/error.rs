//! Error type shared by every stage of the dashboard pipeline.
//!
//! Each variant is recoverable at the boundary: the HTTP layer turns it into
//! a status code, the report assembler turns it into a failed panel.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("The required column '{0}' was not found in the uploaded file.")]
    Schema(String),

    #[error("The dataset has no rows with values to aggregate.")]
    EmptyDataset,

    #[error("At least {required} rows are needed to fit the prediction model, but only {found} were provided.")]
    InsufficientData { found: usize, required: usize },

    #[error("The uploaded rows do not determine a unique regression fit.")]
    DegenerateModel,

    #[error("No {kind} named '{value}' exists in the dataset.")]
    UnknownSelection { kind: &'static str, value: String },

    #[error("Row {row} has no value in the required column '{column}'.")]
    MissingValue { column: String, row: usize },

    #[error("Row {row} holds a non-finite number in column '{column}'.")]
    NonFiniteValue { column: String, row: usize },

    #[error("The '{0}' feature must be a finite number.")]
    NonFiniteFeature(&'static str),

    #[error("Unsupported file format '{0}'. Use csv, xlsx, json or bin.")]
    UnsupportedFormat(String),

    #[error("Malformed JSON table: {0}")]
    MalformedTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Binary table error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Linear algebra failure: {0}")]
    Linalg(#[from] linfa_linalg::LinalgError),

    #[error("Model error: {0}")]
    Linfa(#[from] linfa::Error),

    #[error("Noise distribution is invalid: {0}")]
    Distribution(#[from] rand_distr::NormalError),
}

impl DashboardError {
    pub fn unknown_student(name: &str) -> Self {
        Self::UnknownSelection { kind: "student", value: name.to_string() }
    }

    pub fn unknown_subject(subject: &str) -> Self {
        Self::UnknownSelection { kind: "subject", value: subject.to_string() }
    }

    /// True for the errors caused by what the user uploaded or selected,
    /// as opposed to I/O or internal failures.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Linalg(_) | Self::Linfa(_) | Self::Distribution(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_errors_name_the_missing_value() {
        let err = DashboardError::unknown_student("Tanvi Shah");
        assert_eq!(err.to_string(), "No student named 'Tanvi Shah' exists in the dataset.");
        assert!(err.is_user_error());
    }

    #[test]
    fn io_errors_are_not_user_errors() {
        let err = DashboardError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!err.is_user_error());
    }
}
