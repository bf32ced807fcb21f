//! Score prediction: a linear regression trained on synthetic labels.
//!
//! Uploaded datasets carry no final-exam results, so training targets are
//! manufactured from the three features with a fixed formula plus seeded
//! Gaussian noise. The labels are a demonstration stand-in, not ground truth.
//! Fixing the seed makes the labels, and therefore the fitted coefficients,
//! reproducible for a given set of rows in a given order.

use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_linalg::svd::SVD;
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, StudentRecord};
use crate::error::{DashboardError, Result};
use crate::schema;

/// Seed for the label noise. Changing it changes every prediction.
pub const LABEL_SEED: u64 = 42;
pub const NOISE_STD_DEV: f64 = 5.0;

pub const LABEL_BASE: f64 = 50.0;
pub const ATTENDANCE_WEIGHT: f64 = 0.3;
pub const PREVIOUS_GRADE_WEIGHT: f64 = 0.4;
pub const STUDY_HOURS_WEIGHT: f64 = 3.0;

pub const FEATURE_COUNT: usize = 3;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Singular values at or below this fraction of the largest count as zero.
pub const RANK_TOLERANCE: f64 = 1e-10;

pub const LABEL_SOURCE: &str = "synthetic";

/// The regression inputs for one student.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudentFeatures {
    pub attendance_rate: f64,
    pub previous_grade: f64,
    pub study_hours: f64,
}

impl StudentFeatures {
    pub fn from_record(record: &StudentRecord, row: usize) -> Result<Self> {
        let require = |value: Option<f64>, column: &str| {
            value.ok_or_else(|| DashboardError::MissingValue { column: column.to_string(), row })
        };
        Ok(Self {
            attendance_rate: require(record.attendance_rate, schema::ATTENDANCE_RATE)?,
            previous_grade: require(record.previous_grade, schema::PREVIOUS_GRADE)?,
            study_hours: require(record.study_hours, schema::STUDY_HOURS)?,
        })
    }

    fn as_row(&self) -> [f64; FEATURE_COUNT] {
        [self.attendance_rate, self.previous_grade, self.study_hours]
    }

    fn ensure_finite(&self) -> Result<()> {
        let columns = [schema::ATTENDANCE_RATE, schema::PREVIOUS_GRADE, schema::STUDY_HOURS];
        match columns.into_iter().zip(self.as_row()).find(|(_, value)| !value.is_finite()) {
            Some((column, _)) => Err(DashboardError::NonFiniteFeature(column)),
            None => Ok(()),
        }
    }
}

fn feature_matrix(dataset: &Dataset) -> Result<Array2<f64>> {
    schema::require_columns(dataset, &[schema::ATTENDANCE_RATE, schema::PREVIOUS_GRADE, schema::STUDY_HOURS])?;
    let rows = dataset
        .records()
        .iter()
        .enumerate()
        .map(|(row, record)| StudentFeatures::from_record(record, row).map(|f| f.as_row()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Array2::from_shape_fn((rows.len(), FEATURE_COUNT), |(i, j)| rows[i][j]))
}

/// One clipped synthetic target per feature row, drawn in row order.
pub fn synthesize_labels(features: &Array2<f64>) -> Result<Array1<f64>> {
    let noise = Normal::new(0.0, NOISE_STD_DEV)?;
    let mut rng = StdRng::seed_from_u64(LABEL_SEED);
    Ok(Array1::from_iter(features.rows().into_iter().map(|row| {
        let signal = LABEL_BASE
            + ATTENDANCE_WEIGHT * row[0]
            + PREVIOUS_GRADE_WEIGHT * row[1]
            + STUDY_HOURS_WEIGHT * row[2];
        (signal + rng.sample(noise)).clamp(MIN_SCORE, MAX_SCORE)
    })))
}

/// Ordinary least squares with an intercept.
///
/// The coefficients come from the pseudo-inverse of the centred design, so a
/// constant feature or two collinear features still give a fit: the
/// minimum-norm one, with zero weight along directions the rows never vary in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquares;

#[derive(Debug, Clone, PartialEq)]
pub struct FittedLeastSquares {
    params: Array1<f64>,
    intercept: f64,
    rank: usize,
}

impl Fit<Array2<f64>, Array1<f64>, DashboardError> for LeastSquares {
    type Object = FittedLeastSquares;

    fn fit(&self, dataset: &DatasetBase<Array2<f64>, Array1<f64>>) -> Result<FittedLeastSquares> {
        let records = &dataset.records;
        let targets = &dataset.targets;
        let empty = || DashboardError::InsufficientData { found: 0, required: FEATURE_COUNT };
        let feature_means = records.mean_axis(Axis(0)).ok_or_else(empty)?;
        let target_mean = targets.mean().ok_or_else(empty)?;

        let centred = records - &feature_means;
        let centred_targets = targets - target_mean;
        let (u, sigma, vt) = match centred.svd(true, true)? {
            (Some(u), sigma, Some(vt)) => (u, sigma, vt),
            _ => return Err(DashboardError::DegenerateModel),
        };

        let cutoff = sigma.iter().copied().fold(0.0, f64::max) * RANK_TOLERANCE;
        let mut params = Array1::zeros(records.ncols());
        let mut rank = 0;
        for (i, &singular) in sigma.iter().enumerate() {
            if singular > cutoff {
                params.scaled_add(u.column(i).dot(&centred_targets) / singular, &vt.row(i));
                rank += 1;
            }
        }
        let intercept = target_mean - feature_means.dot(&params);
        Ok(FittedLeastSquares { params, intercept, rank })
    }
}

/// A regression fitted for one request and dropped afterwards.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    fitted: FittedLeastSquares,
    training_rows: usize,
}

impl TrainedModel {
    pub fn fit(dataset: &Dataset) -> Result<Self> {
        let features = feature_matrix(dataset)?;
        if features.nrows() < FEATURE_COUNT {
            return Err(DashboardError::InsufficientData { found: features.nrows(), required: FEATURE_COUNT });
        }

        let targets = synthesize_labels(&features)?;
        let training_rows = features.nrows();
        let fitted = LeastSquares.fit(&DatasetBase::new(features, targets))?;
        if !fitted.intercept.is_finite() || fitted.params.iter().any(|p| !p.is_finite()) {
            return Err(DashboardError::DegenerateModel);
        }
        if fitted.rank < FEATURE_COUNT {
            info!("Features span only {} of {} directions; using the minimum-norm fit", fitted.rank, FEATURE_COUNT);
        }

        debug!(
            "Fitted score model on {} rows: coefficients {:?}, intercept {:.4}",
            training_rows,
            fitted.params.as_slice(),
            fitted.intercept
        );
        Ok(Self { fitted, training_rows })
    }

    /// Attendance, previous grade and study hours weights, in that order.
    pub fn coefficients(&self) -> &Array1<f64> {
        &self.fitted.params
    }

    pub fn intercept(&self) -> f64 {
        self.fitted.intercept
    }

    /// Independent feature directions the training rows span.
    pub fn rank(&self) -> usize {
        self.fitted.rank
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Predicted score, clipped to the valid range. Non-finite features are rejected.
    pub fn predict(&self, student: &StudentFeatures) -> Result<f64> {
        student.ensure_finite()?;
        let raw = self.fitted.intercept + self.fitted.params.dot(&Array1::from(student.as_row().to_vec()));
        Ok(raw.clamp(MIN_SCORE, MAX_SCORE))
    }
}

/// Fits on `dataset` and scores `student`.
pub fn predict_score(dataset: &Dataset, student: &StudentFeatures) -> Result<f64> {
    student.ensure_finite()?;
    TrainedModel::fit(dataset)?.predict(student)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub student: String,
    pub features: StudentFeatures,
    pub predicted_score: f64,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub feature_rank: usize,
    pub training_rows: usize,
    pub label_source: &'static str,
}

/// Scores the first row belonging to `name`.
pub fn predict_for_student(dataset: &Dataset, name: &str) -> Result<Prediction> {
    let (row, record) = dataset
        .records()
        .iter()
        .enumerate()
        .find(|(_, r)| r.name == name)
        .ok_or_else(|| DashboardError::unknown_student(name))?;
    let features = StudentFeatures::from_record(record, row)?;
    let model = TrainedModel::fit(dataset)?;

    Ok(Prediction {
        student: name.to_string(),
        features,
        predicted_score: model.predict(&features)?,
        coefficients: model.coefficients().to_vec(),
        intercept: model.intercept(),
        feature_rank: model.rank(),
        training_rows: model.training_rows(),
        label_source: LABEL_SOURCE,
    })
}
