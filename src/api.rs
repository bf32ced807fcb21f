//! JSON service. Every upload is parsed per request; nothing is shared
//! between requests except the read-only `Config`.

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::dashboard::{self, DashboardQuery};
use crate::data::{self, Dataset, FileFormat};
use crate::error::DashboardError;
use crate::model;
use crate::recommendation::{recommend, RecommendationBand};
use crate::schema::COLUMN_GUIDE;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for DashboardError {
    fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::UnknownSelection { .. } => StatusCode::NOT_FOUND,
            DashboardError::Schema(_)
            | DashboardError::EmptyDataset
            | DashboardError::InsufficientData { .. }
            | DashboardError::DegenerateModel
            | DashboardError::MissingValue { .. }
            | DashboardError::NonFiniteValue { .. }
            | DashboardError::NonFiniteFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::UnsupportedFormat(_)
            | DashboardError::MalformedTable(_)
            | DashboardError::Csv(_)
            | DashboardError::Json(_)
            | DashboardError::Xlsx(_)
            | DashboardError::Binary(_) => StatusCode::BAD_REQUEST,
            DashboardError::Io(_)
            | DashboardError::Config(_)
            | DashboardError::Linalg(_)
            | DashboardError::Linfa(_)
            | DashboardError::Distribution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody { error: self.to_string() })
    }
}

/// Query string shared by the upload endpoints.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default = "default_format")]
    pub format: FileFormat,
    pub student: Option<String>,
    pub subject: Option<String>,
    pub top_n: Option<usize>,
}

fn default_format() -> FileFormat {
    FileFormat::Csv
}

#[derive(Deserialize)]
struct RecommendRequest {
    grade: f64,
}

#[derive(Serialize)]
struct RecommendResponse {
    grade: f64,
    band: RecommendationBand,
    message: &'static str,
}

fn parse_upload(body: &[u8], format: FileFormat) -> Result<Dataset, DashboardError> {
    info!("Received {} byte upload as {:?}", body.len(), format);
    data::load_bytes(body, format)
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("Student Performance Dashboard is running!")
}

async fn column_guide() -> HttpResponse {
    HttpResponse::Ok().json(&COLUMN_GUIDE[..])
}

async fn dashboard_report(
    body: web::Bytes,
    query: web::Query<UploadQuery>,
    config: web::Data<Config>,
) -> Result<HttpResponse, DashboardError> {
    let query = query.into_inner();
    let dataset = parse_upload(&body, query.format)?;
    let report = dashboard::build_report(
        &dataset,
        &DashboardQuery {
            student: query.student,
            subject: query.subject,
            top_n: query.top_n.unwrap_or(config.ranking_size),
        },
    );
    Ok(HttpResponse::Ok().json(report))
}

async fn predict(body: web::Bytes, query: web::Query<UploadQuery>) -> Result<HttpResponse, DashboardError> {
    let dataset = parse_upload(&body, query.format)?;
    let student = match &query.student {
        Some(name) => name.as_str(),
        None => dataset.student_names().first().copied().ok_or(DashboardError::EmptyDataset)?,
    };
    let prediction = model::predict_for_student(&dataset, student)?;
    Ok(HttpResponse::Ok().json(prediction))
}

async fn recommendation(req: web::Json<RecommendRequest>) -> HttpResponse {
    let band = recommend(req.grade);
    HttpResponse::Ok().json(RecommendResponse { grade: req.grade, band, message: band.message() })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/columns", web::get().to(column_guide))
        .route("/dashboard", web::post().to(dashboard_report))
        .route("/predict", web::post().to(predict))
        .route("/recommend", web::post().to(recommendation));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_errors_are_not_found() {
        assert_eq!(DashboardError::unknown_subject("Art").status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn data_shape_errors_are_unprocessable() {
        assert_eq!(DashboardError::EmptyDataset.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            DashboardError::InsufficientData { found: 1, required: 3 }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn parse_errors_are_bad_requests() {
        assert_eq!(DashboardError::UnsupportedFormat("txt".into()).status_code(), StatusCode::BAD_REQUEST);
    }
}
