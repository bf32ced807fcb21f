pub mod analytics;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod model;
pub mod recommendation;
pub mod schema;

pub use config::Config;
pub use dashboard::{build_report, DashboardQuery, DashboardReport, Panel};
pub use data::{load_bytes, load_path, Dataset, FileFormat, StudentRecord};
pub use error::{DashboardError, Result};
pub use model::{predict_score, Prediction, StudentFeatures, TrainedModel};
pub use recommendation::{recommend, RecommendationBand};
pub use schema::{resolve_score_column, NumericColumn};
