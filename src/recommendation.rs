//! Learning-path advice from a single grade.

use serde::Serialize;

/// Grades below this must revise the topic.
pub const REVISE_BELOW: f64 = 50.0;
/// Grades at or above this proceed to the next subject.
pub const PROCEED_FROM: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RecommendationBand {
    MustRevise,
    OptionalRevision,
    Proceed,
}

impl RecommendationBand {
    pub fn message(self) -> &'static str {
        match self {
            RecommendationBand::MustRevise => "Revise the topic.",
            RecommendationBand::OptionalRevision => "Optional revision recommended.",
            RecommendationBand::Proceed => "Proceed to the next subject.",
        }
    }
}

/// Total over all reals; a NaN grade is treated as failing.
pub fn recommend(grade: f64) -> RecommendationBand {
    if grade >= PROCEED_FROM {
        RecommendationBand::Proceed
    } else if grade >= REVISE_BELOW {
        RecommendationBand::OptionalRevision
    } else {
        RecommendationBand::MustRevise
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningPath {
    pub student: String,
    pub grade: f64,
    pub band: RecommendationBand,
    pub message: &'static str,
}

impl LearningPath {
    pub fn for_grade(student: &str, grade: f64) -> Self {
        let band = recommend(grade);
        Self { student: student.to_string(), grade, band, message: band.message() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_belong_to_the_higher_band() {
        assert_eq!(recommend(49.9), RecommendationBand::MustRevise);
        assert_eq!(recommend(50.0), RecommendationBand::OptionalRevision);
        assert_eq!(recommend(69.9), RecommendationBand::OptionalRevision);
        assert_eq!(recommend(70.0), RecommendationBand::Proceed);
    }

    #[test]
    fn extremes() {
        assert_eq!(recommend(f64::NEG_INFINITY), RecommendationBand::MustRevise);
        assert_eq!(recommend(-10.0), RecommendationBand::MustRevise);
        assert_eq!(recommend(250.0), RecommendationBand::Proceed);
        assert_eq!(recommend(f64::NAN), RecommendationBand::MustRevise);
    }

    #[test]
    fn learning_path_carries_the_message() {
        let path = LearningPath::for_grade("Tanvi Shah", 67.0);
        assert_eq!(path.band, RecommendationBand::OptionalRevision);
        assert_eq!(path.message, "Optional revision recommended.");
    }
}
