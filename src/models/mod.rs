//! Data models
//!
//! Rust structs representing database entities.

mod measurement;
mod micronutrient;
mod profile;
mod recommendation;
mod survey_answer;
mod survey_question;
mod survey_result;

pub use measurement::{Measurement, MeasurementCreate};
pub use micronutrient::{Micronutrient, MicronutrientCreate, MicronutrientUpdate};
pub use profile::{ProfileUpdate, UserProfile, UserRole};
pub use recommendation::{
    Recommendation, RecommendationCreate, RecommendationUpdate, RecommendationWithNutrient,
};
pub use survey_answer::PendingAnswer;
pub use survey_question::{SurveyQuestion, SurveyQuestionCreate, SurveyQuestionUpdate};
pub use survey_result::StoredSurveyResult;
