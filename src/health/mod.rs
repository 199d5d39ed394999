//! Health calculation module
//!
//! Pure scoring and metric logic. Nothing here touches the database.

pub mod labs;
pub mod metrics;
pub mod recommendations;
pub mod survey;

pub use labs::{classify_measurement, latest_by_micronutrient, Condition, LabReading, RangeGender, ReferenceRange};
pub use metrics::{
    calculate as calculate_metrics, ActivityLevel, AnthropometricProfile, BmiCategory, Gender,
    HealthMetrics,
};
pub use recommendations::{
    collect_findings, select as select_recommendations, Candidate, Finding, FindingSource,
    PriorityBand, DEFAULT_RECOMMENDATION_LIMIT,
};
pub use survey::{
    normalize_nutrient_code, score_survey, Answer, AnswerChoice, DeficiencyLevel, MissingAnswer,
    Question, SurveyError, SurveyResult,
};
