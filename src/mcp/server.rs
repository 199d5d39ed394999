//! NutriCheck MCP Server Implementation
//!
//! Implements the MCP server with all NutriCheck tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::Database;
use crate::health::{ActivityLevel, AnthropometricProfile, Condition, Gender, RangeGender};
use crate::models::{
    MeasurementCreate, MicronutrientCreate, MicronutrientUpdate, ProfileUpdate,
    RecommendationCreate, RecommendationUpdate, SurveyQuestionCreate, SurveyQuestionUpdate,
};
use crate::tools::status::StatusTracker;
use crate::tools::{measurements, profile, recommendations, reference, survey, ToolError};

/// NutriCheck MCP Service
#[derive(Clone)]
pub struct NutriCheckService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    tool_router: ToolRouter<NutriCheckService>,
}

impl NutriCheckService {
    pub fn new(database_path: PathBuf, database: Database) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path))),
            database,
            tool_router: Self::tool_router(),
        }
    }
}

fn tool_error(e: ToolError) -> McpError {
    match e {
        ToolError::Invalid(msg) => McpError::invalid_params(msg, None),
        ToolError::Internal(msg) => McpError::internal_error(msg, None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn not_found(what: &str, id: i64) -> Result<CallToolResult, McpError> {
    let json = format!(r#"{{"error": "{} not found", "id": {}}}"#, what, id);
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn parse_opt<T>(value: Option<&str>, field: &str, parse: fn(&str) -> Option<T>) -> Result<Option<T>, McpError> {
    value
        .map(|s| parse(s).ok_or_else(|| McpError::invalid_params(format!("Invalid {}: '{}'", field, s), None)))
        .transpose()
}

fn parse_req<T>(value: &str, field: &str, parse: fn(&str) -> Option<T>) -> Result<T, McpError> {
    parse(value).ok_or_else(|| McpError::invalid_params(format!("Invalid {}: '{}'", field, value), None))
}

// ============================================================================
// Profile Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UserParams {
    /// Id of the user the request is about
    pub user_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpsertProfileParams {
    pub user_id: String,
    pub full_name: Option<String>,
    pub age: Option<u32>,
    /// male, female or other
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    /// sedentary, light, moderate, high or extreme
    pub activity_level: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CalculateMetricsParams {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
}

// ============================================================================
// Survey Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListQuestionsParams {
    #[serde(default = "default_true")]
    pub active_only: bool,
}

fn default_true() -> bool { true }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AnswerQuestionParams {
    pub user_id: String,
    pub question_id: i64,
    /// yes, sometimes or no
    pub answer: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListResultsParams {
    pub user_id: String,
    pub limit: Option<i64>,
}

// ============================================================================
// Measurement Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddMeasurementParams {
    pub user_id: String,
    pub micronutrient_id: i64,
    pub value: f64,
    /// YYYY-MM-DD, defaults to today
    pub measured_at: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMeasurementsParams {
    pub user_id: String,
    pub micronutrient_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteMeasurementParams {
    pub user_id: String,
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetRecommendationsParams {
    pub user_id: String,
    pub limit: Option<usize>,
}

// ============================================================================
// Admin Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AdminParams {
    /// Id of the admin performing the action
    pub actor_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AdminDeleteParams {
    pub actor_id: String,
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddMicronutrientParams {
    pub actor_id: String,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub normal_min: f64,
    pub normal_max: f64,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    /// male, female or both
    pub gender: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMicronutrientParams {
    pub actor_id: String,
    pub id: i64,
    pub code: Option<String>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub normal_min: Option<f64>,
    pub normal_max: Option<f64>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub gender: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddQuestionParams {
    pub actor_id: String,
    pub question_number: i64,
    pub question_text: String,
    /// Nutrient codes this question counts toward
    pub nutrient_mapping: Vec<String>,
    pub order_index: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateQuestionParams {
    pub actor_id: String,
    pub id: i64,
    pub question_number: Option<i64>,
    pub question_text: Option<String>,
    pub nutrient_mapping: Option<Vec<String>>,
    pub order_index: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListRecommendationsParams {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddRecommendationParams {
    pub actor_id: String,
    pub micronutrient_id: i64,
    /// low, normal or high
    pub condition: String,
    pub title: String,
    pub content: String,
    /// 1 (lowest) to 5 (critical), default 3
    pub priority: Option<u8>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateRecommendationParams {
    pub actor_id: String,
    pub id: i64,
    pub micronutrient_id: Option<i64>,
    pub condition: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<u8>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetUserRoleParams {
    pub actor_id: String,
    pub user_id: String,
    /// user or admin
    pub role: String,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl NutriCheckService {
    // --- Status ---

    #[tool(description = "Get the current status of the NutriCheck service including build info, database status, and process information")]
    async fn nutricheck_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        json_result(&status)
    }

    #[tool(description = "Get instructions for running the deficiency survey, entering lab results and reading recommendations. Call this at the start of a session.")]
    fn survey_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::SURVEY_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(SURVEY_INSTRUCTIONS)]))
    }

    // --- Profile ---

    #[tool(description = "Get a user's profile with BMI, BMR and TDEE")]
    fn get_profile(&self, Parameters(p): Parameters<UserParams>) -> Result<CallToolResult, McpError> {
        match profile::get_profile(&self.database, &p.user_id).map_err(tool_error)? {
            Some(resp) => json_result(&resp),
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                r#"{{"error": "Profile not found", "user_id": {:?}}}"#,
                p.user_id
            ))])),
        }
    }

    #[tool(description = "Create or update a user's profile. Only the fields given are changed.")]
    fn upsert_profile(&self, Parameters(p): Parameters<UpsertProfileParams>) -> Result<CallToolResult, McpError> {
        let data = ProfileUpdate {
            full_name: p.full_name,
            age: p.age,
            gender: parse_opt(p.gender.as_deref(), "gender", Gender::from_str)?,
            height_cm: p.height_cm,
            weight_kg: p.weight_kg,
            activity_level: parse_opt(p.activity_level.as_deref(), "activity_level", ActivityLevel::from_str)?,
        };
        let result = profile::upsert_profile(&self.database, &p.user_id, &data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Get BMI, BMR (Mifflin-St Jeor), TDEE and BMI category from a user's stored profile")]
    fn get_health_metrics(&self, Parameters(p): Parameters<UserParams>) -> Result<CallToolResult, McpError> {
        let result = profile::get_health_metrics(&self.database, &p.user_id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Calculate BMI, BMR, TDEE and BMI category for the given values without storing anything")]
    fn calculate_health_metrics(&self, Parameters(p): Parameters<CalculateMetricsParams>) -> Result<CallToolResult, McpError> {
        let inputs = AnthropometricProfile {
            height_cm: p.height_cm,
            weight_kg: p.weight_kg,
            age_years: p.age,
            gender: parse_opt(p.gender.as_deref(), "gender", Gender::from_str)?,
            activity_level: parse_opt(p.activity_level.as_deref(), "activity_level", ActivityLevel::from_str)?,
        };
        json_result(&profile::calculate_health_metrics(inputs))
    }

    // --- Survey ---

    #[tool(description = "List survey questions in survey order")]
    fn list_survey_questions(&self, Parameters(p): Parameters<ListQuestionsParams>) -> Result<CallToolResult, McpError> {
        let result = survey::list_survey_questions(&self.database, p.active_only).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Record a user's answer (yes, sometimes, no) to a survey question. Returns progress and the next unanswered question.")]
    fn answer_survey_question(&self, Parameters(p): Parameters<AnswerQuestionParams>) -> Result<CallToolResult, McpError> {
        let result = survey::answer_survey_question(&self.database, &p.user_id, p.question_id, &p.answer)
            .map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Show how many survey questions a user has answered and which comes next")]
    fn get_survey_progress(&self, Parameters(p): Parameters<UserParams>) -> Result<CallToolResult, McpError> {
        let result = survey::get_survey_progress(&self.database, &p.user_id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Score the user's answers and store per-nutrient deficiency levels. An incomplete survey is not stored; the missing questions are returned instead.")]
    fn submit_survey(&self, Parameters(p): Parameters<UserParams>) -> Result<CallToolResult, McpError> {
        let result = survey::submit_survey(&self.database, &p.user_id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Discard a user's pending survey answers")]
    fn reset_survey(&self, Parameters(p): Parameters<UserParams>) -> Result<CallToolResult, McpError> {
        let result = survey::reset_survey(&self.database, &p.user_id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List a user's stored survey results, newest first (default 10 rows)")]
    fn list_survey_results(&self, Parameters(p): Parameters<ListResultsParams>) -> Result<CallToolResult, McpError> {
        let result = survey::list_survey_results(&self.database, &p.user_id, p.limit).map_err(tool_error)?;
        json_result(&result)
    }

    // --- Lab Results ---

    #[tool(description = "Record a lab result for a micronutrient")]
    fn add_measurement(&self, Parameters(p): Parameters<AddMeasurementParams>) -> Result<CallToolResult, McpError> {
        let data = MeasurementCreate {
            micronutrient_id: p.micronutrient_id,
            value: p.value,
            measured_at: p.measured_at,
            notes: p.notes,
        };
        let result = measurements::add_measurement(&self.database, &p.user_id, &data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List a user's lab results, newest first, optionally for one micronutrient")]
    fn list_measurements(&self, Parameters(p): Parameters<ListMeasurementsParams>) -> Result<CallToolResult, McpError> {
        let result = measurements::list_measurements(&self.database, &p.user_id, p.micronutrient_id)
            .map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Delete one of a user's lab results")]
    fn delete_measurement(&self, Parameters(p): Parameters<DeleteMeasurementParams>) -> Result<CallToolResult, McpError> {
        let result = measurements::delete_measurement(&self.database, &p.user_id, p.id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Classify the newest lab value per micronutrient as low, normal or high against the range for the user's age and gender")]
    fn get_lab_status(&self, Parameters(p): Parameters<UserParams>) -> Result<CallToolResult, McpError> {
        let result = measurements::get_lab_status(&self.database, &p.user_id).map_err(tool_error)?;
        json_result(&result)
    }

    // --- Recommendations ---

    #[tool(description = "Get recommendations matching the user's latest survey and lab findings, highest priority first (max 20)")]
    fn get_recommendations(&self, Parameters(p): Parameters<GetRecommendationsParams>) -> Result<CallToolResult, McpError> {
        let result = recommendations::get_recommendations(&self.database, &p.user_id, p.limit).map_err(tool_error)?;
        json_result(&result)
    }

    // --- Reference Data ---

    #[tool(description = "List all micronutrients with units and normal ranges")]
    fn list_micronutrients(&self) -> Result<CallToolResult, McpError> {
        let result = reference::list_micronutrients(&self.database).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Admin: add a micronutrient reference range")]
    fn add_micronutrient(&self, Parameters(p): Parameters<AddMicronutrientParams>) -> Result<CallToolResult, McpError> {
        let data = MicronutrientCreate {
            code: p.code,
            name: p.name,
            unit: p.unit,
            normal_min: p.normal_min,
            normal_max: p.normal_max,
            age_min: p.age_min,
            age_max: p.age_max,
            gender: parse_opt(p.gender.as_deref(), "gender", RangeGender::from_str)?,
            description: p.description,
        };
        let result = reference::add_micronutrient(&self.database, &p.actor_id, &data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Admin: update a micronutrient reference range")]
    fn update_micronutrient(&self, Parameters(p): Parameters<UpdateMicronutrientParams>) -> Result<CallToolResult, McpError> {
        let data = MicronutrientUpdate {
            code: p.code,
            name: p.name,
            unit: p.unit,
            normal_min: p.normal_min,
            normal_max: p.normal_max,
            age_min: p.age_min,
            age_max: p.age_max,
            gender: parse_opt(p.gender.as_deref(), "gender", RangeGender::from_str)?,
            description: p.description,
        };
        match reference::update_micronutrient(&self.database, &p.actor_id, p.id, &data).map_err(tool_error)? {
            Some(m) => json_result(&m),
            None => not_found("Micronutrient", p.id),
        }
    }

    #[tool(description = "Admin: delete a micronutrient. Its lab results and recommendations are deleted with it.")]
    fn delete_micronutrient(&self, Parameters(p): Parameters<AdminDeleteParams>) -> Result<CallToolResult, McpError> {
        let result = reference::delete_micronutrient(&self.database, &p.actor_id, p.id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Admin: add a survey question mapped to one or more nutrient codes")]
    fn add_survey_question(&self, Parameters(p): Parameters<AddQuestionParams>) -> Result<CallToolResult, McpError> {
        let data = SurveyQuestionCreate {
            question_number: p.question_number,
            question_text: p.question_text,
            nutrient_mapping: p.nutrient_mapping,
            order_index: p.order_index,
            is_active: p.is_active,
        };
        let result = reference::add_survey_question(&self.database, &p.actor_id, &data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Admin: update a survey question")]
    fn update_survey_question(&self, Parameters(p): Parameters<UpdateQuestionParams>) -> Result<CallToolResult, McpError> {
        let data = SurveyQuestionUpdate {
            question_number: p.question_number,
            question_text: p.question_text,
            nutrient_mapping: p.nutrient_mapping,
            order_index: p.order_index,
            is_active: p.is_active,
        };
        match reference::update_survey_question(&self.database, &p.actor_id, p.id, &data).map_err(tool_error)? {
            Some(q) => json_result(&q),
            None => not_found("Survey question", p.id),
        }
    }

    #[tool(description = "Admin: delete a survey question and any pending answers to it")]
    fn delete_survey_question(&self, Parameters(p): Parameters<AdminDeleteParams>) -> Result<CallToolResult, McpError> {
        let result = reference::delete_survey_question(&self.database, &p.actor_id, p.id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List recommendations with their micronutrient, highest priority first")]
    fn list_recommendations(&self, Parameters(p): Parameters<ListRecommendationsParams>) -> Result<CallToolResult, McpError> {
        let result = reference::list_recommendations(&self.database, p.active_only).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Admin: add a recommendation for a micronutrient and condition (low, normal, high)")]
    fn add_recommendation(&self, Parameters(p): Parameters<AddRecommendationParams>) -> Result<CallToolResult, McpError> {
        let data = RecommendationCreate {
            micronutrient_id: p.micronutrient_id,
            condition: parse_req(&p.condition, "condition", Condition::from_str)?,
            title: p.title,
            content: p.content,
            priority: p.priority,
            is_active: p.is_active,
        };
        let result = reference::add_recommendation(&self.database, &p.actor_id, &data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Admin: update a recommendation")]
    fn update_recommendation(&self, Parameters(p): Parameters<UpdateRecommendationParams>) -> Result<CallToolResult, McpError> {
        let data = RecommendationUpdate {
            micronutrient_id: p.micronutrient_id,
            condition: parse_opt(p.condition.as_deref(), "condition", Condition::from_str)?,
            title: p.title,
            content: p.content,
            priority: p.priority,
            is_active: p.is_active,
        };
        match reference::update_recommendation(&self.database, &p.actor_id, p.id, &data).map_err(tool_error)? {
            Some(r) => json_result(&r),
            None => not_found("Recommendation", p.id),
        }
    }

    #[tool(description = "Admin: delete a recommendation")]
    fn delete_recommendation(&self, Parameters(p): Parameters<AdminDeleteParams>) -> Result<CallToolResult, McpError> {
        let result = reference::delete_recommendation(&self.database, &p.actor_id, p.id).map_err(tool_error)?;
        json_result(&result)
    }

    // --- Users ---

    #[tool(description = "Admin: list all user profiles")]
    fn list_users(&self, Parameters(p): Parameters<AdminParams>) -> Result<CallToolResult, McpError> {
        let result = reference::list_users(&self.database, &p.actor_id).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Admin: set a user's role (user or admin)")]
    fn set_user_role(&self, Parameters(p): Parameters<SetUserRoleParams>) -> Result<CallToolResult, McpError> {
        let result = reference::set_user_role(&self.database, &p.actor_id, &p.user_id, &p.role).map_err(tool_error)?;
        json_result(&result)
    }
}

#[tool_handler]
impl ServerHandler for NutriCheckService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nutricheck".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("NutriCheck".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "NutriCheck - Micronutrient deficiency screening and health metrics. \
                 IMPORTANT: Call survey_instructions first. \
                 Profile: get_profile, upsert_profile, get_health_metrics, calculate_health_metrics. \
                 Survey: list_survey_questions, answer_survey_question, get_survey_progress, submit_survey, reset_survey, list_survey_results. \
                 Labs: list_micronutrients, add/list/delete_measurement, get_lab_status. \
                 Advice: get_recommendations. \
                 Admin (actor_id must be an admin): add/update/delete_micronutrient, add/update/delete_survey_question, \
                 list/add/update/delete_recommendation, list_users, set_user_role. \
                 Status: nutricheck_status."
                    .into(),
            ),
        }
    }
}
