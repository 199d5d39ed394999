//! Deficiency survey tools
//!
//! Answers are collected one question at a time and scored on submit.

use rusqlite::TransactionBehavior;
use serde::Serialize;

use crate::db::{Database, DbError};
use crate::health::{score_survey, AnswerChoice, MissingAnswer, Question, SurveyError, SurveyResult};
use crate::models::{PendingAnswer, StoredSurveyResult, SurveyQuestion, UserProfile};

use super::{invalid, ToolResult};

/// Default number of stored result rows returned
pub const DEFAULT_RESULTS_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct QuestionSummary {
    pub id: i64,
    pub question_number: i64,
    pub question_text: String,
    pub nutrient_mapping: Vec<String>,
    pub is_active: bool,
}

impl From<SurveyQuestion> for QuestionSummary {
    fn from(q: SurveyQuestion) -> Self {
        Self {
            id: q.id,
            question_number: q.question_number,
            question_text: q.question_text,
            nutrient_mapping: q.nutrient_mapping,
            is_active: q.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListQuestionsResponse {
    pub questions: Vec<QuestionSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SurveyProgress {
    pub answered: usize,
    pub total: usize,
    pub is_complete: bool,
    /// First active question, in survey order, still without an answer
    pub next_question: Option<QuestionSummary>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub question_id: i64,
    pub answer: AnswerChoice,
    pub weight: u32,
    pub progress: SurveyProgress,
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub nutrient_code: String,
    pub score: u32,
    pub max_score: u32,
    pub percent: f64,
    pub level: String,
    pub level_display: String,
}

impl From<&SurveyResult> for ResultView {
    fn from(r: &SurveyResult) -> Self {
        Self {
            nutrient_code: r.nutrient_code.clone(),
            score: r.score,
            max_score: r.max_score,
            percent: r.percent,
            level: r.level.as_str().to_string(),
            level_display: r.level.display_name().to_string(),
        }
    }
}

/// Outcome of a submission; an incomplete survey is a state, not a fault
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitSurveyResponse {
    Completed {
        submission_id: i64,
        completed_at: String,
        results: Vec<ResultView>,
    },
    Incomplete {
        answered: usize,
        total: usize,
        missing: Vec<MissingAnswer>,
    },
}

#[derive(Debug, Serialize)]
pub struct StoredResultView {
    pub submission_id: i64,
    pub completed_at: String,
    #[serde(flatten)]
    pub result: ResultView,
}

#[derive(Debug, Serialize)]
pub struct ListResultsResponse {
    pub results: Vec<StoredResultView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub cleared_answers: usize,
}

pub fn list_survey_questions(db: &Database, active_only: bool) -> ToolResult<ListQuestionsResponse> {
    let conn = db.get_conn()?;
    let questions: Vec<QuestionSummary> = SurveyQuestion::list(&conn, active_only)?
        .into_iter()
        .map(QuestionSummary::from)
        .collect();
    let total = questions.len();
    Ok(ListQuestionsResponse { questions, total })
}

fn progress(conn: &rusqlite::Connection, user_id: &str) -> ToolResult<SurveyProgress> {
    let questions = SurveyQuestion::list(conn, true)?;
    let answers = PendingAnswer::answer_map(conn, user_id)?;

    let answered = questions
        .iter()
        .filter(|q| answers.contains_key(&q.id.to_string()))
        .count();
    let total = questions.len();
    let next_question = questions
        .into_iter()
        .find(|q| !answers.contains_key(&q.id.to_string()))
        .map(QuestionSummary::from);

    Ok(SurveyProgress {
        answered,
        total,
        is_complete: total > 0 && answered == total,
        next_question,
    })
}

pub fn get_survey_progress(db: &Database, user_id: &str) -> ToolResult<SurveyProgress> {
    let conn = db.get_conn()?;
    progress(&conn, user_id)
}

pub fn answer_survey_question(
    db: &Database,
    user_id: &str,
    question_id: i64,
    answer: &str,
) -> ToolResult<AnswerResponse> {
    let choice = AnswerChoice::from_str(answer)
        .ok_or_else(|| invalid(format!("Invalid answer '{}': use yes, sometimes or no", answer)))?;

    let conn = db.get_conn()?;
    match SurveyQuestion::get_by_id(&conn, question_id)? {
        Some(q) if q.is_active => {}
        Some(_) => return Err(invalid(format!("Question {} is not active", question_id))),
        None => return Err(invalid(format!("Question {} not found", question_id))),
    }

    UserProfile::ensure(&conn, user_id)?;
    PendingAnswer::upsert(&conn, user_id, question_id, choice)?;

    Ok(AnswerResponse {
        question_id,
        answer: choice,
        weight: choice.weight(),
        progress: progress(&conn, user_id)?,
    })
}

/// Score the pending answers. Reading, storing and clearing happen in one
/// transaction, so an answer recorded meanwhile is neither lost nor half
/// scored. An incomplete survey changes nothing.
pub fn submit_survey(db: &Database, user_id: &str) -> ToolResult<SubmitSurveyResponse> {
    let mut conn = db.get_conn()?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DbError::from)?;

    let questions: Vec<Question> = SurveyQuestion::list(&tx, true)?
        .iter()
        .map(SurveyQuestion::to_question)
        .collect();
    if questions.is_empty() {
        return Err(invalid("No active survey questions"));
    }
    let answers = PendingAnswer::answer_map(&tx, user_id)?;

    let results = match score_survey(&questions, &answers) {
        Ok(results) => results,
        Err(SurveyError::Incomplete { missing, total }) => {
            tracing::warn!(user_id, missing = missing.len(), "Survey submission incomplete");
            return Ok(SubmitSurveyResponse::Incomplete {
                answered: total - missing.len(),
                total,
                missing,
            });
        }
    };

    let completed_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

    UserProfile::ensure(&tx, user_id)?;
    let submission_id = StoredSurveyResult::insert_batch(&tx, user_id, &results, &completed_at)?;
    PendingAnswer::clear_for_user(&tx, user_id)?;
    tx.commit().map_err(DbError::from)?;

    tracing::info!(user_id, submission_id, nutrients = results.len(), "Survey submitted");

    Ok(SubmitSurveyResponse::Completed {
        submission_id,
        completed_at,
        results: results.iter().map(ResultView::from).collect(),
    })
}

pub fn reset_survey(db: &Database, user_id: &str) -> ToolResult<ResetResponse> {
    let conn = db.get_conn()?;
    let cleared_answers = PendingAnswer::clear_for_user(&conn, user_id)?;
    Ok(ResetResponse {
        success: true,
        cleared_answers,
    })
}

pub fn list_survey_results(db: &Database, user_id: &str, limit: Option<i64>) -> ToolResult<ListResultsResponse> {
    let conn = db.get_conn()?;
    let limit = limit.unwrap_or(DEFAULT_RESULTS_LIMIT).max(1);
    let results: Vec<StoredResultView> = StoredSurveyResult::list_recent(&conn, user_id, limit)?
        .into_iter()
        .map(|r| StoredResultView {
            result: ResultView::from(&r.to_result()),
            submission_id: r.submission_id,
            completed_at: r.completed_at,
        })
        .collect();
    let total = results.len();
    Ok(ListResultsResponse { results, total })
}
