//! Stored survey results
//!
//! Each submission writes one row per nutrient, all sharing a per-user
//! `submission_id` and `completed_at`.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use crate::health::{DeficiencyLevel, SurveyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSurveyResult {
    pub id: i64,
    pub user_id: String,
    pub submission_id: i64,
    pub nutrient_code: String,
    pub score: u32,
    pub max_score: u32,
    pub percent: f64,
    pub level: DeficiencyLevel,
    pub completed_at: String,
}

impl StoredSurveyResult {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let level: String = row.get("level")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            submission_id: row.get("submission_id")?,
            nutrient_code: row.get("nutrient_code")?,
            score: row.get("score")?,
            max_score: row.get("max_score")?,
            percent: row.get("percent")?,
            level: DeficiencyLevel::from_str(&level).unwrap_or(DeficiencyLevel::Normal),
            completed_at: row.get("completed_at")?,
        })
    }

    pub fn to_result(&self) -> SurveyResult {
        SurveyResult {
            nutrient_code: self.nutrient_code.clone(),
            score: self.score,
            max_score: self.max_score,
            percent: self.percent,
            level: self.level,
        }
    }

    /// Insert a whole submission and return its submission id.
    /// Callers wrap this in a transaction.
    pub fn insert_batch(
        conn: &Connection,
        user_id: &str,
        results: &[SurveyResult],
        completed_at: &str,
    ) -> DbResult<i64> {
        let submission_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(submission_id), 0) + 1 FROM survey_results WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO survey_results (user_id, submission_id, nutrient_code, score, max_score, percent, level, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for r in results {
            stmt.execute(params![
                user_id,
                submission_id,
                r.nutrient_code,
                r.score,
                r.max_score,
                r.percent,
                r.level.as_str(),
                completed_at,
            ])?;
        }
        Ok(submission_id)
    }

    /// Most recent rows first
    pub fn list_recent(conn: &Connection, user_id: &str, limit: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM survey_results WHERE user_id = ?1 ORDER BY submission_id DESC, id LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All rows of the user's newest submission
    pub fn latest_submission(conn: &Connection, user_id: &str) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM survey_results
            WHERE user_id = ?1
              AND submission_id = (SELECT MAX(submission_id) FROM survey_results WHERE user_id = ?1)
            ORDER BY nutrient_code
            "#,
        )?;
        let rows = stmt
            .query_map([user_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
