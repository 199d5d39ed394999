//! Pending survey answers
//!
//! A user's in-progress answers, one per question. Cleared once the survey
//! is submitted or reset.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use crate::health::{Answer, AnswerChoice};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAnswer {
    pub user_id: String,
    pub question_id: i64,
    pub answer: AnswerChoice,
    pub weight: u32,
    pub answered_at: String,
}

impl PendingAnswer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let answer: String = row.get("answer")?;
        let answer = AnswerChoice::from_str(&answer).unwrap_or(AnswerChoice::No);
        Ok(Self {
            user_id: row.get("user_id")?,
            question_id: row.get("question_id")?,
            answer,
            weight: answer.weight(),
            answered_at: row.get("answered_at")?,
        })
    }

    /// Record or overwrite the answer to one question
    pub fn upsert(conn: &Connection, user_id: &str, question_id: i64, answer: AnswerChoice) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO survey_answers (user_id, question_id, answer)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, question_id) DO UPDATE SET
                answer = excluded.answer,
                answered_at = datetime('now')
            "#,
            params![user_id, question_id, answer.as_str()],
        )?;
        Ok(())
    }

    pub fn list_for_user(conn: &Connection, user_id: &str) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM survey_answers WHERE user_id = ?1 ORDER BY question_id",
        )?;
        let answers = stmt
            .query_map([user_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(answers)
    }

    /// Answers keyed by question id, in the form the scorer takes
    pub fn answer_map(conn: &Connection, user_id: &str) -> DbResult<HashMap<String, Answer>> {
        Ok(Self::list_for_user(conn, user_id)?
            .into_iter()
            .map(|a| (a.question_id.to_string(), Answer::new(a.answer)))
            .collect())
    }

    pub fn clear_for_user(conn: &Connection, user_id: &str) -> DbResult<usize> {
        let rows = conn.execute("DELETE FROM survey_answers WHERE user_id = ?1", [user_id])?;
        Ok(rows)
    }
}
