//! Survey question model
//!
//! Questions of the deficiency survey. `nutrient_mapping` is stored as a
//! JSON array of nutrient codes.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::health::{normalize_nutrient_code, Question};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: i64,
    pub question_number: i64,
    pub question_text: String,
    pub nutrient_mapping: Vec<String>,
    pub order_index: i64,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyQuestionCreate {
    pub question_number: i64,
    pub question_text: String,
    pub nutrient_mapping: Vec<String>,
    pub order_index: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyQuestionUpdate {
    pub question_number: Option<i64>,
    pub question_text: Option<String>,
    pub nutrient_mapping: Option<Vec<String>>,
    pub order_index: Option<i64>,
    pub is_active: Option<bool>,
}

/// Normalize codes, drop blanks and duplicates, keep first-seen order
fn clean_mapping(codes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes.iter().map(|c| normalize_nutrient_code(c)) {
        if !code.is_empty() && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

impl SurveyQuestion {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let mapping_json: String = row.get("nutrient_mapping")?;
        let nutrient_mapping = serde_json::from_str(&mapping_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            question_number: row.get("question_number")?,
            question_text: row.get("question_text")?,
            nutrient_mapping,
            order_index: row.get("order_index")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    /// The scorer's view of this question
    pub fn to_question(&self) -> Question {
        Question {
            id: self.id.to_string(),
            number: self.question_number,
            text: self.question_text.clone(),
            nutrient_mapping: self.nutrient_mapping.clone(),
            is_active: self.is_active,
        }
    }

    pub fn create(conn: &Connection, data: &SurveyQuestionCreate) -> DbResult<Self> {
        let text = data.question_text.trim();
        if text.is_empty() {
            return Err(DbError::Validation("question_text must not be empty".to_string()));
        }
        let mapping = serde_json::to_string(&clean_mapping(&data.nutrient_mapping))?;

        conn.execute(
            r#"
            INSERT INTO survey_questions (question_number, question_text, nutrient_mapping, order_index, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                data.question_number,
                text,
                mapping,
                data.order_index.unwrap_or(data.question_number),
                data.is_active.unwrap_or(true),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let q = conn
            .query_row("SELECT * FROM survey_questions WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(q)
    }

    /// Questions in survey order
    pub fn list(conn: &Connection, active_only: bool) -> DbResult<Vec<Self>> {
        let sql = if active_only {
            "SELECT * FROM survey_questions WHERE is_active = 1 ORDER BY order_index, id"
        } else {
            "SELECT * FROM survey_questions ORDER BY is_active DESC, order_index, id"
        };
        let mut stmt = conn.prepare(sql)?;
        let questions = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(questions)
    }

    pub fn update(conn: &Connection, id: i64, data: &SurveyQuestionUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(n) = data.question_number {
            updates.push(format!("question_number = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(n));
        }
        if let Some(ref text) = data.question_text {
            let text = text.trim();
            if text.is_empty() {
                return Err(DbError::Validation("question_text must not be empty".to_string()));
            }
            updates.push(format!("question_text = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(text.to_string()));
        }
        if let Some(ref mapping) = data.nutrient_mapping {
            updates.push(format!("nutrient_mapping = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(serde_json::to_string(&clean_mapping(mapping))?));
        }
        if let Some(idx) = data.order_index {
            updates.push(format!("order_index = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(idx));
        }
        if let Some(active) = data.is_active {
            updates.push(format!("is_active = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(active));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        let sql = format!(
            "UPDATE survey_questions SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );
        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a question; pending answers to it cascade
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM survey_questions WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::test_connection;

    fn new_question(number: i64, codes: &[&str]) -> SurveyQuestionCreate {
        SurveyQuestionCreate {
            question_number: number,
            question_text: format!("Do you often feel symptom #{}?", number),
            nutrient_mapping: codes.iter().map(|c| c.to_string()).collect(),
            order_index: None,
            is_active: None,
        }
    }

    #[test]
    fn test_mapping_is_cleaned_and_round_trips_through_json() {
        let conn = test_connection();
        let q = SurveyQuestion::create(&conn, &new_question(1, &["Mg", " b12", "mg", ""])).unwrap();
        assert_eq!(q.nutrient_mapping, vec!["mg".to_string(), "b12".to_string()]);
        assert!(q.is_active);
        assert_eq!(q.order_index, 1);

        let scored = q.to_question();
        assert_eq!(scored.id, q.id.to_string());
        assert_eq!(scored.number, 1);
    }

    #[test]
    fn test_list_active_in_order() {
        let conn = test_connection();
        let mut third = new_question(3, &["d"]);
        third.order_index = Some(0);
        let a = SurveyQuestion::create(&conn, &new_question(1, &["d"])).unwrap();
        let b = SurveyQuestion::create(&conn, &new_question(2, &["fe"])).unwrap();
        let c = SurveyQuestion::create(&conn, &third).unwrap();

        SurveyQuestion::update(
            &conn,
            b.id,
            &SurveyQuestionUpdate { is_active: Some(false), ..Default::default() },
        )
        .unwrap();

        let ids: Vec<i64> = SurveyQuestion::list(&conn, true).unwrap().iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![c.id, a.id]);
        assert_eq!(SurveyQuestion::list(&conn, false).unwrap().len(), 3);
    }

    #[test]
    fn test_update_rejects_blank_text() {
        let conn = test_connection();
        let q = SurveyQuestion::create(&conn, &new_question(1, &["d"])).unwrap();
        let err = SurveyQuestion::update(
            &conn,
            q.id,
            &SurveyQuestionUpdate { question_text: Some("   ".to_string()), ..Default::default() },
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }
}
