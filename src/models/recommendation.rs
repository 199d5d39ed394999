//! Recommendation model
//!
//! Advice attached to a micronutrient and a condition (low / normal / high),
//! with a 1-5 priority.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::health::{Candidate, Condition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub micronutrient_id: i64,
    pub condition: Condition,
    pub title: String,
    pub content: String,
    pub priority: u8,
    pub is_active: bool,
    pub created_at: String,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationCreate {
    pub micronutrient_id: i64,
    pub condition: Condition,
    pub title: String,
    pub content: String,
    pub priority: Option<u8>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationUpdate {
    pub micronutrient_id: Option<i64>,
    pub condition: Option<Condition>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<u8>,
    pub is_active: Option<bool>,
}

/// A recommendation joined with its micronutrient's code and name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationWithNutrient {
    pub recommendation: Recommendation,
    pub nutrient_code: String,
    pub micronutrient_name: String,
}

impl RecommendationWithNutrient {
    pub fn candidate(&self) -> Candidate {
        Candidate {
            id: self.recommendation.id,
            nutrient_code: self.nutrient_code.clone(),
            condition: self.recommendation.condition,
            priority: self.recommendation.priority,
            is_active: self.recommendation.is_active,
        }
    }
}

fn check_priority(priority: u8) -> DbResult<()> {
    if (1..=5).contains(&priority) {
        Ok(())
    } else {
        Err(DbError::Validation(format!("priority must be 1-5, got {}", priority)))
    }
}

impl Recommendation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let condition: String = row.get("condition")?;
        Ok(Self {
            id: row.get("id")?,
            micronutrient_id: row.get("micronutrient_id")?,
            condition: Condition::from_str(&condition).unwrap_or(Condition::Normal),
            title: row.get("title")?,
            content: row.get("content")?,
            priority: row.get("priority")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: row.get("created_at")?,
            created_by: row.get("created_by")?,
        })
    }

    pub fn create(conn: &Connection, data: &RecommendationCreate, created_by: Option<&str>) -> DbResult<Self> {
        let priority = data.priority.unwrap_or(3);
        check_priority(priority)?;
        if data.title.trim().is_empty() {
            return Err(DbError::Validation("title must not be empty".to_string()));
        }

        conn.execute(
            r#"
            INSERT INTO recommendations (micronutrient_id, condition, title, content, priority, is_active, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.micronutrient_id,
                data.condition.as_str(),
                data.title.trim(),
                data.content,
                priority,
                data.is_active.unwrap_or(true),
                created_by,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let r = conn
            .query_row("SELECT * FROM recommendations WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(r)
    }

    /// Recommendations with their micronutrient, highest priority first
    pub fn list_with_nutrient(conn: &Connection, active_only: bool) -> DbResult<Vec<RecommendationWithNutrient>> {
        let sql = format!(
            r#"
            SELECT r.*, m.code AS nutrient_code, m.name AS micronutrient_name
            FROM recommendations r
            INNER JOIN micronutrients m ON m.id = r.micronutrient_id
            {}
            ORDER BY r.priority DESC, r.id
            "#,
            if active_only { "WHERE r.is_active = 1" } else { "" }
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RecommendationWithNutrient {
                    recommendation: Self::from_row(row)?,
                    nutrient_code: row.get("nutrient_code")?,
                    micronutrient_name: row.get("micronutrient_name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update(conn: &Connection, id: i64, data: &RecommendationUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(mid) = data.micronutrient_id {
            updates.push(format!("micronutrient_id = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(mid));
        }
        if let Some(condition) = data.condition {
            updates.push(format!("condition = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(condition.as_str()));
        }
        if let Some(ref title) = data.title {
            if title.trim().is_empty() {
                return Err(DbError::Validation("title must not be empty".to_string()));
            }
            updates.push(format!("title = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(title.trim().to_string()));
        }
        if let Some(ref content) = data.content {
            updates.push(format!("content = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(content.clone()));
        }
        if let Some(priority) = data.priority {
            check_priority(priority)?;
            updates.push(format!("priority = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(priority));
        }
        if let Some(active) = data.is_active {
            updates.push(format!("is_active = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(active));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        let sql = format!(
            "UPDATE recommendations SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );
        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM recommendations WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::models::{Micronutrient, MicronutrientCreate};

    fn nutrient(conn: &Connection, code: &str) -> i64 {
        Micronutrient::create(
            conn,
            &MicronutrientCreate {
                code: code.to_string(),
                name: code.to_uppercase(),
                unit: "mg/L".to_string(),
                normal_min: 1.0,
                normal_max: 2.0,
                age_min: None,
                age_max: None,
                gender: None,
                description: None,
            },
        )
        .unwrap()
        .id
    }

    fn advice(micronutrient_id: i64, priority: u8) -> RecommendationCreate {
        RecommendationCreate {
            micronutrient_id,
            condition: Condition::Low,
            title: "Eat more leafy greens".to_string(),
            content: "Spinach, chard, pumpkin seeds.".to_string(),
            priority: Some(priority),
            is_active: None,
        }
    }

    #[test]
    fn test_priority_must_be_in_range() {
        let conn = test_connection();
        let mg = nutrient(&conn, "mg");
        assert!(matches!(
            Recommendation::create(&conn, &advice(mg, 0), None),
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            Recommendation::create(&conn, &advice(mg, 6), None),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_list_with_nutrient_orders_by_priority() {
        let conn = test_connection();
        let mg = nutrient(&conn, "mg");
        let zn = nutrient(&conn, "zn");

        let low = Recommendation::create(&conn, &advice(mg, 2), Some("admin")).unwrap();
        let high = Recommendation::create(&conn, &advice(zn, 5), None).unwrap();
        let hidden = Recommendation::create(&conn, &advice(zn, 4), None).unwrap();
        Recommendation::update(
            &conn,
            hidden.id,
            &RecommendationUpdate { is_active: Some(false), ..Default::default() },
        )
        .unwrap();

        let active = Recommendation::list_with_nutrient(&conn, true).unwrap();
        let ids: Vec<i64> = active.iter().map(|r| r.recommendation.id).collect();
        assert_eq!(ids, vec![high.id, low.id]);
        assert_eq!(active[0].nutrient_code, "zn");
        assert_eq!(active[1].recommendation.created_by.as_deref(), Some("admin"));
        assert_eq!(Recommendation::list_with_nutrient(&conn, false).unwrap().len(), 3);

        let candidate = active[0].candidate();
        assert_eq!(candidate.priority, 5);
        assert!(candidate.is_active);
    }
}
