//! Micronutrient model
//!
//! Reference data: a nutrient code, its unit and the normal range for one
//! demographic (age band and sex). The same code may appear on several rows.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::health::{normalize_nutrient_code, Gender, RangeGender, ReferenceRange};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Micronutrient {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub normal_min: f64,
    pub normal_max: f64,
    pub age_min: u32,
    pub age_max: u32,
    pub gender: RangeGender,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicronutrientCreate {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub normal_min: f64,
    pub normal_max: f64,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub gender: Option<RangeGender>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MicronutrientUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub normal_min: Option<f64>,
    pub normal_max: Option<f64>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub gender: Option<RangeGender>,
    pub description: Option<String>,
}

fn check_range(range: &ReferenceRange) -> DbResult<()> {
    if !range.normal_min.is_finite() || !range.normal_max.is_finite() {
        return Err(DbError::Validation("normal range must be finite".to_string()));
    }
    if range.normal_min > range.normal_max {
        return Err(DbError::Validation(format!(
            "normal_min ({}) exceeds normal_max ({})",
            range.normal_min, range.normal_max
        )));
    }
    if range.age_min > range.age_max {
        return Err(DbError::Validation(format!(
            "age_min ({}) exceeds age_max ({})",
            range.age_min, range.age_max
        )));
    }
    Ok(())
}

impl Micronutrient {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let gender: String = row.get("gender")?;
        Ok(Self {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            unit: row.get("unit")?,
            normal_min: row.get("normal_min")?,
            normal_max: row.get("normal_max")?,
            age_min: row.get("age_min")?,
            age_max: row.get("age_max")?,
            gender: RangeGender::from_str(&gender).unwrap_or(RangeGender::Both),
            description: row.get("description")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn reference_range(&self) -> ReferenceRange {
        ReferenceRange {
            normal_min: self.normal_min,
            normal_max: self.normal_max,
            age_min: self.age_min,
            age_max: self.age_max,
            gender: self.gender,
        }
    }

    pub fn create(conn: &Connection, data: &MicronutrientCreate) -> DbResult<Self> {
        let code = normalize_nutrient_code(&data.code);
        if code.is_empty() {
            return Err(DbError::Validation("code must not be empty".to_string()));
        }
        let range = ReferenceRange {
            normal_min: data.normal_min,
            normal_max: data.normal_max,
            age_min: data.age_min.unwrap_or(0),
            age_max: data.age_max.unwrap_or(120),
            gender: data.gender.unwrap_or(RangeGender::Both),
        };
        check_range(&range)?;

        conn.execute(
            r#"
            INSERT INTO micronutrients (code, name, unit, normal_min, normal_max, age_min, age_max, gender, description)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                code,
                data.name.trim(),
                data.unit.trim(),
                range.normal_min,
                range.normal_max,
                range.age_min,
                range.age_max,
                range.gender.as_str(),
                data.description.clone().unwrap_or_default(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let item = conn
            .query_row("SELECT * FROM micronutrients WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(item)
    }

    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM micronutrients ORDER BY name, age_min, id")?;
        let items = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn list_by_code(conn: &Connection, code: &str) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM micronutrients WHERE code = ?1 ORDER BY age_min, id")?;
        let items = stmt
            .query_map([normalize_nutrient_code(code)], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// First row for `code` whose demographic covers the given age and gender
    pub fn find_applicable(
        conn: &Connection,
        code: &str,
        age: Option<u32>,
        gender: Option<Gender>,
    ) -> DbResult<Option<Self>> {
        Ok(Self::list_by_code(conn, code)?
            .into_iter()
            .find(|m| m.reference_range().applies_to(age, gender)))
    }

    pub fn update(conn: &Connection, id: i64, data: &MicronutrientUpdate) -> DbResult<Option<Self>> {
        let Some(existing) = Self::get_by_id(conn, id)? else {
            return Ok(None);
        };

        let merged = ReferenceRange {
            normal_min: data.normal_min.unwrap_or(existing.normal_min),
            normal_max: data.normal_max.unwrap_or(existing.normal_max),
            age_min: data.age_min.unwrap_or(existing.age_min),
            age_max: data.age_max.unwrap_or(existing.age_max),
            gender: data.gender.unwrap_or(existing.gender),
        };
        check_range(&merged)?;

        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref code) = data.code {
            let code = normalize_nutrient_code(code);
            if code.is_empty() {
                return Err(DbError::Validation("code must not be empty".to_string()));
            }
            updates.push(format!("code = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(code));
        }
        if let Some(ref name) = data.name {
            updates.push(format!("name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.trim().to_string()));
        }
        if let Some(ref unit) = data.unit {
            updates.push(format!("unit = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(unit.trim().to_string()));
        }
        if let Some(v) = data.normal_min {
            updates.push(format!("normal_min = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(v));
        }
        if let Some(v) = data.normal_max {
            updates.push(format!("normal_max = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(v));
        }
        if let Some(v) = data.age_min {
            updates.push(format!("age_min = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(v));
        }
        if let Some(v) = data.age_max {
            updates.push(format!("age_max = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(v));
        }
        if let Some(g) = data.gender {
            updates.push(format!("gender = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(g.as_str()));
        }
        if let Some(ref desc) = data.description {
            updates.push(format!("description = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(desc.clone()));
        }

        if updates.is_empty() {
            return Ok(Some(existing));
        }

        let sql = format!(
            "UPDATE micronutrients SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );
        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a micronutrient; its measurements and recommendations cascade
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM micronutrients WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn vitamin_d(gender: RangeGender, age_min: u32, age_max: u32) -> MicronutrientCreate {
        MicronutrientCreate {
            code: " D ".to_string(),
            name: "Vitamin D".to_string(),
            unit: "ng/mL".to_string(),
            normal_min: 30.0,
            normal_max: 100.0,
            age_min: Some(age_min),
            age_max: Some(age_max),
            gender: Some(gender),
            description: None,
        }
    }

    #[test]
    fn test_create_normalizes_code() {
        let conn = test_connection();
        let m = Micronutrient::create(&conn, &vitamin_d(RangeGender::Both, 0, 120)).unwrap();
        assert_eq!(m.code, "d");
        assert_eq!(m.description, "");
        assert_eq!(Micronutrient::list_by_code(&conn, "D").unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_inverted_range() {
        let conn = test_connection();
        let mut data = vitamin_d(RangeGender::Both, 0, 120);
        data.normal_min = 200.0;
        assert!(matches!(
            Micronutrient::create(&conn, &data),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_find_applicable_by_demographic() {
        let conn = test_connection();
        let young = Micronutrient::create(&conn, &vitamin_d(RangeGender::Both, 0, 17)).unwrap();
        let women = Micronutrient::create(&conn, &vitamin_d(RangeGender::Female, 18, 120)).unwrap();

        let found = Micronutrient::find_applicable(&conn, "d", Some(12), Some(Gender::Male)).unwrap();
        assert_eq!(found.map(|m| m.id), Some(young.id));

        let found = Micronutrient::find_applicable(&conn, "d", Some(40), Some(Gender::Female)).unwrap();
        assert_eq!(found.map(|m| m.id), Some(women.id));

        let found = Micronutrient::find_applicable(&conn, "d", Some(40), Some(Gender::Male)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_update_validates_merged_range() {
        let conn = test_connection();
        let m = Micronutrient::create(&conn, &vitamin_d(RangeGender::Both, 0, 120)).unwrap();

        let err = Micronutrient::update(
            &conn,
            m.id,
            &MicronutrientUpdate { normal_max: Some(10.0), ..Default::default() },
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let updated = Micronutrient::update(
            &conn,
            m.id,
            &MicronutrientUpdate { normal_max: Some(80.0), ..Default::default() },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.normal_max, 80.0);

        assert!(Micronutrient::update(&conn, 999, &MicronutrientUpdate::default()).unwrap().is_none());
        assert!(Micronutrient::delete(&conn, m.id).unwrap());
        assert!(!Micronutrient::delete(&conn, m.id).unwrap());
    }
}
