//! Lab measurement model
//!
//! A single lab result for one micronutrient, entered by the user.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::health::LabReading;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    pub user_id: String,
    pub micronutrient_id: i64,
    pub value: f64,
    pub measured_at: String,
    pub notes: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementCreate {
    pub micronutrient_id: i64,
    pub value: f64,
    /// YYYY-MM-DD; defaults to today (UTC)
    pub measured_at: Option<String>,
    pub notes: Option<String>,
}

impl Measurement {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            micronutrient_id: row.get("micronutrient_id")?,
            value: row.get("value")?,
            measured_at: row.get("measured_at")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn to_reading(&self) -> LabReading {
        LabReading {
            id: self.id,
            micronutrient_id: self.micronutrient_id,
            value: self.value,
            measured_at: self.measured_at.clone(),
        }
    }

    pub fn create(conn: &Connection, user_id: &str, data: &MeasurementCreate) -> DbResult<Self> {
        if !data.value.is_finite() {
            return Err(DbError::Validation("value must be a finite number".to_string()));
        }
        let measured_at = match data.measured_at.as_deref() {
            Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| DbError::Validation(format!("measured_at '{}' is not YYYY-MM-DD", s)))?,
            None => chrono::Utc::now().date_naive(),
        };

        conn.execute(
            r#"
            INSERT INTO measurements (user_id, micronutrient_id, value, measured_at, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                user_id,
                data.micronutrient_id,
                data.value,
                measured_at.format("%Y-%m-%d").to_string(),
                data.notes.clone().unwrap_or_default(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let m = conn
            .query_row("SELECT * FROM measurements WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(m)
    }

    /// A user's measurements, newest first, optionally for one micronutrient
    pub fn list_for_user(
        conn: &Connection,
        user_id: &str,
        micronutrient_id: Option<i64>,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM measurements
            WHERE user_id = ?1 AND (?2 IS NULL OR micronutrient_id = ?2)
            ORDER BY measured_at DESC, id DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![user_id, micronutrient_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete one of the user's own measurements
    pub fn delete(conn: &Connection, user_id: &str, id: i64) -> DbResult<bool> {
        let rows = conn.execute(
            "DELETE FROM measurements WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::models::{Micronutrient, MicronutrientCreate, UserProfile};

    fn setup(conn: &Connection) -> i64 {
        UserProfile::ensure(conn, "u1").unwrap();
        UserProfile::ensure(conn, "u2").unwrap();
        Micronutrient::create(
            conn,
            &MicronutrientCreate {
                code: "fe".to_string(),
                name: "Ferritin".to_string(),
                unit: "ng/mL".to_string(),
                normal_min: 15.0,
                normal_max: 150.0,
                age_min: None,
                age_max: None,
                gender: None,
                description: None,
            },
        )
        .unwrap()
        .id
    }

    fn entry(micronutrient_id: i64, value: f64, date: &str) -> MeasurementCreate {
        MeasurementCreate {
            micronutrient_id,
            value,
            measured_at: Some(date.to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_create_and_list_newest_first() {
        let conn = test_connection();
        let fe = setup(&conn);

        Measurement::create(&conn, "u1", &entry(fe, 12.0, "2026-01-05")).unwrap();
        Measurement::create(&conn, "u1", &entry(fe, 40.0, "2026-04-05")).unwrap();
        Measurement::create(&conn, "u2", &entry(fe, 90.0, "2026-04-06")).unwrap();

        let list = Measurement::list_for_user(&conn, "u1", None).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].value, 40.0);
        assert_eq!(Measurement::list_for_user(&conn, "u1", Some(fe)).unwrap().len(), 2);
        assert!(Measurement::list_for_user(&conn, "u1", Some(fe + 1)).unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_bad_date_and_unknown_micronutrient() {
        let conn = test_connection();
        let fe = setup(&conn);

        let err = Measurement::create(&conn, "u1", &entry(fe, 12.0, "05/01/2026")).unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let err = Measurement::create(&conn, "u1", &entry(fe + 100, 12.0, "2026-01-05")).unwrap_err();
        assert!(matches!(err, DbError::Sqlite(_)));
    }

    #[test]
    fn test_delete_is_scoped_to_owner() {
        let conn = test_connection();
        let fe = setup(&conn);
        let m = Measurement::create(&conn, "u1", &entry(fe, 12.0, "2026-01-05")).unwrap();

        assert!(!Measurement::delete(&conn, "u2", m.id).unwrap());
        assert!(Measurement::delete(&conn, "u1", m.id).unwrap());
    }

    #[test]
    fn test_deleting_micronutrient_cascades() {
        let conn = test_connection();
        let fe = setup(&conn);
        Measurement::create(&conn, "u1", &entry(fe, 12.0, "2026-01-05")).unwrap();

        Micronutrient::delete(&conn, fe).unwrap();
        assert!(Measurement::list_for_user(&conn, "u1", None).unwrap().is_empty());
    }
}
