//! Lab measurement tools

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::Database;
use crate::health::{classify_measurement, latest_by_micronutrient, Condition};
use crate::models::{Measurement, MeasurementCreate, Micronutrient, UserProfile};

use super::{invalid, DeleteResponse, ToolResult};

#[derive(Debug, Serialize)]
pub struct MeasurementView {
    pub id: i64,
    pub micronutrient_id: i64,
    pub micronutrient_name: String,
    pub nutrient_code: String,
    pub value: f64,
    pub unit: String,
    pub measured_at: String,
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct ListMeasurementsResponse {
    pub measurements: Vec<MeasurementView>,
    pub total: usize,
}

/// Latest result for one micronutrient, classified against its range
#[derive(Debug, Serialize)]
pub struct LabStatus {
    pub measurement_id: i64,
    pub micronutrient_id: i64,
    pub micronutrient_name: String,
    pub nutrient_code: String,
    pub value: f64,
    pub unit: String,
    pub measured_at: String,
    pub normal_min: f64,
    pub normal_max: f64,
    /// Row whose range was used; differs from `micronutrient_id` when a
    /// better demographic match exists for the same code
    pub reference_id: i64,
    /// False when no range for this code matches the user's age and gender
    pub range_applies: bool,
    pub condition: Condition,
    pub condition_display: String,
}

#[derive(Debug, Serialize)]
pub struct LabStatusResponse {
    pub statuses: Vec<LabStatus>,
    pub out_of_range: usize,
}

fn view(m: Measurement, nutrient: Option<&Micronutrient>) -> MeasurementView {
    MeasurementView {
        id: m.id,
        micronutrient_id: m.micronutrient_id,
        micronutrient_name: nutrient.map(|n| n.name.clone()).unwrap_or_default(),
        nutrient_code: nutrient.map(|n| n.code.clone()).unwrap_or_default(),
        value: m.value,
        unit: nutrient.map(|n| n.unit.clone()).unwrap_or_default(),
        measured_at: m.measured_at,
        notes: m.notes,
    }
}

fn nutrients_by_id(conn: &Connection) -> ToolResult<HashMap<i64, Micronutrient>> {
    Ok(Micronutrient::list(conn)?.into_iter().map(|m| (m.id, m)).collect())
}

pub fn add_measurement(db: &Database, user_id: &str, data: &MeasurementCreate) -> ToolResult<MeasurementView> {
    let conn = db.get_conn()?;
    let nutrient = Micronutrient::get_by_id(&conn, data.micronutrient_id)?
        .ok_or_else(|| invalid(format!("Micronutrient {} not found", data.micronutrient_id)))?;

    UserProfile::ensure(&conn, user_id)?;
    let m = Measurement::create(&conn, user_id, data)?;
    tracing::debug!(user_id, micronutrient = %nutrient.code, "Measurement recorded");
    Ok(view(m, Some(&nutrient)))
}

pub fn list_measurements(
    db: &Database,
    user_id: &str,
    micronutrient_id: Option<i64>,
) -> ToolResult<ListMeasurementsResponse> {
    let conn = db.get_conn()?;
    let nutrients = nutrients_by_id(&conn)?;
    let measurements: Vec<MeasurementView> = Measurement::list_for_user(&conn, user_id, micronutrient_id)?
        .into_iter()
        .map(|m| {
            let n = nutrients.get(&m.micronutrient_id);
            view(m, n)
        })
        .collect();
    let total = measurements.len();
    Ok(ListMeasurementsResponse { measurements, total })
}

pub fn delete_measurement(db: &Database, user_id: &str, id: i64) -> ToolResult<DeleteResponse> {
    let conn = db.get_conn()?;
    let success = Measurement::delete(&conn, user_id, id)?;
    Ok(DeleteResponse { success, deleted_id: id })
}

/// Classify the newest measurement of every micronutrient the user has
pub(crate) fn lab_statuses(conn: &Connection, user_id: &str) -> ToolResult<Vec<LabStatus>> {
    let profile = UserProfile::get(conn, user_id)?;
    let (age, gender) = profile.map_or((None, None), |p| (p.age, p.gender));

    let nutrients = nutrients_by_id(conn)?;
    let readings: Vec<_> = Measurement::list_for_user(conn, user_id, None)?
        .iter()
        .map(Measurement::to_reading)
        .collect();

    let mut statuses = Vec::new();
    for reading in latest_by_micronutrient(&readings) {
        let Some(measured) = nutrients.get(&reading.micronutrient_id) else {
            continue;
        };

        let applicable = Micronutrient::find_applicable(conn, &measured.code, age, gender)?;
        let range_applies = applicable.is_some();
        let reference = applicable.unwrap_or_else(|| measured.clone());
        let range = reference.reference_range();
        let condition = classify_measurement(reading.value, &range);

        statuses.push(LabStatus {
            measurement_id: reading.id,
            micronutrient_id: measured.id,
            micronutrient_name: measured.name.clone(),
            nutrient_code: measured.code.clone(),
            value: reading.value,
            unit: measured.unit.clone(),
            measured_at: reading.measured_at,
            normal_min: range.normal_min,
            normal_max: range.normal_max,
            reference_id: reference.id,
            range_applies,
            condition,
            condition_display: condition.display_name().to_string(),
        });
    }

    Ok(statuses)
}

pub fn get_lab_status(db: &Database, user_id: &str) -> ToolResult<LabStatusResponse> {
    let conn = db.get_conn()?;
    let statuses = lab_statuses(&conn, user_id)?;
    let out_of_range = statuses.iter().filter(|s| s.condition != Condition::Normal).count();
    Ok(LabStatusResponse { statuses, out_of_range })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{Gender, RangeGender};
    use crate::models::{MicronutrientCreate, ProfileUpdate};
    use crate::tools::ToolError;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(crate::db::migrations::run_migrations).unwrap();
        db
    }

    fn ferritin(db: &Database, gender: RangeGender, min: f64, max: f64) -> i64 {
        db.with_conn(|conn| {
            Micronutrient::create(
                conn,
                &MicronutrientCreate {
                    code: "fe".to_string(),
                    name: "Ferritin".to_string(),
                    unit: "ng/mL".to_string(),
                    normal_min: min,
                    normal_max: max,
                    age_min: None,
                    age_max: None,
                    gender: Some(gender),
                    description: None,
                },
            )
        })
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
    fn test_lab_status_uses_latest_value() {
        let db = test_db();
        let fe = ferritin(&db, RangeGender::Both, 15.0, 150.0);

        add_measurement(&db, "u1", &entry(fe, 10.0, "2026-01-01")).unwrap();
        add_measurement(&db, "u1", &entry(fe, 60.0, "2026-03-01")).unwrap();

        let resp = get_lab_status(&db, "u1").unwrap();
        assert_eq!(resp.statuses.len(), 1);
        assert_eq!(resp.statuses[0].value, 60.0);
        assert_eq!(resp.statuses[0].condition, Condition::Normal);
        assert_eq!(resp.out_of_range, 0);
    }

    #[test]
    fn test_lab_status_prefers_demographic_range() {
        let db = test_db();
        let men = ferritin(&db, RangeGender::Male, 30.0, 400.0);
        let women = ferritin(&db, RangeGender::Female, 15.0, 150.0);
        db.with_conn(|conn| {
            UserProfile::upsert(
                conn,
                "u1",
                &ProfileUpdate { gender: Some(Gender::Female), ..Default::default() },
            )
        })
        .unwrap();

        // Entered against the male row, judged by the female range
        add_measurement(&db, "u1", &entry(men, 20.0, "2026-01-01")).unwrap();

        let status = &get_lab_status(&db, "u1").unwrap().statuses[0];
        assert_eq!(status.reference_id, women);
        assert!(status.range_applies);
        assert_eq!(status.condition, Condition::Normal);
    }

    #[test]
    fn test_add_measurement_for_unknown_micronutrient() {
        let db = test_db();
        assert!(matches!(
            add_measurement(&db, "u1", &entry(42, 1.0, "2026-01-01")),
            Err(ToolError::Invalid(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let db = test_db();
        let fe = ferritin(&db, RangeGender::Both, 15.0, 150.0);
        let added = add_measurement(&db, "u1", &entry(fe, 5.0, "2026-01-01")).unwrap();
        assert_eq!(added.nutrient_code, "fe");
        assert_eq!(added.unit, "ng/mL");

        assert_eq!(list_measurements(&db, "u1", None).unwrap().total, 1);
        assert_eq!(get_lab_status(&db, "u1").unwrap().out_of_range, 1);

        assert!(delete_measurement(&db, "u1", added.id).unwrap().success);
        assert_eq!(list_measurements(&db, "u1", Some(fe)).unwrap().total, 0);
    }
}
