//! Personalized recommendation tool
//!
//! Findings come from the latest survey submission and the newest lab value
//! per nutrient code.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::Database;
use crate::health::{
    collect_findings, select_recommendations, Candidate, Condition, Finding, PriorityBand,
    DEFAULT_RECOMMENDATION_LIMIT,
};
use crate::models::{Recommendation, StoredSurveyResult};

use super::measurements::lab_statuses;
use super::ToolResult;

#[derive(Debug, Serialize)]
pub struct RecommendationView {
    pub id: i64,
    pub micronutrient_id: i64,
    pub nutrient_code: String,
    pub micronutrient_name: String,
    pub condition: Condition,
    pub title: String,
    pub content: String,
    pub priority: u8,
    pub priority_band: PriorityBand,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub findings: Vec<Finding>,
    /// True when nothing was found and the general list is shown
    pub general: bool,
    pub recommendations: Vec<RecommendationView>,
    pub total: usize,
}

pub fn get_recommendations(
    db: &Database,
    user_id: &str,
    limit: Option<usize>,
) -> ToolResult<RecommendationsResponse> {
    let conn = db.get_conn()?;
    let limit = limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT).clamp(1, DEFAULT_RECOMMENDATION_LIMIT);

    let survey: Vec<_> = StoredSurveyResult::latest_submission(&conn, user_id)?
        .iter()
        .map(StoredSurveyResult::to_result)
        .collect();

    // Several rows can share a code; the newest measurement decides
    let mut by_code: BTreeMap<String, (String, i64, Condition)> = BTreeMap::new();
    for status in lab_statuses(&conn, user_id)? {
        let key = (status.measured_at.clone(), status.measurement_id);
        let newer = by_code
            .get(&status.nutrient_code)
            .map_or(true, |(at, id, _)| key > (at.clone(), *id));
        if newer {
            by_code.insert(status.nutrient_code, (key.0, key.1, status.condition));
        }
    }
    let labs: Vec<(String, Condition)> = by_code
        .into_iter()
        .map(|(code, (_, _, condition))| (code, condition))
        .collect();

    let findings = collect_findings(&survey, &labs);

    let rows = Recommendation::list_with_nutrient(&conn, true)?;
    let candidates: Vec<Candidate> = rows.iter().map(|r| r.candidate()).collect();
    let selected = select_recommendations(&candidates, &findings, limit);

    let recommendations: Vec<RecommendationView> = selected
        .iter()
        .filter_map(|c| rows.iter().find(|r| r.recommendation.id == c.id))
        .map(|r| RecommendationView {
            id: r.recommendation.id,
            micronutrient_id: r.recommendation.micronutrient_id,
            nutrient_code: r.nutrient_code.clone(),
            micronutrient_name: r.micronutrient_name.clone(),
            condition: r.recommendation.condition,
            title: r.recommendation.title.clone(),
            content: r.recommendation.content.clone(),
            priority: r.recommendation.priority,
            priority_band: PriorityBand::from_priority(r.recommendation.priority),
        })
        .collect();

    tracing::debug!(user_id, findings = findings.len(), selected = recommendations.len(), "Recommendations selected");

    let total = recommendations.len();
    Ok(RecommendationsResponse {
        general: findings.is_empty(),
        findings,
        recommendations,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::RangeGender;
    use crate::models::{MeasurementCreate, Micronutrient, MicronutrientCreate, RecommendationCreate};
    use crate::tools::{measurements, survey};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(crate::db::migrations::run_migrations).unwrap();
        db
    }

    fn nutrient(db: &Database, code: &str) -> i64 {
        db.with_conn(|conn| {
            Micronutrient::create(
                conn,
                &MicronutrientCreate {
                    code: code.to_string(),
                    name: code.to_uppercase(),
                    unit: "ng/mL".to_string(),
                    normal_min: 30.0,
                    normal_max: 100.0,
                    age_min: None,
                    age_max: None,
                    gender: Some(RangeGender::Both),
                    description: None,
                },
            )
        })
        .unwrap()
        .id
    }

    fn advice(db: &Database, micronutrient_id: i64, condition: Condition, priority: u8) -> i64 {
        db.with_conn(|conn| {
            Recommendation::create(
                conn,
                &RecommendationCreate {
                    micronutrient_id,
                    condition,
                    title: format!("Advice {}", priority),
                    content: "Eat well".to_string(),
                    priority: Some(priority),
                    is_active: None,
                },
                None,
            )
        })
        .unwrap()
        .id
    }

    #[test]
    fn test_general_list_without_findings() {
        let db = test_db();
        let d = nutrient(&db, "d");
        let low = advice(&db, d, Condition::Low, 2);
        let high = advice(&db, d, Condition::High, 5);

        let resp = get_recommendations(&db, "u1", None).unwrap();
        assert!(resp.general);
        let ids: Vec<i64> = resp.recommendations.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![high, low]);
        assert_eq!(resp.recommendations[0].priority_band, PriorityBand::Critical);
    }

    #[test]
    fn test_lab_finding_selects_matching_advice() {
        let db = test_db();
        let d = nutrient(&db, "d");
        let low = advice(&db, d, Condition::Low, 3);
        advice(&db, d, Condition::High, 5);

        measurements::add_measurement(
            &db,
            "u1",
            &MeasurementCreate {
                micronutrient_id: d,
                value: 12.0,
                measured_at: Some("2026-02-01".to_string()),
                notes: None,
            },
        )
        .unwrap();

        let resp = get_recommendations(&db, "u1", None).unwrap();
        assert!(!resp.general);
        assert_eq!(resp.findings.len(), 1);
        assert_eq!(resp.recommendations.len(), 1);
        assert_eq!(resp.recommendations[0].id, low);
    }

    #[test]
    fn test_survey_finding_selects_low_advice() {
        let db = test_db();
        let mg = nutrient(&db, "mg");
        let low = advice(&db, mg, Condition::Low, 4);
        advice(&db, mg, Condition::High, 5);

        let q = db
            .with_conn(|conn| {
                crate::models::SurveyQuestion::create(
                    conn,
                    &crate::models::SurveyQuestionCreate {
                        question_number: 1,
                        question_text: "Muscle cramps?".to_string(),
                        nutrient_mapping: vec!["mg".to_string()],
                        order_index: None,
                        is_active: None,
                    },
                )
            })
            .unwrap();
        survey::answer_survey_question(&db, "u1", q.id, "yes").unwrap();
        survey::submit_survey(&db, "u1").unwrap();

        let resp = get_recommendations(&db, "u1", Some(5)).unwrap();
        let ids: Vec<i64> = resp.recommendations.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![low]);
    }
}
