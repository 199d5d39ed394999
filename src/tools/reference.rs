//! Reference data administration
//!
//! Micronutrients, survey questions and recommendations are shared by all
//! users. Every write here requires the acting user to hold the admin role.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::Database;
use crate::models::{
    Micronutrient, MicronutrientCreate, MicronutrientUpdate, Recommendation, RecommendationCreate,
    RecommendationUpdate, RecommendationWithNutrient, SurveyQuestion, SurveyQuestionCreate,
    SurveyQuestionUpdate, UserProfile, UserRole,
};

use super::{invalid, DeleteResponse, ToolResult};

#[derive(Debug, Serialize)]
pub struct ListMicronutrientsResponse {
    pub micronutrients: Vec<Micronutrient>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ListRecommendationsResponse {
    pub recommendations: Vec<RecommendationWithNutrient>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserProfile>,
    pub total: usize,
}

/// Run `f` on a connection after checking the actor's role
fn as_admin<T>(db: &Database, actor_id: &str, f: impl FnOnce(&Connection) -> ToolResult<T>) -> ToolResult<T> {
    let conn = db.get_conn()?;
    UserProfile::require_admin(&conn, actor_id)?;
    f(&conn)
}

// Micronutrients

pub fn list_micronutrients(db: &Database) -> ToolResult<ListMicronutrientsResponse> {
    let conn = db.get_conn()?;
    let micronutrients = Micronutrient::list(&conn)?;
    let total = micronutrients.len();
    Ok(ListMicronutrientsResponse { micronutrients, total })
}

pub fn add_micronutrient(db: &Database, actor_id: &str, data: &MicronutrientCreate) -> ToolResult<Micronutrient> {
    as_admin(db, actor_id, |conn| {
        let m = Micronutrient::create(conn, data)?;
        tracing::info!(actor_id, code = %m.code, id = m.id, "Micronutrient added");
        Ok(m)
    })
}

pub fn update_micronutrient(
    db: &Database,
    actor_id: &str,
    id: i64,
    data: &MicronutrientUpdate,
) -> ToolResult<Option<Micronutrient>> {
    as_admin(db, actor_id, |conn| Ok(Micronutrient::update(conn, id, data)?))
}

/// Deleting a micronutrient also removes its measurements and recommendations
pub fn delete_micronutrient(db: &Database, actor_id: &str, id: i64) -> ToolResult<DeleteResponse> {
    as_admin(db, actor_id, |conn| {
        let success = Micronutrient::delete(conn, id)?;
        if success {
            tracing::info!(actor_id, id, "Micronutrient deleted");
        }
        Ok(DeleteResponse { success, deleted_id: id })
    })
}

// Survey questions

pub fn add_survey_question(db: &Database, actor_id: &str, data: &SurveyQuestionCreate) -> ToolResult<SurveyQuestion> {
    as_admin(db, actor_id, |conn| Ok(SurveyQuestion::create(conn, data)?))
}

pub fn update_survey_question(
    db: &Database,
    actor_id: &str,
    id: i64,
    data: &SurveyQuestionUpdate,
) -> ToolResult<Option<SurveyQuestion>> {
    as_admin(db, actor_id, |conn| Ok(SurveyQuestion::update(conn, id, data)?))
}

pub fn delete_survey_question(db: &Database, actor_id: &str, id: i64) -> ToolResult<DeleteResponse> {
    as_admin(db, actor_id, |conn| {
        let success = SurveyQuestion::delete(conn, id)?;
        Ok(DeleteResponse { success, deleted_id: id })
    })
}

// Recommendations

pub fn list_recommendations(db: &Database, active_only: bool) -> ToolResult<ListRecommendationsResponse> {
    let conn = db.get_conn()?;
    let recommendations = Recommendation::list_with_nutrient(&conn, active_only)?;
    let total = recommendations.len();
    Ok(ListRecommendationsResponse { recommendations, total })
}

pub fn add_recommendation(db: &Database, actor_id: &str, data: &RecommendationCreate) -> ToolResult<Recommendation> {
    as_admin(db, actor_id, |conn| {
        if Micronutrient::get_by_id(conn, data.micronutrient_id)?.is_none() {
            return Err(invalid(format!("Micronutrient {} not found", data.micronutrient_id)));
        }
        Ok(Recommendation::create(conn, data, Some(actor_id))?)
    })
}

pub fn update_recommendation(
    db: &Database,
    actor_id: &str,
    id: i64,
    data: &RecommendationUpdate,
) -> ToolResult<Option<Recommendation>> {
    as_admin(db, actor_id, |conn| Ok(Recommendation::update(conn, id, data)?))
}

pub fn delete_recommendation(db: &Database, actor_id: &str, id: i64) -> ToolResult<DeleteResponse> {
    as_admin(db, actor_id, |conn| {
        let success = Recommendation::delete(conn, id)?;
        Ok(DeleteResponse { success, deleted_id: id })
    })
}

// Users

pub fn list_users(db: &Database, actor_id: &str) -> ToolResult<ListUsersResponse> {
    as_admin(db, actor_id, |conn| {
        let users = UserProfile::list(conn)?;
        let total = users.len();
        Ok(ListUsersResponse { users, total })
    })
}

pub fn set_user_role(db: &Database, actor_id: &str, user_id: &str, role: &str) -> ToolResult<UserProfile> {
    let role = UserRole::from_str(role).ok_or_else(|| invalid(format!("Invalid role '{}': use user or admin", role)))?;
    as_admin(db, actor_id, |conn| {
        if actor_id == user_id && role != UserRole::Admin {
            return Err(invalid("Admins cannot remove their own admin role"));
        }
        UserProfile::ensure(conn, user_id)?;
        let profile = UserProfile::set_role(conn, user_id, role)?;
        tracing::info!(actor_id, user_id, role = role.as_str(), "User role changed");
        Ok(profile)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{Condition, RangeGender};
    use crate::tools::ToolError;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(crate::db::migrations::run_migrations).unwrap();
        db.with_conn(|conn| {
            UserProfile::ensure(conn, "admin")?;
            UserProfile::set_role(conn, "admin", UserRole::Admin)
        })
        .unwrap();
        db
    }

    fn zinc() -> MicronutrientCreate {
        MicronutrientCreate {
            code: "ZN".to_string(),
            name: "Zinc".to_string(),
            unit: "µg/dL".to_string(),
            normal_min: 70.0,
            normal_max: 120.0,
            age_min: None,
            age_max: None,
            gender: Some(RangeGender::Both),
            description: None,
        }
    }

    #[test]
    fn test_non_admin_is_refused() {
        let db = test_db();
        assert!(matches!(add_micronutrient(&db, "someone", &zinc()), Err(ToolError::Invalid(_))));
        assert!(matches!(list_users(&db, "someone"), Err(ToolError::Invalid(_))));
        assert_eq!(list_micronutrients(&db).unwrap().total, 0);
    }

    #[test]
    fn test_admin_manages_reference_data() {
        let db = test_db();
        let zn = add_micronutrient(&db, "admin", &zinc()).unwrap();
        assert_eq!(zn.code, "zn");

        let rec = add_recommendation(
            &db,
            "admin",
            &RecommendationCreate {
                micronutrient_id: zn.id,
                condition: Condition::Low,
                title: "More zinc".to_string(),
                content: "Pumpkin seeds, shellfish".to_string(),
                priority: Some(4),
                is_active: None,
            },
        )
        .unwrap();
        assert_eq!(rec.created_by.as_deref(), Some("admin"));

        let updated = update_recommendation(
            &db,
            "admin",
            rec.id,
            &RecommendationUpdate { is_active: Some(false), ..Default::default() },
        )
        .unwrap()
        .unwrap();
        assert!(!updated.is_active);
        assert_eq!(list_recommendations(&db, true).unwrap().total, 0);
        assert_eq!(list_recommendations(&db, false).unwrap().total, 1);

        assert!(delete_micronutrient(&db, "admin", zn.id).unwrap().success);
        assert_eq!(list_recommendations(&db, false).unwrap().total, 0);
    }

    #[test]
    fn test_recommendation_for_unknown_micronutrient() {
        let db = test_db();
        let result = add_recommendation(
            &db,
            "admin",
            &RecommendationCreate {
                micronutrient_id: 99,
                condition: Condition::High,
                title: "t".to_string(),
                content: String::new(),
                priority: None,
                is_active: None,
            },
        );
        assert!(matches!(result, Err(ToolError::Invalid(_))));
    }

    #[test]
    fn test_set_user_role() {
        let db = test_db();
        let profile = set_user_role(&db, "admin", "u2", "admin").unwrap();
        assert_eq!(profile.role, UserRole::Admin);
        assert!(matches!(set_user_role(&db, "admin", "u2", "root"), Err(ToolError::Invalid(_))));
        assert!(matches!(set_user_role(&db, "admin", "admin", "user"), Err(ToolError::Invalid(_))));
        assert_eq!(list_users(&db, "admin").unwrap().total, 2);
    }

    #[test]
    fn test_question_admin() {
        let db = test_db();
        let q = add_survey_question(
            &db,
            "admin",
            &SurveyQuestionCreate {
                question_number: 1,
                question_text: "Do you feel tired?".to_string(),
                nutrient_mapping: vec!["fe".to_string(), "b12".to_string()],
                order_index: None,
                is_active: None,
            },
        )
        .unwrap();

        let updated = update_survey_question(
            &db,
            "admin",
            q.id,
            &SurveyQuestionUpdate { is_active: Some(false), ..Default::default() },
        )
        .unwrap()
        .unwrap();
        assert!(!updated.is_active);
        assert!(delete_survey_question(&db, "admin", q.id).unwrap().success);
        assert!(!delete_survey_question(&db, "admin", q.id).unwrap().success);
    }
}
