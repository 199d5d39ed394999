//! User profile model
//!
//! One row per authenticated user. Holds the role used for admin checks and
//! the anthropometric fields the calculator reads.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::health::{ActivityLevel, AnthropometricProfile, Gender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub role: UserRole,
    pub full_name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial profile update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
}

impl UserProfile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let role: String = row.get("role")?;
        let gender: Option<String> = row.get("gender")?;
        let activity_level: Option<String> = row.get("activity_level")?;
        let age: Option<i64> = row.get("age")?;

        Ok(Self {
            id: row.get("id")?,
            role: UserRole::from_str(&role).unwrap_or(UserRole::User),
            full_name: row.get("full_name")?,
            age: age.and_then(|a| u32::try_from(a).ok()),
            gender: gender.as_deref().and_then(Gender::from_str),
            height_cm: row.get("height_cm")?,
            weight_kg: row.get("weight_kg")?,
            activity_level: activity_level.as_deref().and_then(ActivityLevel::from_str),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Fields the health calculator works from. Gender `other` reads as
    /// unset, since the BMR equation only has male and female forms.
    pub fn anthropometrics(&self) -> AnthropometricProfile {
        AnthropometricProfile {
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            age_years: self.age,
            gender: self.gender.filter(|g| *g != Gender::Other),
            activity_level: self.activity_level,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn get(conn: &Connection, id: &str) -> DbResult<Option<Self>> {
        let profile = conn
            .query_row("SELECT * FROM user_profiles WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(profile)
    }

    /// Get the profile, creating an empty one on first sight of a user
    pub fn ensure(conn: &Connection, id: &str) -> DbResult<Self> {
        conn.execute("INSERT OR IGNORE INTO user_profiles (id) VALUES (?1)", [id])?;
        Self::get(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM user_profiles ORDER BY created_at, id")?;
        let profiles = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    /// Create or update a profile
    pub fn upsert(conn: &Connection, id: &str, data: &ProfileUpdate) -> DbResult<Self> {
        data.validate()?;
        Self::ensure(conn, id)?;

        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref name) = data.full_name {
            updates.push(format!("full_name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.trim().to_string()));
        }
        if let Some(age) = data.age {
            updates.push(format!("age = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(age));
        }
        if let Some(gender) = data.gender {
            updates.push(format!("gender = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(gender.as_str()));
        }
        if let Some(height) = data.height_cm {
            updates.push(format!("height_cm = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(height));
        }
        if let Some(weight) = data.weight_kg {
            updates.push(format!("weight_kg = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(weight));
        }
        if let Some(level) = data.activity_level {
            updates.push(format!("activity_level = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(level.as_str()));
        }

        if !updates.is_empty() {
            updates.push("updated_at = datetime('now')".to_string());
            let sql = format!(
                "UPDATE user_profiles SET {} WHERE id = ?{}",
                updates.join(", "),
                params_vec.len() + 1
            );
            params_vec.push(Box::new(id.to_string()));

            let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
            conn.execute(&sql, params_refs.as_slice())?;
        }

        Self::get(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn set_role(conn: &Connection, id: &str, role: UserRole) -> DbResult<Self> {
        Self::ensure(conn, id)?;
        conn.execute(
            "UPDATE user_profiles SET role = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![role.as_str(), id],
        )?;
        Self::get(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Fail unless `actor_id` belongs to an admin
    pub fn require_admin(conn: &Connection, actor_id: &str) -> DbResult<Self> {
        match Self::get(conn, actor_id)? {
            Some(profile) if profile.is_admin() => Ok(profile),
            _ => {
                tracing::warn!(actor_id, "Admin action refused");
                Err(DbError::PermissionDenied(format!(
                    "user '{}' does not have the admin role",
                    actor_id
                )))
            }
        }
    }
}

impl ProfileUpdate {
    fn validate(&self) -> DbResult<()> {
        for (name, value) in [("height_cm", self.height_cm), ("weight_kg", self.weight_kg)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(DbError::Validation(format!("{} must be a positive number", name)));
                }
            }
        }
        if let Some(age) = self.age {
            if age == 0 || age > 150 {
                return Err(DbError::Validation("age must be between 1 and 150".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[test]
    fn test_upsert_creates_then_updates_partially() {
        let conn = test_connection();

        let created = UserProfile::upsert(
            &conn,
            "u1",
            &ProfileUpdate {
                full_name: Some("Anna".to_string()),
                height_cm: Some(168.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(created.full_name, "Anna");
        assert_eq!(created.role, UserRole::User);
        assert_eq!(created.weight_kg, None);

        let updated = UserProfile::upsert(
            &conn,
            "u1",
            &ProfileUpdate {
                weight_kg: Some(61.5),
                gender: Some(Gender::Female),
                activity_level: Some(ActivityLevel::Light),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.full_name, "Anna");
        assert_eq!(updated.height_cm, Some(168.0));
        assert_eq!(updated.weight_kg, Some(61.5));
        assert_eq!(updated.anthropometrics().activity_level, Some(ActivityLevel::Light));
    }

    #[test]
    fn test_upsert_rejects_nonsense_measurements() {
        let conn = test_connection();
        let err = UserProfile::upsert(
            &conn,
            "u1",
            &ProfileUpdate { height_cm: Some(0.0), ..Default::default() },
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert!(UserProfile::get(&conn, "u1").unwrap().is_none());
    }

    #[test]
    fn test_require_admin() {
        let conn = test_connection();
        UserProfile::ensure(&conn, "plain").unwrap();
        UserProfile::set_role(&conn, "boss", UserRole::Admin).unwrap();

        assert!(UserProfile::require_admin(&conn, "boss").is_ok());
        assert!(matches!(
            UserProfile::require_admin(&conn, "plain"),
            Err(DbError::PermissionDenied(_))
        ));
        assert!(matches!(
            UserProfile::require_admin(&conn, "nobody"),
            Err(DbError::PermissionDenied(_))
        ));
    }
}
