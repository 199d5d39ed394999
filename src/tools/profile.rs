//! Profile and health metric tools

use serde::Serialize;

use crate::db::Database;
use crate::health::{calculate_metrics, AnthropometricProfile, Gender, HealthMetrics};
use crate::models::{ProfileUpdate, UserProfile};

use super::ToolResult;

/// Health metrics with the inputs they came from
#[derive(Debug, Serialize)]
pub struct HealthMetricsResponse {
    pub inputs: AnthropometricProfile,
    pub metrics: HealthMetrics,
    pub pal: Option<f64>,
    /// Inputs that must be filled in before every metric can be shown
    pub missing_inputs: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: UserProfile,
    pub health: HealthMetricsResponse,
}

fn missing_inputs(p: &AnthropometricProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if p.height_cm.map_or(true, |h| h <= 0.0) {
        missing.push("height_cm");
    }
    if p.weight_kg.map_or(true, |w| w <= 0.0) {
        missing.push("weight_kg");
    }
    if p.age_years.map_or(true, |a| a == 0) {
        missing.push("age");
    }
    if p.gender.map_or(true, |g| g == Gender::Other) {
        missing.push("gender");
    }
    if p.activity_level.is_none() {
        missing.push("activity_level");
    }
    missing
}

/// Compute metrics for an ad-hoc profile; nothing is stored
pub fn calculate_health_metrics(inputs: AnthropometricProfile) -> HealthMetricsResponse {
    HealthMetricsResponse {
        metrics: calculate_metrics(&inputs),
        pal: inputs.activity_level.map(|a| a.pal()),
        missing_inputs: missing_inputs(&inputs),
        inputs,
    }
}

pub fn get_profile(db: &Database, user_id: &str) -> ToolResult<Option<ProfileResponse>> {
    let conn = db.get_conn()?;
    Ok(UserProfile::get(&conn, user_id)?.map(|profile| ProfileResponse {
        health: calculate_health_metrics(profile.anthropometrics()),
        profile,
    }))
}

pub fn upsert_profile(db: &Database, user_id: &str, data: &ProfileUpdate) -> ToolResult<ProfileResponse> {
    let conn = db.get_conn()?;
    let profile = UserProfile::upsert(&conn, user_id, data)?;
    tracing::debug!(user_id, "Profile updated");
    Ok(ProfileResponse {
        health: calculate_health_metrics(profile.anthropometrics()),
        profile,
    })
}

/// Metrics for a stored profile. Unknown users get an all-empty result.
pub fn get_health_metrics(db: &Database, user_id: &str) -> ToolResult<HealthMetricsResponse> {
    let conn = db.get_conn()?;
    let inputs = UserProfile::get(&conn, user_id)?
        .map(|p| p.anthropometrics())
        .unwrap_or_default();
    Ok(calculate_health_metrics(inputs))
}
