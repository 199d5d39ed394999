//! Anthropometric calculations
//!
//! BMI, basal metabolic rate (Mifflin-St Jeor) and total daily energy
//! expenditure. Every metric is optional: a missing input yields `None`
//! rather than a zero that could be mistaken for a measurement.

use serde::{Deserialize, Serialize};

/// Gender as recorded on a user profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// Activity tier, mapped to a Physical Activity Level multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    High,
    Extreme,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::High => "high",
            ActivityLevel::Extreme => "extreme",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sedentary" => Some(ActivityLevel::Sedentary),
            "light" | "lightly_active" => Some(ActivityLevel::Light),
            "moderate" | "moderately_active" => Some(ActivityLevel::Moderate),
            "high" | "very_active" => Some(ActivityLevel::High),
            "extreme" | "extra_active" => Some(ActivityLevel::Extreme),
            _ => None,
        }
    }

    /// Physical Activity Level multiplier
    pub fn pal(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::High => 1.725,
            ActivityLevel::Extreme => 1.9,
        }
    }
}

/// BMI band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "underweight",
            BmiCategory::Normal => "normal",
            BmiCategory::Overweight => "overweight",
            BmiCategory::Obese => "obese",
        }
    }

    /// Lower bounds are inclusive, upper bounds exclusive
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }
}

/// Inputs for the calculator. Any field may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnthropometricProfile {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub age_years: Option<u32>,
    pub gender: Option<Gender>,
    pub activity_level: Option<ActivityLevel>,
}

/// Derived metrics; recomputed on demand, never stored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub bmi: Option<f64>,
    pub bmr: Option<i64>,
    pub tdee: Option<i64>,
    pub bmi_category: Option<BmiCategory>,
}

/// Round half toward positive infinity
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Body mass index, kg/m², one decimal place
pub fn bmi(profile: &AnthropometricProfile) -> Option<f64> {
    let height_m = positive(profile.height_cm)? / 100.0;
    let weight = positive(profile.weight_kg)?;
    let raw = weight / (height_m * height_m);
    Some(round_half_up(raw * 10.0) / 10.0)
}

/// Basal metabolic rate in kcal/day (Mifflin-St Jeor)
pub fn bmr(profile: &AnthropometricProfile) -> Option<i64> {
    let height = positive(profile.height_cm)?;
    let weight = positive(profile.weight_kg)?;
    let age = f64::from(profile.age_years.filter(|a| *a > 0)?);
    let offset = match profile.gender? {
        Gender::Male => 5.0,
        Gender::Female => -161.0,
        // The equation is only defined for the two sexes it was fitted on
        Gender::Other => return None,
    };
    let value = 10.0 * weight + 6.25 * height - 5.0 * age + offset;
    Some(round_half_up(value) as i64)
}

/// Total daily energy expenditure in kcal/day
pub fn tdee(profile: &AnthropometricProfile) -> Option<i64> {
    let bmr = bmr(profile)?;
    let pal = profile.activity_level?.pal();
    Some(round_half_up(bmr as f64 * pal) as i64)
}

pub fn calculate(profile: &AnthropometricProfile) -> HealthMetrics {
    let bmi = bmi(profile);
    HealthMetrics {
        bmi,
        bmr: bmr(profile),
        tdee: tdee(profile),
        bmi_category: bmi.map(BmiCategory::from_bmi),
    }
}
