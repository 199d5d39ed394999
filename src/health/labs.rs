//! Lab result classification
//!
//! Compares a measured value against a micronutrient's reference range.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::metrics::Gender;

/// Where a measurement falls relative to its reference range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Low,
    Normal,
    High,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Low => "low",
            Condition::Normal => "normal",
            Condition::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Condition::Low),
            "normal" => Some(Condition::Normal),
            "high" => Some(Condition::High),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Condition::Low => "Low level",
            Condition::Normal => "Normal",
            Condition::High => "High level",
        }
    }
}

/// Which sex a reference range is defined for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeGender {
    Male,
    Female,
    Both,
}

impl RangeGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeGender::Male => "male",
            RangeGender::Female => "female",
            RangeGender::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Some(RangeGender::Male),
            "female" | "f" => Some(RangeGender::Female),
            "both" | "any" | "all" => Some(RangeGender::Both),
            _ => None,
        }
    }
}

/// Normal range for a micronutrient within a demographic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub normal_min: f64,
    pub normal_max: f64,
    pub age_min: u32,
    pub age_max: u32,
    pub gender: RangeGender,
}

impl ReferenceRange {
    /// Unknown age or gender never excludes a range
    pub fn applies_to(&self, age: Option<u32>, gender: Option<Gender>) -> bool {
        let age_ok = age.map_or(true, |a| a >= self.age_min && a <= self.age_max);
        let gender_ok = match (self.gender, gender) {
            (RangeGender::Both, _) | (_, None) => true,
            (RangeGender::Male, Some(g)) => g == Gender::Male,
            (RangeGender::Female, Some(g)) => g == Gender::Female,
        };
        age_ok && gender_ok
    }
}

/// Bounds are inclusive: a value on either edge is normal
pub fn classify_measurement(value: f64, range: &ReferenceRange) -> Condition {
    if value < range.normal_min {
        Condition::Low
    } else if value > range.normal_max {
        Condition::High
    } else {
        Condition::Normal
    }
}

/// Minimal view of a stored measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReading {
    pub id: i64,
    pub micronutrient_id: i64,
    pub value: f64,
    pub measured_at: String,
}

/// Newest reading per micronutrient, ordered by micronutrient id.
/// Ties on `measured_at` go to the higher id (entered later).
pub fn latest_by_micronutrient(readings: &[LabReading]) -> Vec<LabReading> {
    let mut latest: HashMap<i64, &LabReading> = HashMap::new();
    for reading in readings {
        latest
            .entry(reading.micronutrient_id)
            .and_modify(|current| {
                if (reading.measured_at.as_str(), reading.id)
                    > (current.measured_at.as_str(), current.id)
                {
                    *current = reading;
                }
            })
            .or_insert(reading);
    }

    let mut out: Vec<LabReading> = latest.into_values().cloned().collect();
    out.sort_by_key(|r| r.micronutrient_id);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> ReferenceRange {
        ReferenceRange {
            normal_min: 30.0,
            normal_max: 100.0,
            age_min: 18,
            age_max: 65,
            gender: RangeGender::Both,
        }
    }

    fn reading(id: i64, micronutrient_id: i64, value: f64, date: &str) -> LabReading {
        LabReading {
            id,
            micronutrient_id,
            value,
            measured_at: date.to_string(),
        }
    }

    #[test]
    fn test_classify_measurement() {
        let r = range();
        assert_eq!(classify_measurement(12.0, &r), Condition::Low);
        assert_eq!(classify_measurement(30.0, &r), Condition::Normal);
        assert_eq!(classify_measurement(100.0, &r), Condition::Normal);
        assert_eq!(classify_measurement(100.5, &r), Condition::High);
    }

    #[test]
    fn test_range_applies_to() {
        let mut r = range();
        assert!(r.applies_to(Some(40), Some(Gender::Female)));
        assert!(!r.applies_to(Some(70), Some(Gender::Female)));
        assert!(r.applies_to(None, None));

        r.gender = RangeGender::Male;
        assert!(r.applies_to(Some(40), Some(Gender::Male)));
        assert!(!r.applies_to(Some(40), Some(Gender::Female)));
        assert!(!r.applies_to(Some(40), Some(Gender::Other)));
        assert!(r.applies_to(Some(40), None));
    }

    #[test]
    fn test_latest_by_micronutrient() {
        let readings = vec![
            reading(1, 7, 20.0, "2026-01-10"),
            reading(2, 7, 35.0, "2026-03-02"),
            reading(3, 2, 1.1, "2026-02-01"),
            reading(4, 7, 40.0, "2026-03-02"),
            reading(5, 2, 0.9, "2025-12-01"),
        ];

        let latest = latest_by_micronutrient(&readings);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].id, 3);
        assert_eq!(latest[1].id, 4);
    }

    #[test]
    fn test_condition_round_trip_names() {
        for c in [Condition::Low, Condition::Normal, Condition::High] {
            assert_eq!(Condition::from_str(c.as_str()), Some(c));
        }
        assert_eq!(Condition::from_str("critical"), None);
    }
}
