//! Recommendation selection
//!
//! Combines survey and lab findings into per-nutrient conditions and picks
//! matching recommendations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::labs::Condition;
use super::survey::{normalize_nutrient_code, SurveyResult};

/// Maximum number of recommendations returned in one selection
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Survey,
    Lab,
}

/// A nutrient whose status is outside normal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub nutrient_code: String,
    pub condition: Condition,
    pub source: FindingSource,
}

/// A recommendation reduced to the fields selection needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub nutrient_code: String,
    pub condition: Condition,
    pub priority: u8,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBand {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityBand {
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            p if p >= 5 => PriorityBand::Critical,
            4 => PriorityBand::High,
            3 => PriorityBand::Medium,
            _ => PriorityBand::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityBand::Low => "low",
            PriorityBand::Medium => "medium",
            PriorityBand::High => "high",
            PriorityBand::Critical => "critical",
        }
    }
}

/// Merge survey and lab evidence into one finding per nutrient.
///
/// A deficient survey level reads as `low`. A lab condition for the same
/// nutrient replaces the survey finding, and a normal lab value clears it.
pub fn collect_findings(survey: &[SurveyResult], labs: &[(String, Condition)]) -> Vec<Finding> {
    let mut findings: BTreeMap<String, Finding> = BTreeMap::new();

    for result in survey.iter().filter(|r| r.level.is_deficient()) {
        let code = normalize_nutrient_code(&result.nutrient_code);
        findings.insert(
            code.clone(),
            Finding {
                nutrient_code: code,
                condition: Condition::Low,
                source: FindingSource::Survey,
            },
        );
    }

    for (code, condition) in labs {
        let code = normalize_nutrient_code(code);
        if *condition == Condition::Normal {
            findings.remove(&code);
        } else {
            findings.insert(
                code.clone(),
                Finding {
                    nutrient_code: code,
                    condition: *condition,
                    source: FindingSource::Lab,
                },
            );
        }
    }

    findings.into_values().collect()
}

fn by_priority(a: &&Candidate, b: &&Candidate) -> std::cmp::Ordering {
    b.priority.cmp(&a.priority).then(a.id.cmp(&b.id))
}

/// Active candidates matching a finding, highest priority first.
///
/// With no findings the general list is returned instead: every active
/// candidate, highest priority first.
pub fn select<'a>(candidates: &'a [Candidate], findings: &[Finding], limit: usize) -> Vec<&'a Candidate> {
    let mut selected: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.is_active)
        .filter(|c| {
            findings.is_empty()
                || findings.iter().any(|f| {
                    f.condition == c.condition
                        && f.nutrient_code == normalize_nutrient_code(&c.nutrient_code)
                })
        })
        .collect();

    selected.sort_by(by_priority);
    selected.truncate(limit);
    selected
}
