//! Deficiency survey scoring
//!
//! Turns a completed questionnaire into per-nutrient deficiency percentages.
//! Every answer carries a weight (yes = 4, sometimes = 2, no = 0) and counts
//! toward each nutrient code its question is mapped to.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weight of the strongest answer; max_score is this times the question count
pub const MAX_ANSWER_WEIGHT: u32 = 4;

/// Lower bound (inclusive) of the `high` deficiency level, in percent
pub const HIGH_THRESHOLD: f64 = 75.0;
/// Lower bound (inclusive) of the `moderate` deficiency level, in percent
pub const MODERATE_THRESHOLD: f64 = 50.0;
/// Lower bound (inclusive) of the `light` deficiency level, in percent
pub const LIGHT_THRESHOLD: f64 = 25.0;

/// Answer choice for a survey question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerChoice {
    Yes,
    Sometimes,
    No,
}

impl AnswerChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerChoice::Yes => "yes",
            AnswerChoice::Sometimes => "sometimes",
            AnswerChoice::No => "no",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" => Some(AnswerChoice::Yes),
            "sometimes" | "maybe" => Some(AnswerChoice::Sometimes),
            "no" | "n" => Some(AnswerChoice::No),
            _ => None,
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            AnswerChoice::Yes => 4,
            AnswerChoice::Sometimes => 2,
            AnswerChoice::No => 0,
        }
    }
}

/// Severity of a suspected deficiency, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeficiencyLevel {
    Normal,
    Light,
    Moderate,
    High,
}

impl DeficiencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeficiencyLevel::Normal => "normal",
            DeficiencyLevel::Light => "light",
            DeficiencyLevel::Moderate => "moderate",
            DeficiencyLevel::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Some(DeficiencyLevel::Normal),
            "light" => Some(DeficiencyLevel::Light),
            "moderate" => Some(DeficiencyLevel::Moderate),
            "high" => Some(DeficiencyLevel::High),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DeficiencyLevel::Normal => "Normal",
            DeficiencyLevel::Light => "Light deficiency",
            DeficiencyLevel::Moderate => "Moderate deficiency",
            DeficiencyLevel::High => "High deficiency",
        }
    }

    /// Classify a percentage. A value exactly on a cut point lands in the
    /// more severe level.
    pub fn classify(percent: f64) -> Self {
        if percent >= HIGH_THRESHOLD {
            DeficiencyLevel::High
        } else if percent >= MODERATE_THRESHOLD {
            DeficiencyLevel::Moderate
        } else if percent >= LIGHT_THRESHOLD {
            DeficiencyLevel::Light
        } else {
            DeficiencyLevel::Normal
        }
    }

    pub fn is_deficient(&self) -> bool {
        *self != DeficiencyLevel::Normal
    }
}

/// A survey question as seen by the scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub number: i64,
    pub text: String,
    pub nutrient_mapping: Vec<String>,
    pub is_active: bool,
}

impl Question {
    /// Normalized, de-duplicated nutrient codes for this question
    pub fn nutrient_codes(&self) -> BTreeSet<String> {
        self.nutrient_mapping
            .iter()
            .map(|code| normalize_nutrient_code(code))
            .filter(|code| !code.is_empty())
            .collect()
    }
}

/// A single answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub choice: AnswerChoice,
}

impl Answer {
    pub fn new(choice: AnswerChoice) -> Self {
        Self { choice }
    }

    pub fn weight(&self) -> u32 {
        self.choice.weight()
    }
}

/// Scoring outcome for one nutrient code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResult {
    pub nutrient_code: String,
    pub score: u32,
    pub max_score: u32,
    pub percent: f64,
    pub level: DeficiencyLevel,
}

/// An active question with no answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingAnswer {
    pub question_id: String,
    pub number: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum SurveyError {
    #[error("Survey incomplete: {} of {total} active questions unanswered", .missing.len())]
    Incomplete {
        missing: Vec<MissingAnswer>,
        total: usize,
    },
}

pub fn normalize_nutrient_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Active questions that have no entry in `answers`, in question order
pub fn missing_answers(questions: &[Question], answers: &HashMap<String, Answer>) -> Vec<MissingAnswer> {
    questions
        .iter()
        .filter(|q| q.is_active && !answers.contains_key(&q.id))
        .map(|q| MissingAnswer {
            question_id: q.id.clone(),
            number: q.number,
        })
        .collect()
}

/// Score a completed survey.
///
/// Produces one result per nutrient code referenced by an active question,
/// sorted by nutrient code. Inactive questions and answers to unknown
/// questions are ignored. An unanswered active question rejects the whole
/// pass, so a partial survey never reports a deficiency that is too low.
pub fn score_survey(
    questions: &[Question],
    answers: &HashMap<String, Answer>,
) -> Result<Vec<SurveyResult>, SurveyError> {
    let missing = missing_answers(questions, answers);
    if !missing.is_empty() {
        let total = questions.iter().filter(|q| q.is_active).count();
        return Err(SurveyError::Incomplete { missing, total });
    }

    // nutrient code -> (score, contributing questions)
    let mut totals: BTreeMap<String, (u32, u32)> = BTreeMap::new();

    for question in questions.iter().filter(|q| q.is_active) {
        let Some(answer) = answers.get(&question.id) else {
            continue;
        };
        for code in question.nutrient_codes() {
            let entry = totals.entry(code).or_insert((0, 0));
            entry.0 += answer.weight();
            entry.1 += 1;
        }
    }

    let results = totals
        .into_iter()
        .filter_map(|(nutrient_code, (score, count))| {
            let max_score = MAX_ANSWER_WEIGHT * count;
            if max_score == 0 {
                return None;
            }
            let percent = 100.0 * f64::from(score) / f64::from(max_score);
            Some(SurveyResult {
                nutrient_code,
                score,
                max_score,
                percent,
                level: DeficiencyLevel::classify(percent),
            })
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, number: i64, codes: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            number,
            text: format!("Question {}", number),
            nutrient_mapping: codes.iter().map(|c| c.to_string()).collect(),
            is_active: true,
        }
    }

    fn answers(pairs: &[(&str, AnswerChoice)]) -> HashMap<String, Answer> {
        pairs
            .iter()
            .map(|(id, choice)| (id.to_string(), Answer::new(*choice)))
            .collect()
    }

    #[test]
    fn test_answer_weights() {
        assert_eq!(AnswerChoice::Yes.weight(), 4);
        assert_eq!(AnswerChoice::Sometimes.weight(), 2);
        assert_eq!(AnswerChoice::No.weight(), 0);
        assert_eq!(AnswerChoice::from_str(" Sometimes "), Some(AnswerChoice::Sometimes));
        assert_eq!(AnswerChoice::from_str("often"), None);
    }

    #[test]
    fn test_two_questions_same_nutrient() {
        let questions = vec![question("q1", 1, &["D"]), question("q2", 2, &["D"])];
        let answers = answers(&[("q1", AnswerChoice::Yes), ("q2", AnswerChoice::No)]);

        let results = score_survey(&questions, &answers).unwrap();
        assert_eq!(results.len(), 1);
        let d = &results[0];
        assert_eq!(d.nutrient_code, "d");
        assert_eq!(d.score, 4);
        assert_eq!(d.max_score, 8);
        assert!((d.percent - 50.0).abs() < 1e-9);
        assert_eq!(d.level, DeficiencyLevel::Moderate);
    }

    #[test]
    fn test_question_counts_toward_every_mapped_nutrient() {
        let questions = vec![
            question("q1", 1, &["mg", "b12"]),
            question("q2", 2, &["mg"]),
            question("q3", 3, &["fe"]),
        ];
        let answers = answers(&[
            ("q1", AnswerChoice::Yes),
            ("q2", AnswerChoice::Sometimes),
            ("q3", AnswerChoice::No),
        ]);

        let results = score_survey(&questions, &answers).unwrap();
        let codes: Vec<&str> = results.iter().map(|r| r.nutrient_code.as_str()).collect();
        assert_eq!(codes, vec!["b12", "fe", "mg"]);

        let b12 = &results[0];
        assert_eq!((b12.score, b12.max_score), (4, 4));
        assert_eq!(b12.level, DeficiencyLevel::High);

        let fe = &results[1];
        assert_eq!((fe.score, fe.max_score), (0, 4));
        assert_eq!(fe.level, DeficiencyLevel::Normal);

        let mg = &results[2];
        assert_eq!((mg.score, mg.max_score), (6, 8));
        assert!((mg.percent - 75.0).abs() < 1e-9);
        assert_eq!(mg.level, DeficiencyLevel::High);
    }

    #[test]
    fn test_duplicate_codes_in_one_question_count_once() {
        let questions = vec![question("q1", 1, &["D", " d ", "D"])];
        let answers = answers(&[("q1", AnswerChoice::Sometimes)]);

        let results = score_survey(&questions, &answers).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!((results[0].score, results[0].max_score), (2, 4));
    }

    #[test]
    fn test_incomplete_survey_is_rejected() {
        let questions = vec![question("q1", 1, &["d"]), question("q2", 2, &["d"])];
        let answers = answers(&[("q1", AnswerChoice::Yes)]);

        let err = score_survey(&questions, &answers).unwrap_err();
        match err {
            SurveyError::Incomplete { missing, total } => {
                assert_eq!(total, 2);
                assert_eq!(
                    missing,
                    vec![MissingAnswer { question_id: "q2".to_string(), number: 2 }]
                );
            }
        }
    }

    #[test]
    fn test_inactive_questions_and_stray_answers_ignored() {
        let mut inactive = question("q2", 2, &["zn"]);
        inactive.is_active = false;
        let questions = vec![question("q1", 1, &["d"]), inactive];
        let answers = answers(&[("q1", AnswerChoice::Yes), ("ghost", AnswerChoice::Yes)]);

        let results = score_survey(&questions, &answers).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].nutrient_code, "d");
    }

    #[test]
    fn test_question_without_mapping_produces_nothing() {
        let questions = vec![question("q1", 1, &[]), question("q2", 2, &["  "])];
        let answers = answers(&[("q1", AnswerChoice::Yes), ("q2", AnswerChoice::Yes)]);

        assert!(score_survey(&questions, &answers).unwrap().is_empty());
    }

    #[test]
    fn test_percent_within_bounds_for_all_weight_mixes() {
        let choices = [AnswerChoice::Yes, AnswerChoice::Sometimes, AnswerChoice::No];
        let questions = vec![
            question("q1", 1, &["x"]),
            question("q2", 2, &["x"]),
            question("q3", 3, &["x"]),
        ];
        for a in choices {
            for b in choices {
                for c in choices {
                    let answers = answers(&[("q1", a), ("q2", b), ("q3", c)]);
                    let results = score_survey(&questions, &answers).unwrap();
                    let result = &results[0];
                    assert_eq!(result.score, a.weight() + b.weight() + c.weight());
                    assert_eq!(result.max_score, 12);
                    assert!((0.0..=100.0).contains(&result.percent));
                }
            }
        }
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(DeficiencyLevel::classify(0.0), DeficiencyLevel::Normal);
        assert_eq!(DeficiencyLevel::classify(24.99), DeficiencyLevel::Normal);
        assert_eq!(DeficiencyLevel::classify(25.0), DeficiencyLevel::Light);
        assert_eq!(DeficiencyLevel::classify(50.0), DeficiencyLevel::Moderate);
        assert_eq!(DeficiencyLevel::classify(74.9), DeficiencyLevel::Moderate);
        assert_eq!(DeficiencyLevel::classify(75.0), DeficiencyLevel::High);
        assert_eq!(DeficiencyLevel::classify(100.0), DeficiencyLevel::High);
    }

    #[test]
    fn test_classify_is_monotonic() {
        let mut previous = DeficiencyLevel::classify(0.0);
        for step in 0..=1000 {
            let level = DeficiencyLevel::classify(step as f64 / 10.0);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let questions = vec![question("q1", 1, &["d", "ca"]), question("q2", 2, &["ca"])];
        let answers = answers(&[("q1", AnswerChoice::Sometimes), ("q2", AnswerChoice::Yes)]);

        let first = score_survey(&questions, &answers).unwrap();
        let second = score_survey(&questions, &answers).unwrap();
        assert_eq!(first, second);
    }
}
