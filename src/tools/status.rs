//! NutriCheck Status Tool
//!
//! Provides runtime status information about the NutriCheck service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;

/// Survey workflow instructions for AI assistants
pub const SURVEY_INSTRUCTIONS: &str = r#"
# NutriCheck Survey Instructions

NutriCheck screens for likely micronutrient deficiencies from a short
symptom survey and from lab results the user enters.

## Identifying the user

Every user-facing tool takes a `user_id`. Use the same id for the whole
conversation. A profile is created automatically the first time an id is
seen.

---

## Running the survey

1. Call `list_survey_questions` to see the active questions in order.
2. Ask the user each question and record the reply with
   `answer_survey_question(user_id, question_id, answer)`.
   - `answer` must be one of `yes`, `sometimes`, `no`.
   - Answering the same question again replaces the earlier answer.
3. Use `get_survey_progress` to find the next unanswered question.
4. When every active question is answered, call `submit_survey`.

### Scoring

| Answer | Points |
|--------|--------|
| yes | 4 |
| sometimes | 2 |
| no | 0 |

Each question counts toward every nutrient it is mapped to. For each
nutrient, `percent = score / max_score × 100`:

| Percent | Level |
|---------|-------|
| 75 and above | high |
| 50 to below 75 | moderate |
| 25 to below 50 | light |
| below 25 | normal |

### Incomplete surveys

`submit_survey` on an incomplete survey stores nothing. It returns
`status: "incomplete"` with the list of missing questions. Ask those and
submit again. `reset_survey` discards all pending answers.

---

## Lab results

- `list_micronutrients` shows the available codes, units and normal ranges.
- `add_measurement(user_id, micronutrient_id, value, measured_at)` records a
  result. `measured_at` is `YYYY-MM-DD` and defaults to today.
- `get_lab_status` classifies the newest value per micronutrient as `low`,
  `normal` or `high`. Ranges matching the user's age and gender are
  preferred, so fill in the profile first.

---

## Recommendations

`get_recommendations(user_id)` combines the latest survey submission with
the newest lab values. A lab result overrides the survey for the same
nutrient. With nothing abnormal, the general list is returned.

---

## Profile and health metrics

`upsert_profile` stores height (cm), weight (kg), age, gender and activity
level. `get_health_metrics` then reports:

- **BMI** = weight / height(m)², one decimal
- **BMR** (Mifflin-St Jeor): 10×weight + 6.25×height − 5×age, +5 for men,
  −161 for women
- **TDEE** = BMR × PAL

| Activity level | PAL |
|----------------|-----|
| sedentary | 1.2 |
| light | 1.375 |
| moderate | 1.55 |
| high | 1.725 |
| extreme | 1.9 |

`calculate_health_metrics` does the same for ad-hoc values without storing
anything.

---

## Disclaimer

The survey is a screening aid, not a diagnosis. Suggest that users with
high or moderate levels discuss them with a clinician.
"#;

/// Runtime status of the NutriCheck service
#[derive(Debug, Serialize)]
pub struct NutriCheckStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    pub fn get_status(&self) -> NutriCheckStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        NutriCheckStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
