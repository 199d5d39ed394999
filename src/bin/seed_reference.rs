//! Utility to load the default micronutrient and survey reference data
//!
//! Usage: seed_reference [--admin <user_id>]
//!
//! Rows that already exist (same micronutrient code, same question number)
//! are left alone, so running it twice is harmless.

use nutricheck::health::RangeGender;
use nutricheck::models::{
    Micronutrient, MicronutrientCreate, SurveyQuestion, SurveyQuestionCreate, UserProfile, UserRole,
};

/// (code, name, unit, normal_min, normal_max, description)
const MICRONUTRIENTS: &[(&str, &str, &str, f64, f64, &str)] = &[
    ("d", "Vitamin D (25-OH)", "ng/mL", 30.0, 100.0, "Bone health and immunity"),
    ("b12", "Vitamin B12", "pg/mL", 200.0, 900.0, "Nerve function and red blood cells"),
    ("fe", "Ferritin", "ng/mL", 15.0, 150.0, "Iron stores"),
    ("mg", "Magnesium", "mg/dL", 1.7, 2.2, "Muscle and nerve function"),
    ("zn", "Zinc", "µg/dL", 70.0, 120.0, "Immunity and wound healing"),
    ("ca", "Calcium", "mg/dL", 8.6, 10.3, "Bones, muscle contraction"),
    ("b9", "Folate", "ng/mL", 3.0, 17.0, "Cell division and blood formation"),
    ("i", "Iodine (urinary)", "µg/L", 100.0, 199.0, "Thyroid function"),
];

/// (number, text, nutrient codes)
const QUESTIONS: &[(i64, &str, &[&str])] = &[
    (1, "Do you often feel tired or low on energy?", &["fe", "b12", "d", "mg"]),
    (2, "Do you get muscle cramps or twitching?", &["mg", "ca", "d"]),
    (3, "Do your hair or nails break easily?", &["zn", "fe"]),
    (4, "Do you catch colds or infections often?", &["d", "zn"]),
    (5, "Do you feel tingling or numbness in hands or feet?", &["b12", "b9"]),
    (6, "Are you pale or short of breath on exertion?", &["fe", "b12", "b9"]),
    (7, "Do small cuts or wounds heal slowly?", &["zn"]),
    (8, "Do you spend little time outdoors in daylight?", &["d"]),
    (9, "Do you have trouble sleeping or feel anxious?", &["mg"]),
    (10, "Do you feel cold when others do not?", &["i", "fe"]),
    (11, "Do you rarely eat dairy products?", &["ca", "d"]),
    (12, "Do you rarely eat meat, fish or eggs?", &["b12", "fe", "zn"]),
];

fn seed_micronutrients(conn: &rusqlite::Connection) -> nutricheck::db::DbResult<usize> {
    let mut added = 0;
    for &(code, name, unit, normal_min, normal_max, description) in MICRONUTRIENTS {
        if !Micronutrient::list_by_code(conn, code)?.is_empty() {
            continue;
        }
        Micronutrient::create(
            conn,
            &MicronutrientCreate {
                code: code.to_string(),
                name: name.to_string(),
                unit: unit.to_string(),
                normal_min,
                normal_max,
                age_min: None,
                age_max: None,
                gender: Some(RangeGender::Both),
                description: Some(description.to_string()),
            },
        )?;
        added += 1;
    }
    Ok(added)
}

fn seed_questions(conn: &rusqlite::Connection) -> nutricheck::db::DbResult<usize> {
    let existing: Vec<i64> = SurveyQuestion::list(conn, false)?
        .iter()
        .map(|q| q.question_number)
        .collect();

    let mut added = 0;
    for &(number, text, codes) in QUESTIONS {
        if existing.contains(&number) {
            continue;
        }
        SurveyQuestion::create(
            conn,
            &SurveyQuestionCreate {
                question_number: number,
                question_text: text.to_string(),
                nutrient_mapping: codes.iter().map(|c| c.to_string()).collect(),
                order_index: None,
                is_active: None,
            },
        )?;
        added += 1;
    }
    Ok(added)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let admin = match args.as_slice() {
        [] => None,
        [flag, id] if flag == "--admin" => Some(id.clone()),
        _ => return Err("usage: seed_reference [--admin <user_id>]".into()),
    };

    let db_path = nutricheck::config::database_path();
    println!("Database path: {}", db_path.display());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = nutricheck::db::Database::new(&db_path)?;
    database.with_conn(|conn| {
        nutricheck::db::migrations::run_migrations(conn)?;
        Ok(())
    })?;

    database.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let nutrients = seed_micronutrients(&tx)?;
        let questions = seed_questions(&tx)?;
        tx.commit()?;
        println!("Micronutrients added: {}", nutrients);
        println!("Survey questions added: {}", questions);
        Ok(())
    })?;

    if let Some(user_id) = admin {
        database.with_conn(|conn| {
            UserProfile::ensure(conn, &user_id)?;
            let profile = UserProfile::set_role(conn, &user_id, UserRole::Admin)?;
            println!("User '{}' is now {}", profile.id, profile.role.as_str());
            Ok(())
        })?;
    }

    Ok(())
}
