//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
        tracing::info!("Applied schema migration v1");
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- USER PROFILES
        -- Identity comes from the auth service; id is its user id
        -- ============================================
        CREATE TABLE user_profiles (
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL CHECK(role IN ('user', 'admin')) DEFAULT 'user',
            full_name TEXT NOT NULL DEFAULT '',
            age INTEGER,
            gender TEXT CHECK(gender IN ('male', 'female', 'other')),
            height_cm REAL,
            weight_kg REAL,
            activity_level TEXT CHECK(activity_level IN ('sedentary', 'light', 'moderate', 'high', 'extreme')),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- MICRONUTRIENTS
        -- Reference ranges, one row per code + demographic
        -- ============================================
        CREATE TABLE micronutrients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,                  -- matches survey nutrient codes, lowercase
            name TEXT NOT NULL,
            unit TEXT NOT NULL,
            normal_min REAL NOT NULL,
            normal_max REAL NOT NULL,
            age_min INTEGER NOT NULL DEFAULT 0,
            age_max INTEGER NOT NULL DEFAULT 120,
            gender TEXT NOT NULL CHECK(gender IN ('male', 'female', 'both')) DEFAULT 'both',
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK(normal_min <= normal_max),
            CHECK(age_min <= age_max)
        );

        CREATE INDEX idx_micronutrients_code ON micronutrients(code);

        -- ============================================
        -- SURVEY QUESTIONS
        -- ============================================
        CREATE TABLE survey_questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_number INTEGER NOT NULL,
            question_text TEXT NOT NULL,
            nutrient_mapping TEXT NOT NULL DEFAULT '[]',  -- JSON array of codes
            order_index INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_survey_questions_order ON survey_questions(is_active, order_index);

        -- ============================================
        -- SURVEY ANSWERS
        -- In-progress answers, cleared on submit
        -- ============================================
        CREATE TABLE survey_answers (
            user_id TEXT NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
            question_id INTEGER NOT NULL REFERENCES survey_questions(id) ON DELETE CASCADE,
            answer TEXT NOT NULL CHECK(answer IN ('yes', 'sometimes', 'no')),
            answered_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, question_id)
        );

        -- ============================================
        -- SURVEY RESULTS
        -- One row per nutrient per submission
        -- ============================================
        CREATE TABLE survey_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
            submission_id INTEGER NOT NULL,       -- per-user counter, one per submit
            nutrient_code TEXT NOT NULL,
            score INTEGER NOT NULL,
            max_score INTEGER NOT NULL CHECK(max_score > 0),
            percent REAL NOT NULL,
            level TEXT NOT NULL CHECK(level IN ('normal', 'light', 'moderate', 'high')),
            completed_at TEXT NOT NULL
        );

        CREATE INDEX idx_survey_results_user ON survey_results(user_id, submission_id);

        -- ============================================
        -- MEASUREMENTS
        -- Lab results entered by users
        -- ============================================
        CREATE TABLE measurements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
            micronutrient_id INTEGER NOT NULL REFERENCES micronutrients(id) ON DELETE CASCADE,
            value REAL NOT NULL,
            measured_at TEXT NOT NULL,           -- YYYY-MM-DD
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_measurements_user ON measurements(user_id, measured_at);

        -- ============================================
        -- RECOMMENDATIONS
        -- ============================================
        CREATE TABLE recommendations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            micronutrient_id INTEGER NOT NULL REFERENCES micronutrients(id) ON DELETE CASCADE,
            condition TEXT NOT NULL CHECK(condition IN ('low', 'high', 'normal')),
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            priority INTEGER NOT NULL CHECK(priority BETWEEN 1 AND 5) DEFAULT 3,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            created_by TEXT
        );

        CREATE INDEX idx_recommendations_micronutrient ON recommendations(micronutrient_id, condition);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
