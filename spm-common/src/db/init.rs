//! Database initialization
//!
//! Opens (or creates) the SQLite database and brings the schema up to date.
//! Every statement is idempotent, so this runs on each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys and busy timeout are per-connection settings, so they go
    // on the connect options rather than a one-off PRAGMA
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        password_salt TEXT NOT NULL,
        full_name TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        is_superuser INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        expires_at TIMESTAMP NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS departments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS batches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        year INTEGER NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (name, year)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS class_sections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
        batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (name, department_id, batch_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS student_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        roll_number TEXT NOT NULL UNIQUE,
        department_id INTEGER REFERENCES departments(id) ON DELETE SET NULL,
        batch_id INTEGER REFERENCES batches(id) ON DELETE SET NULL,
        class_section_id INTEGER REFERENCES class_sections(id) ON DELETE SET NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS faculty_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        department_id INTEGER REFERENCES departments(id) ON DELETE SET NULL,
        is_hod INTEGER NOT NULL DEFAULT 0,
        is_coordinator INTEGER NOT NULL DEFAULT 0,
        is_supervisor INTEGER NOT NULL DEFAULT 0,
        is_evaluator INTEGER NOT NULL DEFAULT 0,
        is_advisor INTEGER NOT NULL DEFAULT 0,
        is_principal INTEGER NOT NULL DEFAULT 0,
        advisor_section_id INTEGER REFERENCES class_sections(id) ON DELETE SET NULL,
        freeze_count INTEGER NOT NULL DEFAULT 0,
        unfreeze_count INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
        batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
        class_section_id INTEGER NOT NULL REFERENCES class_sections(id) ON DELETE CASCADE,
        leader_id INTEGER NOT NULL UNIQUE REFERENCES student_profiles(id) ON DELETE CASCADE,
        mentor_id INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (name, batch_id, class_section_id)
    )
    "#,
    // A student belongs to at most one team
    r#"
    CREATE TABLE IF NOT EXISTS team_members (
        team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL UNIQUE REFERENCES student_profiles(id) ON DELETE CASCADE,
        joined_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (team_id, student_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invitations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        from_student_id INTEGER NOT NULL REFERENCES student_profiles(id) ON DELETE CASCADE,
        to_student_id INTEGER NOT NULL REFERENCES student_profiles(id) ON DELETE CASCADE,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        responded_at TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_invitations_to ON invitations(to_student_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS project_proposals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_id INTEGER NOT NULL UNIQUE REFERENCES teams(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        abstract_text TEXT NOT NULL,
        preferred_mentor_id INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        reviewer_comment TEXT NOT NULL DEFAULT '',
        reviewed_by INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS proposal_documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        proposal_id INTEGER NOT NULL REFERENCES project_proposals(id) ON DELETE CASCADE,
        file_name TEXT NOT NULL,
        stored_path TEXT NOT NULL,
        size_bytes INTEGER NOT NULL DEFAULT 0,
        version INTEGER NOT NULL DEFAULT 1,
        uploaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (proposal_id, version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        review_type TEXT NOT NULL,
        date_time TIMESTAMP,
        grace_days INTEGER NOT NULL DEFAULT 0 CHECK (grace_days BETWEEN 0 AND 2),
        evaluator1_id INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        evaluator2_id INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        requirements TEXT NOT NULL DEFAULT '',
        hod_freeze_state TEXT NOT NULL DEFAULT 'not_frozen',
        first_freeze_at TIMESTAMP,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (team_id, review_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS management_windows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
        batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
        review_type TEXT NOT NULL,
        start_date DATE,
        end_date DATE,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (department_id, batch_id, review_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rubric_templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        review_type TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (name, review_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rubric_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        template_id INTEGER NOT NULL REFERENCES rubric_templates(id) ON DELETE CASCADE,
        item_order INTEGER NOT NULL,
        title TEXT NOT NULL,
        max_score INTEGER NOT NULL DEFAULT 5 CHECK (max_score >= 0),
        UNIQUE (template_id, item_order)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS panel_evaluations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL REFERENCES student_profiles(id) ON DELETE CASCADE,
        rubric_item_id INTEGER NOT NULL REFERENCES rubric_items(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        score INTEGER CHECK (score IS NULL OR score >= 0),
        comment TEXT NOT NULL DEFAULT '',
        version_group_id TEXT NOT NULL DEFAULT 'v1',
        version_number INTEGER NOT NULL DEFAULT 1,
        entered_by INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (review_id, student_id, rubric_item_id, role, version_number)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_panel_evaluations_review ON panel_evaluations(review_id, role, version_number)",
    r#"
    CREATE TABLE IF NOT EXISTS freeze_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
        action TEXT NOT NULL,
        by_id INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        reason TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS review_files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
        file_name TEXT NOT NULL,
        stored_path TEXT NOT NULL,
        size_bytes INTEGER NOT NULL DEFAULT 0,
        version INTEGER NOT NULL DEFAULT 1,
        uploaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (review_id, version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS date_change_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
        old_date TIMESTAMP,
        new_date TIMESTAMP,
        changed_by_id INTEGER REFERENCES faculty_profiles(id) ON DELETE SET NULL,
        reason TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];
