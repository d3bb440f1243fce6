//! Scheduled reviews, freeze history, date changes, review files and
//! management windows

use chrono::{NaiveDate, NaiveDateTime};
use spm_common::db::{
    DateChangeHistory, FreezeAction, FreezeHistory, FreezeState, ManagementWindow, Review,
    ReviewFile, ReviewType,
};
use spm_common::review::next_version;
use spm_common::time;
use spm_common::{Error, Result};
use sqlx::SqlitePool;

use super::proposals::NewDocument;

/// Schedule fields a coordinator sets on a review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSchedule {
    pub date_time: Option<NaiveDateTime>,
    pub grace_days: i64,
    pub evaluator1_id: Option<i64>,
    pub evaluator2_id: Option<i64>,
    pub requirements: String,
}

pub async fn create(
    pool: &SqlitePool,
    team_id: i64,
    review_type: ReviewType,
    schedule: &ReviewSchedule,
) -> Result<Review> {
    let now = time::now();
    let id = sqlx::query(
        r#"
        INSERT INTO reviews (
            team_id, review_type, date_time, grace_days, evaluator1_id, evaluator2_id,
            requirements, hod_freeze_state, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'not_frozen', ?, ?)
        "#,
    )
    .bind(team_id)
    .bind(review_type)
    .bind(schedule.date_time)
    .bind(schedule.grace_days)
    .bind(schedule.evaluator1_id)
    .bind(schedule.evaluator2_id)
    .bind(&schedule.requirements)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    fetch(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Review>> {
    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(review)
}

async fn fetch(pool: &SqlitePool, id: i64) -> Result<Review> {
    get(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound("Review not found.".to_string()))
}

/// Reviews for a team in zeroth, first, second order
pub async fn for_team(pool: &SqlitePool, team_id: i64) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(
        r#"
        SELECT * FROM reviews WHERE team_id = ?
        ORDER BY CASE review_type WHEN 'zeroth' THEN 0 WHEN 'first' THEN 1 ELSE 2 END
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

pub async fn for_department(pool: &SqlitePool, department_id: i64) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(
        r#"
        SELECT r.* FROM reviews r
        JOIN teams t ON t.id = r.team_id
        WHERE t.department_id = ?
        ORDER BY r.date_time IS NULL, r.date_time, r.id
        "#,
    )
    .bind(department_id)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

pub async fn all(pool: &SqlitePool) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews ORDER BY date_time IS NULL, date_time, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

/// Reviews where the faculty member sits on the panel as an evaluator
pub async fn for_evaluator(pool: &SqlitePool, faculty_id: i64) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(
        r#"
        SELECT * FROM reviews
        WHERE evaluator1_id = ? OR evaluator2_id = ?
        ORDER BY date_time IS NULL, date_time, id
        "#,
    )
    .bind(faculty_id)
    .bind(faculty_id)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

/// Update a review's schedule
///
/// A changed date is written to `date_change_history` in the same
/// transaction as the schedule itself. The freeze state is re-read inside
/// the transaction; a hard-locked review cannot be rescheduled.
pub async fn update_schedule(
    pool: &SqlitePool,
    review_id: i64,
    schedule: &ReviewSchedule,
    changed_by_id: i64,
    reason: &str,
) -> Result<Review> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Review not found.".to_string()))?;

    if current.hod_freeze_state == FreezeState::HardLocked {
        return Err(Error::Conflict("This review is hard locked.".to_string()));
    }

    sqlx::query(
        r#"
        UPDATE reviews
        SET date_time = ?, grace_days = ?, evaluator1_id = ?, evaluator2_id = ?,
            requirements = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(schedule.date_time)
    .bind(schedule.grace_days)
    .bind(schedule.evaluator1_id)
    .bind(schedule.evaluator2_id)
    .bind(&schedule.requirements)
    .bind(now)
    .bind(review_id)
    .execute(&mut *tx)
    .await?;

    if current.date_time != schedule.date_time {
        sqlx::query(
            r#"
            INSERT INTO date_change_history (review_id, old_date, new_date, changed_by_id, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(review_id)
        .bind(current.date_time)
        .bind(schedule.date_time)
        .bind(changed_by_id)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let updated = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(review_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Apply an HOD freeze action
///
/// The state change, the history row and the HOD's counter move together.
/// `first_freeze_at` is only ever set once.
pub async fn apply_freeze_action(
    pool: &SqlitePool,
    review_id: i64,
    action: FreezeAction,
    hod_id: i64,
    reason: &str,
) -> Result<Review> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    let state = sqlx::query_scalar::<_, FreezeState>("SELECT hod_freeze_state FROM reviews WHERE id = ?")
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Review not found.".to_string()))?;

    let next = state.apply(action)?;
    let freeze_stamp = next.is_frozen().then_some(now);

    sqlx::query(
        r#"
        UPDATE reviews
        SET hod_freeze_state = ?, first_freeze_at = COALESCE(first_freeze_at, ?), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(next)
    .bind(freeze_stamp)
    .bind(now)
    .bind(review_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO freeze_history (review_id, action, by_id, reason, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(review_id)
    .bind(action)
    .bind(hod_id)
    .bind(reason)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let counter = match action {
        FreezeAction::Unfreeze => "UPDATE faculty_profiles SET unfreeze_count = unfreeze_count + 1 WHERE id = ?",
        FreezeAction::Freeze | FreezeAction::HardLock => {
            "UPDATE faculty_profiles SET freeze_count = freeze_count + 1 WHERE id = ?"
        }
    };
    sqlx::query(counter).bind(hod_id).execute(&mut *tx).await?;

    let updated = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(review_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(updated)
}

pub async fn freeze_history(pool: &SqlitePool, review_id: i64) -> Result<Vec<FreezeHistory>> {
    let history = sqlx::query_as::<_, FreezeHistory>(
        "SELECT * FROM freeze_history WHERE review_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(review_id)
    .fetch_all(pool)
    .await?;
    Ok(history)
}

/// Most recent freeze actions across all reviews
pub async fn recent_freeze_history(pool: &SqlitePool, limit: i64) -> Result<Vec<FreezeHistory>> {
    let history = sqlx::query_as::<_, FreezeHistory>(
        "SELECT * FROM freeze_history ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(history)
}

pub async fn date_changes(pool: &SqlitePool, review_id: i64) -> Result<Vec<DateChangeHistory>> {
    let changes = sqlx::query_as::<_, DateChangeHistory>(
        "SELECT * FROM date_change_history WHERE review_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(review_id)
    .fetch_all(pool)
    .await?;
    Ok(changes)
}

// ========================================
// Review files
// ========================================

pub async fn add_file(pool: &SqlitePool, review_id: i64, file: &NewDocument<'_>) -> Result<ReviewFile> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(version) FROM review_files WHERE review_id = ?",
    )
    .bind(review_id)
    .fetch_one(&mut *tx)
    .await?;

    let id = sqlx::query(
        r#"
        INSERT INTO review_files (review_id, file_name, stored_path, size_bytes, version, uploaded_by, uploaded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(review_id)
    .bind(file.file_name)
    .bind(file.stored_path)
    .bind(file.size_bytes)
    .bind(next_version(current))
    .bind(file.uploaded_by)
    .bind(time::now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let stored = sqlx::query_as::<_, ReviewFile>("SELECT * FROM review_files WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(stored)
}

pub async fn files(pool: &SqlitePool, review_id: i64) -> Result<Vec<ReviewFile>> {
    let files = sqlx::query_as::<_, ReviewFile>(
        "SELECT * FROM review_files WHERE review_id = ? ORDER BY version DESC",
    )
    .bind(review_id)
    .fetch_all(pool)
    .await?;
    Ok(files)
}

pub async fn get_file(pool: &SqlitePool, review_id: i64, file_id: i64) -> Result<Option<ReviewFile>> {
    let file = sqlx::query_as::<_, ReviewFile>("SELECT * FROM review_files WHERE id = ? AND review_id = ?")
        .bind(file_id)
        .bind(review_id)
        .fetch_optional(pool)
        .await?;
    Ok(file)
}

// ========================================
// Management windows
// ========================================

pub async fn window(
    pool: &SqlitePool,
    department_id: i64,
    batch_id: i64,
    review_type: ReviewType,
) -> Result<Option<ManagementWindow>> {
    let window = sqlx::query_as::<_, ManagementWindow>(
        r#"
        SELECT * FROM management_windows
        WHERE department_id = ? AND batch_id = ? AND review_type = ?
        "#,
    )
    .bind(department_id)
    .bind(batch_id)
    .bind(review_type)
    .fetch_optional(pool)
    .await?;
    Ok(window)
}

pub async fn windows_for_department(
    pool: &SqlitePool,
    department_id: i64,
) -> Result<Vec<ManagementWindow>> {
    let windows = sqlx::query_as::<_, ManagementWindow>(
        "SELECT * FROM management_windows WHERE department_id = ? ORDER BY batch_id, review_type",
    )
    .bind(department_id)
    .fetch_all(pool)
    .await?;
    Ok(windows)
}

/// Create or replace the window for a department, batch and review type
pub async fn upsert_window(
    pool: &SqlitePool,
    department_id: i64,
    batch_id: i64,
    review_type: ReviewType,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<ManagementWindow> {
    sqlx::query(
        r#"
        INSERT INTO management_windows (department_id, batch_id, review_type, start_date, end_date, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (department_id, batch_id, review_type)
        DO UPDATE SET start_date = excluded.start_date,
                      end_date = excluded.end_date,
                      updated_at = excluded.updated_at
        "#,
    )
    .bind(department_id)
    .bind(batch_id)
    .bind(review_type)
    .bind(start_date)
    .bind(end_date)
    .bind(time::now())
    .execute(pool)
    .await?;

    window(pool, department_id, batch_id, review_type)
        .await?
        .ok_or_else(|| Error::Internal("Window vanished after upsert".to_string()))
}
