//! Panel marks
//!
//! Marks are append-only. Each submission by a panel role inserts a new
//! version group; readers take the latest version per role.

use spm_common::db::{FreezeState, PanelEvaluation, PanelRole};
use spm_common::review::{latest_versions, next_version, version_group_id};
use spm_common::time;
use spm_common::{Error, Result};
use sqlx::SqlitePool;

/// One rubric score for one student
#[derive(Debug, Clone)]
pub struct MarkEntry {
    pub student_id: i64,
    pub rubric_item_id: i64,
    pub score: Option<i64>,
    pub comment: String,
}

/// Store a new version of `role`'s marks, returning the version number
///
/// The freeze state is checked again inside the transaction so a freeze
/// landing between validation and insert still wins.
pub async fn record_version(
    pool: &SqlitePool,
    review_id: i64,
    role: PanelRole,
    entered_by: i64,
    entries: &[MarkEntry],
) -> Result<i64> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    let state = sqlx::query_scalar::<_, FreezeState>("SELECT hod_freeze_state FROM reviews WHERE id = ?")
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Review not found.".to_string()))?;
    match state {
        FreezeState::NotFrozen => {}
        FreezeState::FrozenSoft => {
            return Err(Error::Conflict("This review is currently frozen.".to_string()))
        }
        FreezeState::HardLocked => {
            return Err(Error::Conflict("This review is hard locked.".to_string()))
        }
    }

    let current = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(version_number) FROM panel_evaluations WHERE review_id = ? AND role = ?",
    )
    .bind(review_id)
    .bind(role)
    .fetch_one(&mut *tx)
    .await?;

    let version = next_version(current);
    let group = version_group_id(version);

    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO panel_evaluations (
                review_id, student_id, rubric_item_id, role, score, comment,
                version_group_id, version_number, entered_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(review_id)
        .bind(entry.student_id)
        .bind(entry.rubric_item_id)
        .bind(role)
        .bind(entry.score)
        .bind(&entry.comment)
        .bind(&group)
        .bind(version)
        .bind(entered_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(version)
}

/// Every stored version of every role's marks
pub async fn all_versions(pool: &SqlitePool, review_id: i64) -> Result<Vec<PanelEvaluation>> {
    let evaluations = sqlx::query_as::<_, PanelEvaluation>(
        r#"
        SELECT * FROM panel_evaluations
        WHERE review_id = ?
        ORDER BY role, version_number DESC, student_id, rubric_item_id
        "#,
    )
    .bind(review_id)
    .fetch_all(pool)
    .await?;
    Ok(evaluations)
}

/// Effective marks: the latest version for each role
pub async fn effective(pool: &SqlitePool, review_id: i64) -> Result<Vec<PanelEvaluation>> {
    Ok(latest_versions(all_versions(pool, review_id).await?))
}
