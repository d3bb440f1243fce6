//! Team invitations
//!
//! Accepting an invitation joins the team and expires every other pending
//! invitation addressed to the same student.

use spm_common::db::{Invitation, InvitationStatus};
use spm_common::team::check_capacity;
use spm_common::time;
use spm_common::{Error, Result};
use sqlx::SqlitePool;

pub async fn create(
    pool: &SqlitePool,
    team_id: i64,
    from_student_id: i64,
    to_student_id: i64,
) -> Result<Invitation> {
    let id = sqlx::query(
        r#"
        INSERT INTO invitations (team_id, from_student_id, to_student_id, status, created_at)
        VALUES (?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(team_id)
    .bind(from_student_id)
    .bind(to_student_id)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    let invitation = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(invitation)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Invitation>> {
    let invitation = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(invitation)
}

/// Number of pending invitations addressed to a student
pub async fn pending_count(pool: &SqlitePool, to_student_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM invitations WHERE to_student_id = ? AND status = 'pending'",
    )
    .bind(to_student_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn pending_exists(pool: &SqlitePool, from_student_id: i64, to_student_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM invitations
        WHERE from_student_id = ? AND to_student_id = ? AND status = 'pending'
        "#,
    )
    .bind(from_student_id)
    .bind(to_student_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Invitations addressed to a student, newest first
pub async fn received(pool: &SqlitePool, student_id: i64) -> Result<Vec<Invitation>> {
    let invitations = sqlx::query_as::<_, Invitation>(
        "SELECT * FROM invitations WHERE to_student_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;
    Ok(invitations)
}

/// Invitations sent by a student, newest first
pub async fn sent(pool: &SqlitePool, student_id: i64) -> Result<Vec<Invitation>> {
    let invitations = sqlx::query_as::<_, Invitation>(
        "SELECT * FROM invitations WHERE from_student_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;
    Ok(invitations)
}

/// Accept a pending invitation
///
/// Re-checks the team size and the invitee's membership inside the
/// transaction so two concurrent accepts cannot overfill a team.
pub async fn accept(pool: &SqlitePool, invitation_id: i64) -> Result<Invitation> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    let invitation = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE id = ?")
        .bind(invitation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Invitation not found.".to_string()))?;

    if invitation.status != InvitationStatus::Pending {
        return Err(Error::Conflict(
            "This invitation is already processed.".to_string(),
        ));
    }

    let already_member = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM team_members WHERE student_id = ?",
    )
    .bind(invitation.to_student_id)
    .fetch_one(&mut *tx)
    .await?;
    if already_member > 0 {
        return Err(Error::Conflict(
            "You are already part of a team.".to_string(),
        ));
    }

    let size = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM team_members WHERE team_id = ?")
        .bind(invitation.team_id)
        .fetch_one(&mut *tx)
        .await?;
    check_capacity(size as usize, 1)?;

    sqlx::query("INSERT INTO team_members (team_id, student_id, joined_at) VALUES (?, ?, ?)")
        .bind(invitation.team_id)
        .bind(invitation.to_student_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE invitations SET status = 'accepted', responded_at = ? WHERE id = ?")
        .bind(now)
        .bind(invitation.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        UPDATE invitations SET status = 'expired', responded_at = ?
        WHERE to_student_id = ? AND status = 'pending' AND id != ?
        "#,
    )
    .bind(now)
    .bind(invitation.to_student_id)
    .bind(invitation.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE teams SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(invitation.team_id)
        .execute(&mut *tx)
        .await?;

    let accepted = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE id = ?")
        .bind(invitation.id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(accepted)
}

/// Reject a pending invitation
pub async fn reject(pool: &SqlitePool, invitation_id: i64) -> Result<Invitation> {
    let updated = sqlx::query(
        "UPDATE invitations SET status = 'rejected', responded_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(time::now())
    .bind(invitation_id)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::Conflict(
            "This invitation is already processed.".to_string(),
        ));
    }

    get(pool, invitation_id)
        .await?
        .ok_or_else(|| Error::NotFound("Invitation not found.".to_string()))
}
