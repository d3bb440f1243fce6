//! Login sessions

use chrono::Duration;
use spm_common::auth::new_session_token;
use spm_common::db::Session;
use spm_common::time;
use spm_common::Result;
use sqlx::SqlitePool;

/// Open a session for `user_id` valid for `ttl`
pub async fn create_session(pool: &SqlitePool, user_id: i64, ttl: Duration) -> Result<Session> {
    let now = time::now();
    let session = Session {
        token: new_session_token(),
        user_id,
        created_at: now,
        expires_at: now + ttl,
    };

    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(pool)
        .await?;

    Ok(session)
}

/// Look up an unexpired session
pub async fn find_active(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    Ok(session.filter(|s| s.expires_at > time::now()))
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove expired sessions, returning how many were deleted
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64> {
    let removed = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(time::now())
        .execute(pool)
        .await?
        .rows_affected();
    Ok(removed)
}
