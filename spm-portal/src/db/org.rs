//! Departments, batches and class sections
//!
//! The `ensure_*` helpers are get-or-create so roster imports can be re-run.

use spm_common::db::{Batch, Department};
use spm_common::time;
use spm_common::Result;
use sqlx::SqlitePool;

pub async fn ensure_department(pool: &SqlitePool, name: &str) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO departments (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(time::now())
        .execute(pool)
        .await?;

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM departments WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

pub async fn ensure_batch(pool: &SqlitePool, name: &str, year: i64) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO batches (name, year, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(year)
        .bind(time::now())
        .execute(pool)
        .await?;

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM batches WHERE name = ? AND year = ?")
        .bind(name)
        .bind(year)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

pub async fn ensure_section(
    pool: &SqlitePool,
    name: &str,
    department_id: i64,
    batch_id: i64,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO class_sections (name, department_id, batch_id, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(department_id)
    .bind(batch_id)
    .bind(time::now())
    .execute(pool)
    .await?;

    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM class_sections WHERE name = ? AND department_id = ? AND batch_id = ?",
    )
    .bind(name)
    .bind(department_id)
    .bind(batch_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn get_department(pool: &SqlitePool, id: i64) -> Result<Option<Department>> {
    let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(department)
}

pub async fn get_batch(pool: &SqlitePool, id: i64) -> Result<Option<Batch>> {
    let batch = sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(batch)
}

