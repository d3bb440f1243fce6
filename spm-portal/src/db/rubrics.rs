//! Rubric templates and items

use spm_common::db::{ReviewType, RubricItem};
use spm_common::time;
use spm_common::Result;
use sqlx::SqlitePool;

/// Get or create a template by name and review type
pub async fn ensure_template(pool: &SqlitePool, name: &str, review_type: ReviewType) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO rubric_templates (name, review_type, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(review_type)
        .bind(time::now())
        .execute(pool)
        .await?;

    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM rubric_templates WHERE name = ? AND review_type = ?",
    )
    .bind(name)
    .bind(review_type)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Insert or update the item at `item_order` within a template
pub async fn upsert_item(
    pool: &SqlitePool,
    template_id: i64,
    item_order: i64,
    title: &str,
    max_score: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO rubric_items (template_id, item_order, title, max_score)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (template_id, item_order)
        DO UPDATE SET title = excluded.title, max_score = excluded.max_score
        "#,
    )
    .bind(template_id)
    .bind(item_order)
    .bind(title)
    .bind(max_score)
    .execute(pool)
    .await?;
    Ok(())
}

/// Every rubric item that applies to a review type, in template order
pub async fn items_for_type(pool: &SqlitePool, review_type: ReviewType) -> Result<Vec<RubricItem>> {
    let items = sqlx::query_as::<_, RubricItem>(
        r#"
        SELECT i.* FROM rubric_items i
        JOIN rubric_templates t ON t.id = i.template_id
        WHERE t.review_type = ?
        ORDER BY t.id, i.item_order
        "#,
    )
    .bind(review_type)
    .fetch_all(pool)
    .await?;
    Ok(items)
}
