//! Project proposals and their uploaded documents

use serde::Serialize;
use spm_common::db::{ProjectProposal, ProposalDocument, ProposalStatus};
use spm_common::review::next_version;
use spm_common::time;
use spm_common::{Error, Result};
use sqlx::{FromRow, SqlitePool};

/// Proposal row joined with its team's name for listings
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProposalListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub proposal: ProjectProposal,
    pub team_name: String,
}

/// Filters for the staff proposal list
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
    pub query: Option<String>,
}

/// Proposal text as submitted by the team leader
#[derive(Debug, Clone)]
pub struct ProposalDraft {
    pub title: String,
    pub abstract_text: String,
    pub preferred_mentor_id: Option<i64>,
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<ProjectProposal>> {
    let proposal = sqlx::query_as::<_, ProjectProposal>("SELECT * FROM project_proposals WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(proposal)
}

pub async fn for_team(pool: &SqlitePool, team_id: i64) -> Result<Option<ProjectProposal>> {
    let proposal =
        sqlx::query_as::<_, ProjectProposal>("SELECT * FROM project_proposals WHERE team_id = ?")
            .bind(team_id)
            .fetch_optional(pool)
            .await?;
    Ok(proposal)
}

/// Create the team's proposal, or overwrite it while it is still open
///
/// A resubmission puts the proposal back to `pending` and clears the last
/// reviewer's comment.
pub async fn submit(pool: &SqlitePool, team_id: i64, draft: &ProposalDraft) -> Result<ProjectProposal> {
    let now = time::now();

    match for_team(pool, team_id).await? {
        Some(existing) => {
            if !existing.status.accepts_resubmission() {
                return Err(Error::Conflict(format!(
                    "This proposal is {} and can no longer be changed.",
                    existing.status.as_str()
                )));
            }
            sqlx::query(
                r#"
                UPDATE project_proposals
                SET title = ?, abstract_text = ?, preferred_mentor_id = ?,
                    status = 'pending', reviewer_comment = '', updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&draft.title)
            .bind(&draft.abstract_text)
            .bind(draft.preferred_mentor_id)
            .bind(now)
            .bind(existing.id)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO project_proposals
                    (team_id, title, abstract_text, preferred_mentor_id, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, 'pending', ?, ?)
                "#,
            )
            .bind(team_id)
            .bind(&draft.title)
            .bind(&draft.abstract_text)
            .bind(draft.preferred_mentor_id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
        }
    }

    for_team(pool, team_id)
        .await?
        .ok_or_else(|| Error::Internal("Proposal vanished after submit".to_string()))
}

/// Match `%` and `_` literally inside a LIKE pattern
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Department proposals, pending first then most recently updated
pub async fn list_for_department(
    pool: &SqlitePool,
    department_id: i64,
    filter: &ProposalFilter,
) -> Result<Vec<ProposalListing>> {
    let status = filter.status.map(|s| s.as_str());
    let pattern = filter
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));

    let listings = sqlx::query_as::<_, ProposalListing>(
        r#"
        SELECT p.*, t.name AS team_name
        FROM project_proposals p
        JOIN teams t ON t.id = p.team_id
        WHERE t.department_id = ?
          AND (? IS NULL OR p.status = ?)
          AND (? IS NULL OR LOWER(p.title) LIKE ? ESCAPE '\' OR LOWER(t.name) LIKE ? ESCAPE '\')
        ORDER BY CASE WHEN p.status = 'pending' THEN 0 ELSE 1 END, p.updated_at DESC
        "#,
    )
    .bind(department_id)
    .bind(status)
    .bind(status)
    .bind(pattern.as_deref())
    .bind(pattern.as_deref())
    .bind(pattern.as_deref())
    .fetch_all(pool)
    .await?;

    Ok(listings)
}

/// Record a staff decision on a proposal
///
/// Approval also assigns the preferred mentor when the team has none yet.
pub async fn decide(
    pool: &SqlitePool,
    proposal_id: i64,
    status: ProposalStatus,
    comment: &str,
    reviewer_id: i64,
) -> Result<ProjectProposal> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    let proposal = sqlx::query_as::<_, ProjectProposal>("SELECT * FROM project_proposals WHERE id = ?")
        .bind(proposal_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Proposal not found.".to_string()))?;

    sqlx::query(
        r#"
        UPDATE project_proposals
        SET status = ?, reviewer_comment = ?, reviewed_by = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(comment)
    .bind(reviewer_id)
    .bind(now)
    .bind(proposal_id)
    .execute(&mut *tx)
    .await?;

    if status == ProposalStatus::Approved {
        if let Some(mentor_id) = proposal.preferred_mentor_id {
            sqlx::query(
                "UPDATE teams SET mentor_id = ?, updated_at = ? WHERE id = ? AND mentor_id IS NULL",
            )
            .bind(mentor_id)
            .bind(now)
            .bind(proposal.team_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    let updated = sqlx::query_as::<_, ProjectProposal>("SELECT * FROM project_proposals WHERE id = ?")
        .bind(proposal_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(updated)
}

// ========================================
// Documents
// ========================================

/// Stored file details for a new document version
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub file_name: &'a str,
    pub stored_path: &'a str,
    pub size_bytes: i64,
    pub uploaded_by: i64,
}

/// Add the next version of a proposal document
pub async fn add_document(
    pool: &SqlitePool,
    proposal_id: i64,
    document: &NewDocument<'_>,
) -> Result<ProposalDocument> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(version) FROM proposal_documents WHERE proposal_id = ?",
    )
    .bind(proposal_id)
    .fetch_one(&mut *tx)
    .await?;

    let id = sqlx::query(
        r#"
        INSERT INTO proposal_documents (proposal_id, file_name, stored_path, size_bytes, version, uploaded_by, uploaded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(proposal_id)
    .bind(document.file_name)
    .bind(document.stored_path)
    .bind(document.size_bytes)
    .bind(next_version(current))
    .bind(document.uploaded_by)
    .bind(time::now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let stored = sqlx::query_as::<_, ProposalDocument>("SELECT * FROM proposal_documents WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(stored)
}

/// Documents for a proposal, newest version first
pub async fn documents(pool: &SqlitePool, proposal_id: i64) -> Result<Vec<ProposalDocument>> {
    let documents = sqlx::query_as::<_, ProposalDocument>(
        "SELECT * FROM proposal_documents WHERE proposal_id = ? ORDER BY version DESC",
    )
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;
    Ok(documents)
}

pub async fn get_document(pool: &SqlitePool, id: i64) -> Result<Option<ProposalDocument>> {
    let document = sqlx::query_as::<_, ProposalDocument>("SELECT * FROM proposal_documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(document)
}
