//! Proposal review for coordinators and HODs
//!
//! Both roles see the same department-scoped list and may decide on a
//! proposal; the handlers differ only in the role guard.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spm_common::db::{ProjectProposal, ProposalDocument, ProposalStatus};
use tracing::info;

use super::teams::{load_team, team_view, TeamView};
use crate::db::proposals::{self, ProposalFilter, ProposalListing};
use crate::error::{ApiError, ApiResult};
use crate::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProposalQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProposalDetail {
    pub proposal: ProjectProposal,
    pub team: TeamView,
    pub documents: Vec<ProposalDocument>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub status: ProposalStatus,
    #[serde(default)]
    pub comment: String,
}

fn parse_status(raw: Option<&str>) -> ApiResult<Option<ProposalStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some("pending") => Ok(Some(ProposalStatus::Pending)),
        Some("approved") => Ok(Some(ProposalStatus::Approved)),
        Some("revision") => Ok(Some(ProposalStatus::Revision)),
        Some("rejected") => Ok(Some(ProposalStatus::Rejected)),
        Some(other) => Err(ApiError::BadRequest(format!(
            "Unknown proposal status: {}",
            other
        ))),
    }
}

async fn list(
    state: &AppState,
    department_id: i64,
    query: ProposalQuery,
) -> ApiResult<Json<Vec<ProposalListing>>> {
    let filter = ProposalFilter {
        status: parse_status(query.status.as_deref())?,
        query: query.q,
    };
    let listings = proposals::list_for_department(&state.db, department_id, &filter).await?;
    Ok(Json(listings))
}

async fn department_proposal(
    state: &AppState,
    department_id: i64,
    proposal_id: i64,
) -> ApiResult<(ProjectProposal, spm_common::db::Team)> {
    let proposal = proposals::get(&state.db, proposal_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proposal not found.".to_string()))?;
    let team = load_team(state, proposal.team_id).await?;
    if team.department_id != department_id {
        return Err(ApiError::Forbidden(
            "This proposal is not in your department.".to_string(),
        ));
    }
    Ok((proposal, team))
}

async fn detail(
    state: &AppState,
    department_id: i64,
    proposal_id: i64,
) -> ApiResult<Json<ProposalDetail>> {
    let (proposal, team) = department_proposal(state, department_id, proposal_id).await?;
    let documents = proposals::documents(&state.db, proposal.id).await?;
    Ok(Json(ProposalDetail {
        proposal,
        team: team_view(state, team).await?,
        documents,
    }))
}

async fn decide(
    state: &AppState,
    reviewer_id: i64,
    department_id: i64,
    proposal_id: i64,
    req: DecisionRequest,
) -> ApiResult<Json<Value>> {
    if req.status == ProposalStatus::Pending {
        return Err(ApiError::BadRequest(
            "A decision must approve, reject or request revision.".to_string(),
        ));
    }
    department_proposal(state, department_id, proposal_id).await?;

    let updated = proposals::decide(
        &state.db,
        proposal_id,
        req.status,
        req.comment.trim(),
        reviewer_id,
    )
    .await?;

    info!(
        "Faculty {} marked proposal {} as {}",
        reviewer_id,
        proposal_id,
        updated.status.as_str()
    );

    Ok(Json(json!({
        "message": format!("Proposal marked as {}.", updated.status.as_str()),
        "proposal": updated,
    })))
}

/// GET /api/coordinator/proposals
pub async fn coordinator_list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ProposalQuery>,
) -> ApiResult<Json<Vec<ProposalListing>>> {
    let (_, department_id) = current.require_coordinator()?;
    list(&state, department_id, query).await
}

/// GET /api/coordinator/proposals/:proposal_id
pub async fn coordinator_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(proposal_id): Path<i64>,
) -> ApiResult<Json<ProposalDetail>> {
    let (_, department_id) = current.require_coordinator()?;
    detail(&state, department_id, proposal_id).await
}

/// POST /api/coordinator/proposals/:proposal_id/decision
pub async fn coordinator_decide(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(proposal_id): Path<i64>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<Json<Value>> {
    let (faculty, department_id) = current.require_coordinator()?;
    decide(&state, faculty.id, department_id, proposal_id, req).await
}

/// GET /api/hod/proposals
pub async fn hod_list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ProposalQuery>,
) -> ApiResult<Json<Vec<ProposalListing>>> {
    let (_, department_id) = current.require_hod()?;
    list(&state, department_id, query).await
}

/// GET /api/hod/proposals/:proposal_id
pub async fn hod_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(proposal_id): Path<i64>,
) -> ApiResult<Json<ProposalDetail>> {
    let (_, department_id) = current.require_hod()?;
    detail(&state, department_id, proposal_id).await
}

/// POST /api/hod/proposals/:proposal_id/decision
pub async fn hod_decide(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(proposal_id): Path<i64>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<Json<Value>> {
    let (faculty, department_id) = current.require_hod()?;
    decide(&state, faculty.id, department_id, proposal_id, req).await
}
