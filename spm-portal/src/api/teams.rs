//! Team detail, document download and the access rules shared by the
//! role dashboards

use axum::{
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use spm_common::db::{
    FacultyProfile, ProjectProposal, ProposalDocument, Review, StudentProfile, Team,
};
use spm_common::review::panel_roles;

use crate::db::{proposals, reviews, teams, users};
use crate::error::{ApiError, ApiResult};
use crate::media::content_type_for;
use crate::session::CurrentUser;
use crate::AppState;

/// A team with its members and mentor
#[derive(Debug, Serialize)]
pub struct TeamView {
    pub team: Team,
    pub members: Vec<StudentProfile>,
    pub mentor: Option<FacultyProfile>,
}

#[derive(Debug, Serialize)]
pub struct TeamDetailResponse {
    #[serde(flatten)]
    pub view: TeamView,
    pub proposal: Option<ProjectProposal>,
    pub documents: Vec<ProposalDocument>,
    pub reviews: Vec<Review>,
}

pub(crate) async fn load_team(state: &AppState, team_id: i64) -> ApiResult<Team> {
    teams::get_team(&state.db, team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found.".to_string()))
}

pub(crate) async fn team_view(state: &AppState, team: Team) -> ApiResult<TeamView> {
    let members = teams::members(&state.db, team.id).await?;
    let mentor = match team.mentor_id {
        Some(id) => users::faculty_by_id(&state.db, id).await?,
        None => None,
    };
    Ok(TeamView {
        team,
        members,
        mentor,
    })
}

/// Who may look at a team
///
/// Members, the mentor, the section advisor, the department's HOD and
/// coordinators, evaluators on one of its reviews, and the principal.
pub(crate) async fn can_view_team(
    state: &AppState,
    current: &CurrentUser,
    team: &Team,
) -> ApiResult<bool> {
    if current.is_principal() {
        return Ok(true);
    }
    if let Some(student) = &current.student {
        return Ok(teams::is_member(&state.db, team.id, student.id).await?);
    }
    let Some(faculty) = &current.faculty else {
        return Ok(false);
    };

    if team.mentor_id == Some(faculty.id) {
        return Ok(true);
    }
    if (faculty.is_hod || faculty.is_coordinator) && faculty.in_department(team.department_id) {
        return Ok(true);
    }
    if faculty.is_advisor && faculty.advisor_section_id == Some(team.class_section_id) {
        return Ok(true);
    }

    let team_reviews = reviews::for_team(&state.db, team.id).await?;
    Ok(team_reviews
        .iter()
        .any(|review| !panel_roles(faculty, team, review).is_empty()))
}

pub(crate) async fn ensure_can_view_team(
    state: &AppState,
    current: &CurrentUser,
    team: &Team,
) -> ApiResult<()> {
    if can_view_team(state, current, team).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not have access to this team.".to_string(),
        ))
    }
}

/// Serve a stored file as an attachment
pub(crate) async fn file_response(
    state: &AppState,
    stored_path: &str,
    file_name: &str,
) -> ApiResult<Response> {
    let data = state.media.read(stored_path).await?;
    let headers = [
        (CONTENT_TYPE, content_type_for(file_name).to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    Ok((headers, data).into_response())
}

/// GET /api/teams/:team_id
pub async fn team_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<i64>,
) -> ApiResult<Json<TeamDetailResponse>> {
    let team = load_team(&state, team_id).await?;
    ensure_can_view_team(&state, &current, &team).await?;

    let proposal = proposals::for_team(&state.db, team.id).await?;
    let documents = match &proposal {
        Some(p) => proposals::documents(&state.db, p.id).await?,
        None => Vec::new(),
    };
    let team_reviews = reviews::for_team(&state.db, team.id).await?;

    Ok(Json(TeamDetailResponse {
        view: team_view(&state, team).await?,
        proposal,
        documents,
        reviews: team_reviews,
    }))
}

/// GET /api/documents/:document_id
pub async fn download_document(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(document_id): Path<i64>,
) -> ApiResult<Response> {
    let document = proposals::get_document(&state.db, document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found.".to_string()))?;
    let proposal = proposals::get(&state.db, document.proposal_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found.".to_string()))?;
    let team = load_team(&state, proposal.team_id).await?;
    ensure_can_view_team(&state, &current, &team).await?;

    file_response(&state, &document.stored_path, &document.file_name).await
}
