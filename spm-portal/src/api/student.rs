//! Student dashboard, team formation, invitations and the proposal

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spm_common::db::{Invitation, ProjectProposal, ProposalDocument, Review, StudentProfile, Team};
use spm_common::team::{
    check_capacity, check_initial_member, check_invitable, check_ready_for_proposal,
    validate_team_name, InviteTarget,
};
use tracing::info;

use super::teams::{team_view, TeamView};
use crate::db::{invitations, proposals, reviews, teams, users};
use crate::db::proposals::{NewDocument, ProposalDraft};
use crate::db::teams::NewTeam;
use crate::error::{ApiError, ApiResult};
use crate::media::{read_upload, MediaCategory};
use crate::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub profile: StudentProfile,
    pub team: Option<TeamView>,
    pub is_leader: bool,
    pub proposal: Option<ProjectProposal>,
    pub documents: Vec<ProposalDocument>,
    pub reviews: Vec<Review>,
    pub received_invitations: Vec<Invitation>,
    pub sent_invitations: Vec<Invitation>,
}

/// GET /api/student/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<StudentDashboard>> {
    let student = current.require_student()?;

    let team = teams::team_for_student(&state.db, student.id).await?;
    let is_leader = team.as_ref().is_some_and(|t| t.leader_id == student.id);

    let (proposal, documents, team_reviews) = match &team {
        Some(t) => {
            let proposal = proposals::for_team(&state.db, t.id).await?;
            let documents = match &proposal {
                Some(p) => proposals::documents(&state.db, p.id).await?,
                None => Vec::new(),
            };
            (proposal, documents, reviews::for_team(&state.db, t.id).await?)
        }
        None => (None, Vec::new(), Vec::new()),
    };

    let team = match team {
        Some(t) => Some(team_view(&state, t).await?),
        None => None,
    };

    Ok(Json(StudentDashboard {
        profile: student.clone(),
        team,
        is_leader,
        proposal,
        documents,
        reviews: team_reviews,
        received_invitations: invitations::received(&state.db, student.id).await?,
        sent_invitations: invitations::sent(&state.db, student.id).await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub member_rolls: Vec<String>,
}

/// POST /api/student/team
pub async fn create_team(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let student = current.require_student()?;

    if teams::is_in_team(&state.db, student.id).await? {
        return Err(ApiError::Conflict("You are already part of a team.".to_string()));
    }

    let name = validate_team_name(&req.name)?;
    let (Some(department_id), Some(batch_id), Some(class_section_id)) =
        (student.department_id, student.batch_id, student.class_section_id)
    else {
        return Err(ApiError::BadRequest(
            "Your profile has no department, batch or section assigned.".to_string(),
        ));
    };

    let mut member_ids: Vec<i64> = Vec::new();
    for roll in req.member_rolls.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        let candidate = users::student_by_roll(&state.db, roll)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No student with roll number {}.", roll)))?;
        if member_ids.contains(&candidate.id) {
            continue;
        }
        let in_team = teams::is_in_team(&state.db, candidate.id).await?;
        check_initial_member(student, &candidate, in_team)?;
        member_ids.push(candidate.id);
    }
    check_capacity(1, member_ids.len())?;

    let team = teams::create_team(
        &state.db,
        &NewTeam {
            name,
            department_id,
            batch_id,
            class_section_id,
            leader_id: student.id,
            member_ids,
        },
    )
    .await?;

    info!(
        "Student {} created team {} ({})",
        student.roll_number, team.id, team.name
    );

    let view = team_view(&state, team).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Team created.", "team": view })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub roll_number: String,
}

/// The team the student leads, or a 4xx explaining why there is none
async fn led_team(state: &AppState, student: &StudentProfile, action: &str) -> ApiResult<Team> {
    let team = teams::team_for_student(&state.db, student.id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("You are not part of a team.".to_string()))?;
    if team.leader_id != student.id {
        return Err(ApiError::Forbidden(format!(
            "Only the team leader can {}.",
            action
        )));
    }
    Ok(team)
}

/// POST /api/student/invitations
pub async fn send_invite(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let student = current.require_student()?;
    let team = led_team(&state, student, "send invitations").await?;

    let size = teams::member_count(&state.db, team.id).await?;
    check_capacity(size, 1)?;

    let roll = req.roll_number.trim();
    if roll.is_empty() {
        return Err(ApiError::BadRequest("Roll number is required.".to_string()));
    }
    let profile = users::student_by_roll(&state.db, roll).await?.ok_or_else(|| {
        ApiError::NotFound("Student with that roll was not found in your batch.".to_string())
    })?;

    let target = InviteTarget {
        profile: &profile,
        in_team: teams::is_in_team(&state.db, profile.id).await?,
        pending_invites: invitations::pending_count(&state.db, profile.id).await?,
        already_invited_by_sender: invitations::pending_exists(&state.db, student.id, profile.id)
            .await?,
    };
    check_invitable(student, &target)?;

    let invitation = invitations::create(&state.db, team.id, student.id, profile.id).await?;
    info!(
        "Student {} invited {} to team {}",
        student.roll_number, profile.roll_number, team.id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Invitation sent.", "invitation": invitation })),
    ))
}

/// POST /api/student/invitations/:invite_id/:action
pub async fn respond_invite(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((invite_id, action)): Path<(i64, String)>,
) -> ApiResult<Json<Value>> {
    let student = current.require_student()?;

    let invitation = invitations::get(&state.db, invite_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invitation not found.".to_string()))?;
    if invitation.to_student_id != student.id {
        return Err(ApiError::Forbidden(
            "This invitation is not addressed to you.".to_string(),
        ));
    }

    let (updated, message) = match action.as_str() {
        "accept" => (
            invitations::accept(&state.db, invite_id).await?,
            "Invitation accepted.",
        ),
        "reject" => (
            invitations::reject(&state.db, invite_id).await?,
            "Invitation rejected.",
        ),
        other => {
            return Err(ApiError::BadRequest(format!(
                "Unknown invitation action: {}",
                other
            )))
        }
    };

    info!(
        "Student {} {} invitation {}",
        student.roll_number, action, invite_id
    );

    Ok(Json(json!({ "message": message, "invitation": updated })))
}

/// GET /api/student/proposal
pub async fn get_proposal(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let student = current.require_student()?;
    let team = teams::team_for_student(&state.db, student.id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("You are not part of a team.".to_string()))?;

    let proposal = proposals::for_team(&state.db, team.id).await?;
    let documents = match &proposal {
        Some(p) => proposals::documents(&state.db, p.id).await?,
        None => Vec::new(),
    };

    Ok(Json(json!({ "proposal": proposal, "documents": documents })))
}

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    pub title: String,
    pub abstract_text: String,
    #[serde(default)]
    pub preferred_mentor_id: Option<i64>,
}

/// POST /api/student/proposal
pub async fn submit_proposal(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ProposalRequest>,
) -> ApiResult<Json<Value>> {
    let student = current.require_student()?;
    let team = led_team(&state, student, "submit the proposal").await?;

    check_ready_for_proposal(teams::member_count(&state.db, team.id).await?)?;

    let title = req.title.trim();
    let abstract_text = req.abstract_text.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required.".to_string()));
    }
    if abstract_text.is_empty() {
        return Err(ApiError::BadRequest("Abstract is required.".to_string()));
    }

    if let Some(mentor_id) = req.preferred_mentor_id {
        let mentor = users::faculty_by_id(&state.db, mentor_id).await?;
        let eligible = mentor
            .as_ref()
            .is_some_and(|m| m.is_supervisor && m.in_department(team.department_id));
        if !eligible {
            return Err(ApiError::BadRequest(
                "Preferred mentor must be a supervisor in your department.".to_string(),
            ));
        }
    }

    let proposal = proposals::submit(
        &state.db,
        team.id,
        &ProposalDraft {
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            preferred_mentor_id: req.preferred_mentor_id,
        },
    )
    .await?;

    info!("Team {} submitted proposal {}", team.id, proposal.id);

    Ok(Json(json!({ "message": "Proposal submitted.", "proposal": proposal })))
}

/// POST /api/student/proposal/documents
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let student = current.require_student()?;
    let team = teams::team_for_student(&state.db, student.id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("You are not part of a team.".to_string()))?;
    let proposal = proposals::for_team(&state.db, team.id)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest("Submit the proposal before uploading documents.".to_string())
        })?;

    let upload = read_upload(&mut multipart).await?;
    let stored = state.media.store(MediaCategory::Proposals, &upload).await?;

    let inserted = proposals::add_document(
        &state.db,
        proposal.id,
        &NewDocument {
            file_name: &stored.file_name,
            stored_path: &stored.stored_path,
            size_bytes: stored.size_bytes,
            uploaded_by: current.user.id,
        },
    )
    .await;
    let document = match inserted {
        Ok(row) => row,
        Err(e) => {
            state.media.discard(&stored).await;
            return Err(e.into());
        }
    };

    info!(
        "Uploaded document v{} for proposal {} ({} bytes)",
        document.version, proposal.id, document.size_bytes
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Document uploaded.", "document": document })),
    ))
}
