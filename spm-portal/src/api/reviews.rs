//! Review detail, the marks sheet, marks submission and review files

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spm_common::db::{
    DateChangeHistory, FreezeHistory, FreezeState, PanelEvaluation, PanelRole, Review,
    ReviewFile, RubricItem, StudentProfile, Team,
};
use spm_common::review::{
    check_editable, is_editable, panel_roles, summarize, validate_score, version_group_id,
    EditWindow, StudentSummary,
};
use spm_common::time;
use tracing::info;

use super::teams::{can_view_team, file_response, load_team, team_view, TeamView};
use crate::db::evaluations::{self, MarkEntry};
use crate::db::proposals::NewDocument;
use crate::db::{reviews, rubrics, teams};
use crate::error::{ApiError, ApiResult};
use crate::media::{read_upload, MediaCategory};
use crate::session::CurrentUser;
use crate::AppState;

pub(crate) async fn load_review(state: &AppState, review_id: i64) -> ApiResult<(Review, Team)> {
    let review = reviews::get(&state.db, review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found.".to_string()))?;
    let team = load_team(state, review.team_id).await?;
    Ok((review, team))
}

/// Panel roles the caller holds on this review (empty for non-faculty)
fn caller_roles(current: &CurrentUser, team: &Team, review: &Review) -> Vec<PanelRole> {
    current
        .faculty
        .as_ref()
        .map(|f| panel_roles(f, team, review))
        .unwrap_or_default()
}

async fn ensure_can_view_review(
    state: &AppState,
    current: &CurrentUser,
    team: &Team,
    review: &Review,
) -> ApiResult<()> {
    if !caller_roles(current, team, review).is_empty() || can_view_team(state, current, team).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not have access to this review.".to_string(),
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewDetail {
    pub review: Review,
    pub team: TeamView,
    pub rubric: Vec<RubricItem>,
    pub marks: Vec<PanelEvaluation>,
    pub summary: Vec<StudentSummary>,
    pub edit_window: Option<EditWindow>,
    pub is_editable: bool,
    pub freeze_history: Vec<FreezeHistory>,
    pub date_changes: Vec<DateChangeHistory>,
    pub files: Vec<ReviewFile>,
}

/// GET /api/reviews/:review_id
pub async fn review_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
) -> ApiResult<Json<ReviewDetail>> {
    let (review, team) = load_review(&state, review_id).await?;
    ensure_can_view_review(&state, &current, &team, &review).await?;

    let marks = evaluations::effective(&state.db, review.id).await?;
    let summary = summarize(&marks);

    Ok(Json(ReviewDetail {
        rubric: rubrics::items_for_type(&state.db, review.review_type).await?,
        summary,
        marks,
        edit_window: EditWindow::for_schedule(review.date_time, review.grace_days),
        is_editable: is_editable(&review, time::today()),
        freeze_history: reviews::freeze_history(&state.db, review.id).await?,
        date_changes: reviews::date_changes(&state.db, review.id).await?,
        files: reviews::files(&state.db, review.id).await?,
        team: team_view(&state, team).await?,
        review,
    }))
}

#[derive(Debug, Serialize)]
pub struct MarksSheet {
    pub review: Review,
    pub team: Team,
    pub students: Vec<StudentProfile>,
    pub rubric: Vec<RubricItem>,
    pub roles: Vec<PanelRole>,
    pub is_editable: bool,
    pub warning: Option<String>,
    pub marks: Vec<PanelEvaluation>,
}

/// GET /api/reviews/:review_id/sheet
///
/// The marks entry sheet for panel members. Frozen or out-of-window reviews
/// are still shown read-only with a warning; hard-locked ones are refused.
pub async fn marks_sheet(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
) -> ApiResult<Json<MarksSheet>> {
    current.require_faculty()?;
    let (review, team) = load_review(&state, review_id).await?;

    let roles = caller_roles(&current, &team, &review);
    if roles.is_empty() {
        return Err(ApiError::Forbidden(
            "You are not on the panel for this review.".to_string(),
        ));
    }
    if review.hod_freeze_state == FreezeState::HardLocked {
        return Err(ApiError::Conflict("This review is hard locked.".to_string()));
    }

    let editable = check_editable(&review, time::today());
    let marks: Vec<PanelEvaluation> = evaluations::effective(&state.db, review.id)
        .await?
        .into_iter()
        .filter(|e| roles.contains(&e.role))
        .collect();

    Ok(Json(MarksSheet {
        students: teams::members(&state.db, team.id).await?,
        rubric: rubrics::items_for_type(&state.db, review.review_type).await?,
        is_editable: editable.is_ok(),
        warning: editable.err().map(|block| block.message()),
        roles,
        marks,
        review,
        team,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MarkInput {
    pub student_id: i64,
    pub rubric_item_id: i64,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct MarksRequest {
    pub role: PanelRole,
    pub marks: Vec<MarkInput>,
}

/// POST /api/reviews/:review_id/marks
pub async fn submit_marks(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
    Json(req): Json<MarksRequest>,
) -> ApiResult<Json<Value>> {
    let faculty = current.require_faculty()?;
    let (review, team) = load_review(&state, review_id).await?;

    if !panel_roles(faculty, &team, &review).contains(&req.role) {
        return Err(ApiError::Forbidden(format!(
            "You are not marked as {} on this review.",
            req.role.as_str()
        )));
    }
    check_editable(&review, time::today()).map_err(spm_common::Error::from)?;

    if req.marks.is_empty() {
        return Err(ApiError::BadRequest("No marks were submitted.".to_string()));
    }

    let member_ids: HashSet<i64> = teams::members(&state.db, team.id)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    let max_scores: HashMap<i64, i64> = rubrics::items_for_type(&state.db, review.review_type)
        .await?
        .into_iter()
        .map(|item| (item.id, item.max_score))
        .collect();

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(req.marks.len());
    for mark in req.marks {
        if !member_ids.contains(&mark.student_id) {
            return Err(ApiError::BadRequest(format!(
                "Student {} is not a member of this team.",
                mark.student_id
            )));
        }
        let max_score = *max_scores.get(&mark.rubric_item_id).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Rubric item {} does not apply to this review.",
                mark.rubric_item_id
            ))
        })?;
        if !seen.insert((mark.student_id, mark.rubric_item_id)) {
            return Err(ApiError::BadRequest(format!(
                "Student {} has more than one mark for rubric item {}.",
                mark.student_id, mark.rubric_item_id
            )));
        }
        validate_score(mark.score, max_score)?;

        entries.push(MarkEntry {
            student_id: mark.student_id,
            rubric_item_id: mark.rubric_item_id,
            score: mark.score,
            comment: mark.comment.trim().to_string(),
        });
    }

    let version =
        evaluations::record_version(&state.db, review.id, req.role, faculty.id, &entries).await?;

    info!(
        "Faculty {} saved {} marks v{} for review {} ({} entries)",
        faculty.id,
        req.role.as_str(),
        version,
        review.id,
        entries.len()
    );

    Ok(Json(json!({
        "message": "Marks saved.",
        "version_number": version,
        "version_group_id": version_group_id(version),
    })))
}

/// GET /api/reviews/:review_id/files
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
) -> ApiResult<Json<Vec<ReviewFile>>> {
    let (review, team) = load_review(&state, review_id).await?;
    ensure_can_view_review(&state, &current, &team, &review).await?;
    Ok(Json(reviews::files(&state.db, review.id).await?))
}

/// POST /api/reviews/:review_id/files
///
/// Team members and panel members may upload.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (review, team) = load_review(&state, review_id).await?;

    let is_member = match &current.student {
        Some(student) => teams::is_member(&state.db, team.id, student.id).await?,
        None => false,
    };
    if !is_member && caller_roles(&current, &team, &review).is_empty() {
        return Err(ApiError::Forbidden(
            "Only team and panel members can upload review files.".to_string(),
        ));
    }
    if review.hod_freeze_state == FreezeState::HardLocked {
        return Err(ApiError::Conflict("This review is hard locked.".to_string()));
    }

    let upload = read_upload(&mut multipart).await?;
    let stored = state.media.store(MediaCategory::Reviews, &upload).await?;

    let inserted = reviews::add_file(
        &state.db,
        review.id,
        &NewDocument {
            file_name: &stored.file_name,
            stored_path: &stored.stored_path,
            size_bytes: stored.size_bytes,
            uploaded_by: current.user.id,
        },
    )
    .await;
    let file = match inserted {
        Ok(row) => row,
        Err(e) => {
            state.media.discard(&stored).await;
            return Err(e.into());
        }
    };

    info!(
        "Uploaded review file v{} for review {} ({} bytes)",
        file.version, review.id, file.size_bytes
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "File uploaded.", "file": file })),
    ))
}

/// GET /api/reviews/:review_id/files/:file_id
pub async fn download_file(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((review_id, file_id)): Path<(i64, i64)>,
) -> ApiResult<Response> {
    let (review, team) = load_review(&state, review_id).await?;
    ensure_can_view_review(&state, &current, &team, &review).await?;

    let file = reviews::get_file(&state.db, review.id, file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found.".to_string()))?;

    file_response(&state, &file.stored_path, &file.file_name).await
}
