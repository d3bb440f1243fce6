//! HOD dashboard, freeze actions and management windows

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spm_common::db::{
    Department, FacultyProfile, FreezeAction, FreezeState, ManagementWindow, ProposalStatus,
    Review, ReviewType,
};
use spm_common::review::validate_window_bounds;
use tracing::info;

use super::reviews::load_review;
use crate::db::teams::TeamListing;
use crate::db::{org, reviews, teams, users};
use crate::error::{ApiError, ApiResult};
use crate::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Default, Serialize)]
pub struct DepartmentCounts {
    pub teams: usize,
    pub reviews: usize,
    pub pending_proposals: usize,
    pub frozen_reviews: usize,
    pub hard_locked_reviews: usize,
}

/// Teams and reviews of one department
#[derive(Debug, Serialize)]
pub struct DepartmentOverview {
    pub department: Option<Department>,
    pub teams: Vec<TeamListing>,
    pub reviews: Vec<Review>,
    pub counts: DepartmentCounts,
}

pub(crate) async fn department_overview(
    state: &AppState,
    department_id: i64,
) -> ApiResult<DepartmentOverview> {
    let teams = teams::listings_for_department(&state.db, department_id).await?;
    let reviews = reviews::for_department(&state.db, department_id).await?;

    let counts = DepartmentCounts {
        teams: teams.len(),
        reviews: reviews.len(),
        pending_proposals: teams
            .iter()
            .filter(|t| t.proposal_status == Some(ProposalStatus::Pending))
            .count(),
        frozen_reviews: reviews
            .iter()
            .filter(|r| r.hod_freeze_state == FreezeState::FrozenSoft)
            .count(),
        hard_locked_reviews: reviews
            .iter()
            .filter(|r| r.hod_freeze_state == FreezeState::HardLocked)
            .count(),
    };

    Ok(DepartmentOverview {
        department: org::get_department(&state.db, department_id).await?,
        teams,
        reviews,
        counts,
    })
}

#[derive(Debug, Serialize)]
pub struct HodDashboard {
    #[serde(flatten)]
    pub overview: DepartmentOverview,
    pub faculty: Vec<FacultyProfile>,
    pub windows: Vec<ManagementWindow>,
}

/// GET /api/hod/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<HodDashboard>> {
    let (_, department_id) = current.require_hod()?;
    Ok(Json(HodDashboard {
        overview: department_overview(&state, department_id).await?,
        faculty: users::faculty_in_department(&state.db, department_id).await?,
        windows: reviews::windows_for_department(&state.db, department_id).await?,
    }))
}

/// GET /api/hod/faculty
pub async fn faculty_list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<FacultyProfile>>> {
    let (_, department_id) = current.require_hod()?;
    Ok(Json(
        users::faculty_in_department(&state.db, department_id).await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct FreezeRequest {
    #[serde(default)]
    pub reason: String,
}

async fn apply_action(
    state: &AppState,
    current: &CurrentUser,
    review_id: i64,
    action: FreezeAction,
    req: Option<Json<FreezeRequest>>,
) -> ApiResult<Json<Value>> {
    let (hod, department_id) = current.require_hod()?;
    let (_, team) = load_review(state, review_id).await?;
    if team.department_id != department_id {
        return Err(ApiError::Forbidden(
            "This review is not in your department.".to_string(),
        ));
    }

    let reason = req.map(|Json(r)| r.reason).unwrap_or_default();
    let review =
        reviews::apply_freeze_action(&state.db, review_id, action, hod.id, reason.trim()).await?;

    info!(
        "HOD {} applied {} to review {} (now {})",
        hod.id,
        action.as_str(),
        review_id,
        review.hod_freeze_state.as_str()
    );

    let message = match action {
        FreezeAction::Freeze => "Review frozen.",
        FreezeAction::Unfreeze => "Review unfrozen.",
        FreezeAction::HardLock => "Review hard locked.",
    };
    Ok(Json(json!({ "message": message, "review": review })))
}

/// POST /api/hod/reviews/:review_id/freeze
pub async fn freeze_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
    req: Option<Json<FreezeRequest>>,
) -> ApiResult<Json<Value>> {
    apply_action(&state, &current, review_id, FreezeAction::Freeze, req).await
}

/// POST /api/hod/reviews/:review_id/unfreeze
pub async fn unfreeze_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
    req: Option<Json<FreezeRequest>>,
) -> ApiResult<Json<Value>> {
    apply_action(&state, &current, review_id, FreezeAction::Unfreeze, req).await
}

/// POST /api/hod/reviews/:review_id/hard-lock
pub async fn hard_lock_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
    req: Option<Json<FreezeRequest>>,
) -> ApiResult<Json<Value>> {
    apply_action(&state, &current, review_id, FreezeAction::HardLock, req).await
}

#[derive(Debug, Deserialize)]
pub struct WindowRequest {
    pub batch_id: i64,
    pub review_type: ReviewType,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// GET /api/hod/windows
pub async fn list_windows(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<ManagementWindow>>> {
    let (_, department_id) = current.require_hod()?;
    Ok(Json(
        reviews::windows_for_department(&state.db, department_id).await?,
    ))
}

/// PUT /api/hod/windows
pub async fn set_window(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<WindowRequest>,
) -> ApiResult<Json<Value>> {
    let (hod, department_id) = current.require_hod()?;
    validate_window_bounds(req.start_date, req.end_date)?;

    if org::get_batch(&state.db, req.batch_id).await?.is_none() {
        return Err(ApiError::NotFound("Batch not found.".to_string()));
    }

    let window = reviews::upsert_window(
        &state.db,
        department_id,
        req.batch_id,
        req.review_type,
        req.start_date,
        req.end_date,
    )
    .await?;

    info!(
        "HOD {} set {} window for batch {}: {:?} to {:?}",
        hod.id,
        req.review_type.as_str(),
        req.batch_id,
        req.start_date,
        req.end_date
    );

    Ok(Json(json!({ "message": "Window saved.", "window": window })))
}
