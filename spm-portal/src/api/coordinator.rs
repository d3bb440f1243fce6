//! Coordinator dashboard, review scheduling and mentor assignment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spm_common::db::{FreezeState, Review, ReviewType, Team};
use spm_common::review::{check_within_window, validate_grace_days, validate_panel};
use tracing::info;

use super::hod::{department_overview, DepartmentOverview};
use super::teams::load_team;
use crate::db::reviews::{self, ReviewSchedule};
use crate::db::{teams, users};
use crate::error::{ApiError, ApiResult};
use crate::session::CurrentUser;
use crate::AppState;

/// GET /api/coordinator/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<DepartmentOverview>> {
    let (_, department_id) = current.require_coordinator()?;
    Ok(Json(department_overview(&state, department_id).await?))
}

async fn department_team(state: &AppState, department_id: i64, team_id: i64) -> ApiResult<Team> {
    let team = load_team(state, team_id).await?;
    if team.department_id != department_id {
        return Err(ApiError::Forbidden(
            "This team is not in your department.".to_string(),
        ));
    }
    Ok(team)
}

#[derive(Debug, Serialize)]
pub struct TeamReviews {
    pub team: Team,
    pub reviews: Vec<Review>,
}

/// GET /api/coordinator/teams/:team_id/reviews
pub async fn team_reviews(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<i64>,
) -> ApiResult<Json<TeamReviews>> {
    let (_, department_id) = current.require_coordinator()?;
    let team = department_team(&state, department_id, team_id).await?;
    let reviews = reviews::for_team(&state.db, team.id).await?;
    Ok(Json(TeamReviews { team, reviews }))
}

/// Schedule fields accepted on create and edit
#[derive(Debug, Deserialize)]
pub struct ScheduleFields {
    #[serde(default)]
    pub date_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub grace_days: i64,
    #[serde(default)]
    pub evaluator1_id: Option<i64>,
    #[serde(default)]
    pub evaluator2_id: Option<i64>,
    #[serde(default)]
    pub requirements: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub review_type: ReviewType,
    #[serde(flatten)]
    pub schedule: ScheduleFields,
}

#[derive(Debug, Deserialize)]
pub struct EditReviewRequest {
    #[serde(flatten)]
    pub schedule: ScheduleFields,
    #[serde(default)]
    pub reason: String,
}

/// Validate schedule fields against the panel rules and the department's
/// management window
async fn build_schedule(
    state: &AppState,
    team: &Team,
    review_type: ReviewType,
    fields: ScheduleFields,
) -> ApiResult<ReviewSchedule> {
    validate_grace_days(fields.grace_days)?;

    let evaluator1 = match fields.evaluator1_id {
        Some(id) => Some(find_evaluator(state, id).await?),
        None => None,
    };
    let evaluator2 = match fields.evaluator2_id {
        Some(id) => Some(find_evaluator(state, id).await?),
        None => None,
    };
    validate_panel(evaluator1.as_ref(), evaluator2.as_ref(), team.department_id)?;

    if let Some(date_time) = fields.date_time {
        let window =
            reviews::window(&state.db, team.department_id, team.batch_id, review_type).await?;
        check_within_window(window.as_ref(), date_time.date())?;
    }

    Ok(ReviewSchedule {
        date_time: fields.date_time,
        grace_days: fields.grace_days,
        evaluator1_id: fields.evaluator1_id,
        evaluator2_id: fields.evaluator2_id,
        requirements: fields.requirements.trim().to_string(),
    })
}

async fn find_evaluator(
    state: &AppState,
    faculty_id: i64,
) -> ApiResult<spm_common::db::FacultyProfile> {
    users::faculty_by_id(&state.db, faculty_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("Evaluator {} not found.", faculty_id)))
}

/// POST /api/coordinator/teams/:team_id/reviews
pub async fn create_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<i64>,
    Json(req): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (coordinator, department_id) = current.require_coordinator()?;
    let team = department_team(&state, department_id, team_id).await?;

    let existing = reviews::for_team(&state.db, team.id).await?;
    if existing.iter().any(|r| r.review_type == req.review_type) {
        return Err(ApiError::Conflict(format!(
            "{} is already scheduled for this team.",
            req.review_type.label()
        )));
    }

    let schedule = build_schedule(&state, &team, req.review_type, req.schedule).await?;
    let review = reviews::create(&state.db, team.id, req.review_type, &schedule).await?;

    info!(
        "Coordinator {} created {} review {} for team {}",
        coordinator.id,
        req.review_type.as_str(),
        review.id,
        team.id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Review created.", "review": review })),
    ))
}

/// POST /api/coordinator/teams/:team_id/reviews/:review_id
pub async fn edit_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((team_id, review_id)): Path<(i64, i64)>,
    Json(req): Json<EditReviewRequest>,
) -> ApiResult<Json<Value>> {
    let (coordinator, department_id) = current.require_coordinator()?;
    let team = department_team(&state, department_id, team_id).await?;

    let review = reviews::get(&state.db, review_id)
        .await?
        .filter(|r| r.team_id == team.id)
        .ok_or_else(|| ApiError::NotFound("Review not found for this team.".to_string()))?;
    if review.hod_freeze_state == FreezeState::HardLocked {
        return Err(ApiError::Conflict("This review is hard locked.".to_string()));
    }

    let reason = req.reason.trim().to_string();
    let schedule = build_schedule(&state, &team, review.review_type, req.schedule).await?;
    if schedule.date_time != review.date_time && reason.is_empty() {
        return Err(ApiError::BadRequest(
            "A reason is required when changing the review date.".to_string(),
        ));
    }

    let updated =
        reviews::update_schedule(&state.db, review.id, &schedule, coordinator.id, &reason).await?;

    if updated.date_time != review.date_time {
        info!(
            "Coordinator {} moved review {} from {:?} to {:?}",
            coordinator.id, review.id, review.date_time, updated.date_time
        );
    } else {
        info!("Coordinator {} updated review {}", coordinator.id, review.id);
    }

    Ok(Json(json!({ "message": "Review updated.", "review": updated })))
}

#[derive(Debug, Deserialize)]
pub struct AssignMentorRequest {
    pub mentor_id: Option<i64>,
}

/// POST /api/coordinator/teams/:team_id/mentor
pub async fn assign_mentor(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(team_id): Path<i64>,
    Json(req): Json<AssignMentorRequest>,
) -> ApiResult<Json<Value>> {
    let (coordinator, department_id) = current.require_coordinator()?;
    let team = department_team(&state, department_id, team_id).await?;

    if let Some(mentor_id) = req.mentor_id {
        let mentor = users::faculty_by_id(&state.db, mentor_id).await?;
        let eligible = mentor
            .as_ref()
            .is_some_and(|m| m.is_supervisor && m.in_department(department_id));
        if !eligible {
            return Err(ApiError::BadRequest(
                "Mentor must be a supervisor in your department.".to_string(),
            ));
        }
    }

    teams::set_mentor(&state.db, team.id, req.mentor_id).await?;
    info!(
        "Coordinator {} set mentor of team {} to {:?}",
        coordinator.id, team.id, req.mentor_id
    );

    Ok(Json(json!({ "message": "Mentor updated." })))
}
