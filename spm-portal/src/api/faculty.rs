//! Dashboards for faculty roles without department-wide duties: general
//! faculty, supervisors (mentors), evaluators and class advisors

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use spm_common::db::{ProjectProposal, Review, StudentProfile, Team};

use super::teams::{team_view, TeamView};
use crate::db::{proposals, reviews, teams, users};
use crate::error::ApiResult;
use crate::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FacultyDashboard {
    pub supervised_teams: Vec<Team>,
    pub evaluator_reviews: Vec<Review>,
}

/// GET /api/faculty/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<FacultyDashboard>> {
    let faculty = current.require_faculty()?;

    let supervised_teams = if faculty.is_supervisor {
        teams::teams_mentored_by(&state.db, faculty.id).await?
    } else {
        Vec::new()
    };
    let evaluator_reviews = if faculty.is_evaluator {
        reviews::for_evaluator(&state.db, faculty.id).await?
    } else {
        Vec::new()
    };

    Ok(Json(FacultyDashboard {
        supervised_teams,
        evaluator_reviews,
    }))
}

#[derive(Debug, Serialize)]
pub struct MentoredTeam {
    #[serde(flatten)]
    pub view: TeamView,
    pub proposal: Option<ProjectProposal>,
}

/// GET /api/supervisor/dashboard
pub async fn supervisor_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<MentoredTeam>>> {
    let faculty = current.require_supervisor()?;

    let mut mentored = Vec::new();
    for team in teams::teams_mentored_by(&state.db, faculty.id).await? {
        let proposal = proposals::for_team(&state.db, team.id).await?;
        mentored.push(MentoredTeam {
            view: team_view(&state, team).await?,
            proposal,
        });
    }
    Ok(Json(mentored))
}

#[derive(Debug, Serialize)]
pub struct EvaluatorReview {
    #[serde(flatten)]
    pub review: Review,
    pub team_name: String,
}

/// GET /api/evaluator/dashboard
pub async fn evaluator_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<EvaluatorReview>>> {
    let faculty = current.require_evaluator()?;

    let mut assigned = Vec::new();
    for review in reviews::for_evaluator(&state.db, faculty.id).await? {
        let team_name = teams::get_team(&state.db, review.team_id)
            .await?
            .map(|t| t.name)
            .unwrap_or_default();
        assigned.push(EvaluatorReview { review, team_name });
    }
    Ok(Json(assigned))
}

#[derive(Debug, Serialize)]
pub struct AdvisedStudent {
    pub student: StudentProfile,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
}

/// GET /api/advisor/dashboard
///
/// Students of the advisor's section, or of the whole department when no
/// section is assigned.
pub async fn advisor_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<AdvisedStudent>>> {
    let (faculty, department_id) = current.require_advisor()?;

    let students = match faculty.advisor_section_id {
        Some(section_id) => users::students_in_section(&state.db, section_id).await?,
        None => users::students_in_department(&state.db, department_id).await?,
    };

    let mut advised = Vec::with_capacity(students.len());
    for student in students {
        let team = teams::team_for_student(&state.db, student.id).await?;
        advised.push(AdvisedStudent {
            team_id: team.as_ref().map(|t| t.id),
            team_name: team.map(|t| t.name),
            student,
        });
    }
    Ok(Json(advised))
}
