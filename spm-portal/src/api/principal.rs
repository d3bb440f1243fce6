//! Principal dashboard: every team, every review and recent freeze activity

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use spm_common::db::{FreezeHistory, Review};

use crate::db::reviews;
use crate::db::teams::{self, TeamListing};
use crate::error::ApiResult;
use crate::session::CurrentUser;
use crate::AppState;

const RECENT_FREEZE_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct PrincipalDashboard {
    pub teams: Vec<TeamListing>,
    pub reviews: Vec<Review>,
    pub recent_freeze_history: Vec<FreezeHistory>,
}

/// GET /api/principal/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<PrincipalDashboard>> {
    current.require_principal()?;

    Ok(Json(PrincipalDashboard {
        teams: teams::all_listings(&state.db).await?,
        reviews: reviews::all(&state.db).await?,
        recent_freeze_history: reviews::recent_freeze_history(&state.db, RECENT_FREEZE_LIMIT)
            .await?,
    }))
}
