//! Login, logout and the bearer-session middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spm_common::auth::verify_password;
use spm_common::db::User;
use tracing::{info, warn};

use crate::db::{sessions, users};
use crate::error::{ApiError, ApiResult};
use crate::session::{CurrentUser, Role};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    Student,
    Faculty,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login_type: LoginType,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub roll_number: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub dashboard: String,
}

/// Session middleware for protected routes
///
/// Reads `Authorization: Bearer <token>` and stores the `CurrentUser` in the
/// request extensions.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Please log in.".to_string()))?
        .to_string();

    let current = CurrentUser::load(&state.db, &token).await?;
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = match req.login_type {
        LoginType::Student => authenticate_student(&state, &req).await?,
        LoginType::Faculty => authenticate_faculty(&state, &req).await?,
    };

    let session = sessions::create_session(&state.db, user.id, state.session_ttl).await?;
    let current = CurrentUser::load(&state.db, &session.token).await?;
    let Some(role) = current.role() else {
        sessions::delete_session(&state.db, &session.token).await?;
        return Err(ApiError::Forbidden(
            "No profile is linked to this account.".to_string(),
        ));
    };

    info!("User {} logged in as {:?}", user.username, role);

    Ok(Json(LoginResponse {
        token: session.token,
        role,
        dashboard: role.dashboard_path().to_string(),
    }))
}

async fn authenticate_student(state: &AppState, req: &LoginRequest) -> ApiResult<User> {
    let invalid = || ApiError::Unauthorized("Invalid roll number or password.".to_string());

    let roll = req.roll_number.as_deref().map(str::trim).unwrap_or_default();
    if roll.is_empty() {
        return Err(invalid());
    }
    let student = users::student_by_roll(&state.db, roll)
        .await?
        .ok_or_else(invalid)?;
    let user = users::get_user(&state.db, student.user_id)
        .await?
        .ok_or_else(invalid)?;

    check_credentials(user, &req.password).ok_or_else(invalid)
}

async fn authenticate_faculty(state: &AppState, req: &LoginRequest) -> ApiResult<User> {
    let invalid = || ApiError::Unauthorized("Invalid username or password.".to_string());

    let username = req.username.as_deref().map(str::trim).unwrap_or_default();
    if username.is_empty() {
        return Err(invalid());
    }
    let user = users::find_user_by_username(&state.db, username)
        .await?
        .ok_or_else(invalid)?;

    check_credentials(user, &req.password).ok_or_else(invalid)
}

fn check_credentials(user: User, password: &str) -> Option<User> {
    if !user.is_active {
        warn!("Login attempt for inactive user {}", user.username);
        return None;
    }
    if !verify_password(password, &user.password_salt, &user.password_hash) {
        warn!("Failed login for {}", user.username);
        return None;
    }
    Some(user)
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    sessions::delete_session(&state.db, &current.token).await?;
    info!("User {} logged out", current.user.username);
    Ok(Json(json!({ "message": "Logged out." })))
}

/// GET /api/dashboard
///
/// Tells the client which role dashboard to open.
pub async fn dashboard_redirect(
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let role = current
        .role()
        .ok_or_else(|| ApiError::Forbidden("No profile is linked to this account.".to_string()))?;
    Ok(Json(json!({
        "role": role,
        "dashboard": role.dashboard_path(),
        "username": current.user.username,
        "full_name": current.user.full_name,
    })))
}
