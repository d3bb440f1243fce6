//! spm-portal library - student project management HTTP service
//!
//! Students form teams and submit proposals; faculty approve them, schedule
//! reviews and enter rubric marks. Every route except `/health` and login
//! requires a bearer session.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod media;
pub mod roster;
pub mod session;

use media::MediaStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Uploaded document storage
    pub media: MediaStore,
    /// Lifetime of a login session
    pub session_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(db: SqlitePool, media: MediaStore, session_ttl_hours: i64) -> Self {
        Self {
            db,
            media,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, post};

    let upload_limit = DefaultBodyLimit::max(state.media.body_limit());

    let student = Router::new()
        .route("/api/student/dashboard", get(api::student::dashboard))
        .route("/api/student/team", post(api::student::create_team))
        .route("/api/student/invitations", post(api::student::send_invite))
        .route(
            "/api/student/invitations/:invite_id/:action",
            post(api::student::respond_invite),
        )
        .route(
            "/api/student/proposal",
            get(api::student::get_proposal).post(api::student::submit_proposal),
        )
        .route(
            "/api/student/proposal/documents",
            post(api::student::upload_document).layer(upload_limit.clone()),
        );

    let faculty = Router::new()
        .route("/api/faculty/dashboard", get(api::faculty::dashboard))
        .route("/api/supervisor/dashboard", get(api::faculty::supervisor_dashboard))
        .route("/api/evaluator/dashboard", get(api::faculty::evaluator_dashboard))
        .route("/api/advisor/dashboard", get(api::faculty::advisor_dashboard));

    let hod = Router::new()
        .route("/api/hod/dashboard", get(api::hod::dashboard))
        .route("/api/hod/faculty", get(api::hod::faculty_list))
        .route("/api/hod/proposals", get(api::proposals::hod_list))
        .route("/api/hod/proposals/:proposal_id", get(api::proposals::hod_detail))
        .route(
            "/api/hod/proposals/:proposal_id/decision",
            post(api::proposals::hod_decide),
        )
        .route("/api/hod/reviews/:review_id/freeze", post(api::hod::freeze_review))
        .route("/api/hod/reviews/:review_id/unfreeze", post(api::hod::unfreeze_review))
        .route("/api/hod/reviews/:review_id/hard-lock", post(api::hod::hard_lock_review))
        .route(
            "/api/hod/windows",
            get(api::hod::list_windows).put(api::hod::set_window),
        );

    let coordinator = Router::new()
        .route("/api/coordinator/dashboard", get(api::coordinator::dashboard))
        .route("/api/coordinator/proposals", get(api::proposals::coordinator_list))
        .route(
            "/api/coordinator/proposals/:proposal_id",
            get(api::proposals::coordinator_detail),
        )
        .route(
            "/api/coordinator/proposals/:proposal_id/decision",
            post(api::proposals::coordinator_decide),
        )
        .route(
            "/api/coordinator/teams/:team_id/mentor",
            post(api::coordinator::assign_mentor),
        )
        .route(
            "/api/coordinator/teams/:team_id/reviews",
            get(api::coordinator::team_reviews).post(api::coordinator::create_review),
        )
        .route(
            "/api/coordinator/teams/:team_id/reviews/:review_id",
            post(api::coordinator::edit_review),
        );

    let shared = Router::new()
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/dashboard", get(api::auth::dashboard_redirect))
        .route("/api/principal/dashboard", get(api::principal::dashboard))
        .route("/api/teams/:team_id", get(api::teams::team_detail))
        .route("/api/documents/:document_id", get(api::teams::download_document))
        .route("/api/reviews/:review_id", get(api::reviews::review_detail))
        .route("/api/reviews/:review_id/sheet", get(api::reviews::marks_sheet))
        .route("/api/reviews/:review_id/marks", post(api::reviews::submit_marks))
        .route(
            "/api/reviews/:review_id/files",
            get(api::reviews::list_files)
                .post(api::reviews::upload_file)
                .layer(upload_limit),
        )
        .route(
            "/api/reviews/:review_id/files/:file_id",
            get(api::reviews::download_file),
        );

    // Protected routes (require a session)
    let protected = Router::new()
        .merge(student)
        .merge(faculty)
        .merge(hod)
        .merge(coordinator)
        .merge(shared)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    // Public routes (no session)
    let public = Router::new()
        .route("/api/auth/login", post(api::auth::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
