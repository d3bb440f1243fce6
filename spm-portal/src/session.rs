//! The signed-in user and role checks
//!
//! `CurrentUser` is loaded by the session middleware and handed to handlers
//! through request extensions. Role guards return the profile the handler
//! needs, or a 403 naming the missing role.

use serde::Serialize;
use spm_common::db::{FacultyProfile, StudentProfile, User};
use sqlx::SqlitePool;

use crate::db::{sessions, users};
use crate::error::{ApiError, ApiResult};

/// Where a user lands after login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Principal,
    Hod,
    Coordinator,
    Faculty,
}

impl Role {
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Student => "/api/student/dashboard",
            Role::Principal => "/api/principal/dashboard",
            Role::Hod => "/api/hod/dashboard",
            Role::Coordinator => "/api/coordinator/dashboard",
            Role::Faculty => "/api/faculty/dashboard",
        }
    }
}

/// Authenticated user attached to each protected request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub student: Option<StudentProfile>,
    pub faculty: Option<FacultyProfile>,
    pub token: String,
}

impl CurrentUser {
    /// Resolve a session token into the user and their profiles
    pub async fn load(pool: &SqlitePool, token: &str) -> ApiResult<Self> {
        let session = sessions::find_active(pool, token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Session expired or invalid.".to_string()))?;

        let user = users::get_user(pool, session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ApiError::Unauthorized("Account is not active.".to_string()))?;

        let student = users::student_by_user(pool, user.id).await?;
        let faculty = users::faculty_by_user(pool, user.id).await?;

        Ok(Self {
            user,
            student,
            faculty,
            token: token.to_string(),
        })
    }

    /// Dashboard role, by precedence student, principal, HOD, coordinator,
    /// then any other faculty
    pub fn role(&self) -> Option<Role> {
        if self.student.is_some() {
            return Some(Role::Student);
        }
        if self.is_principal() {
            return Some(Role::Principal);
        }
        let faculty = self.faculty.as_ref()?;
        if faculty.is_hod {
            Some(Role::Hod)
        } else if faculty.is_coordinator {
            Some(Role::Coordinator)
        } else {
            Some(Role::Faculty)
        }
    }

    pub fn is_principal(&self) -> bool {
        self.user.is_superuser || self.faculty.as_ref().is_some_and(|f| f.is_principal)
    }

    pub fn require_student(&self) -> ApiResult<&StudentProfile> {
        self.student
            .as_ref()
            .ok_or_else(|| ApiError::Forbidden("You are not a student.".to_string()))
    }

    pub fn require_faculty(&self) -> ApiResult<&FacultyProfile> {
        self.faculty
            .as_ref()
            .ok_or_else(|| ApiError::Forbidden("Faculty profile not found.".to_string()))
    }

    /// HOD profile and the department it heads
    pub fn require_hod(&self) -> ApiResult<(&FacultyProfile, i64)> {
        self.require_flag("HOD", |f| f.is_hod)
    }

    /// Coordinator profile and its department
    pub fn require_coordinator(&self) -> ApiResult<(&FacultyProfile, i64)> {
        self.require_flag("coordinator", |f| f.is_coordinator)
    }

    pub fn require_supervisor(&self) -> ApiResult<&FacultyProfile> {
        self.require_flag("supervisor", |f| f.is_supervisor)
            .map(|(f, _)| f)
    }

    pub fn require_evaluator(&self) -> ApiResult<&FacultyProfile> {
        self.require_flag("evaluator", |f| f.is_evaluator)
            .map(|(f, _)| f)
    }

    pub fn require_advisor(&self) -> ApiResult<(&FacultyProfile, i64)> {
        self.require_flag("advisor", |f| f.is_advisor)
    }

    pub fn require_principal(&self) -> ApiResult<()> {
        if self.is_principal() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("You are not marked as principal.".to_string()))
        }
    }

    fn require_flag(
        &self,
        role: &str,
        has_role: impl Fn(&FacultyProfile) -> bool,
    ) -> ApiResult<(&FacultyProfile, i64)> {
        let faculty = self.require_faculty()?;
        if !has_role(faculty) {
            return Err(ApiError::Forbidden(format!("You are not marked as {}.", role)));
        }
        let department_id = faculty.department_id.ok_or_else(|| {
            ApiError::Forbidden("No department is assigned to your profile.".to_string())
        })?;
        Ok((faculty, department_id))
    }
}
