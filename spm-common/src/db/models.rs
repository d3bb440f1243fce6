//! Database models
//!
//! One struct per table, decoded with `FromRow`. Status-like columns are
//! stored as lowercase TEXT and decoded into the enums below.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

// ========================================
// Organisation
// ========================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub full_name: String,
    pub email: String,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassSection {
    pub id: i64,
    pub name: String,
    pub department_id: i64,
    pub batch_id: i64,
    pub created_at: DateTime<Utc>,
}

// ========================================
// Profiles
// ========================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: i64,
    pub user_id: i64,
    pub roll_number: String,
    pub full_name: String,
    pub department_id: Option<i64>,
    pub batch_id: Option<i64>,
    pub class_section_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl StudentProfile {
    /// Same department and batch, the scope of invitations
    pub fn same_cohort(&self, other: &StudentProfile) -> bool {
        self.department_id.is_some()
            && self.batch_id.is_some()
            && self.department_id == other.department_id
            && self.batch_id == other.batch_id
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FacultyProfile {
    pub id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub department_id: Option<i64>,
    pub is_hod: bool,
    pub is_coordinator: bool,
    pub is_supervisor: bool,
    pub is_evaluator: bool,
    pub is_advisor: bool,
    pub is_principal: bool,
    pub advisor_section_id: Option<i64>,
    pub freeze_count: i64,
    pub unfreeze_count: i64,
    pub created_at: DateTime<Utc>,
}

impl FacultyProfile {
    pub fn in_department(&self, department_id: i64) -> bool {
        self.department_id == Some(department_id)
    }
}

// ========================================
// Teams & Invitations
// ========================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub department_id: i64,
    pub batch_id: i64,
    pub class_section_id: i64,
    pub leader_id: i64,
    pub mentor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub team_id: i64,
    pub from_student_id: i64,
    pub to_student_id: i64,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

// ========================================
// Proposals
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Revision,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Revision => "revision",
            ProposalStatus::Rejected => "rejected",
        }
    }

    /// Whether the team may still change the proposal text
    pub fn accepts_resubmission(&self) -> bool {
        matches!(self, ProposalStatus::Pending | ProposalStatus::Revision)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectProposal {
    pub id: i64,
    pub team_id: i64,
    pub title: String,
    pub abstract_text: String,
    pub preferred_mentor_id: Option<i64>,
    pub status: ProposalStatus,
    pub reviewer_comment: String,
    pub reviewed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProposalDocument {
    pub id: i64,
    pub proposal_id: i64,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub size_bytes: i64,
    pub version: i64,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

// ========================================
// Reviews & Rubrics
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    Zeroth,
    First,
    Second,
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewType::Zeroth => "zeroth",
            ReviewType::First => "first",
            ReviewType::Second => "second",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviewType::Zeroth => "Zeroth",
            ReviewType::First => "Review 1",
            ReviewType::Second => "Review 2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FreezeState {
    NotFrozen,
    FrozenSoft,
    HardLocked,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub team_id: i64,
    pub review_type: ReviewType,
    pub date_time: Option<NaiveDateTime>,
    pub grace_days: i64,
    pub evaluator1_id: Option<i64>,
    pub evaluator2_id: Option<i64>,
    pub requirements: String,
    pub hod_freeze_state: FreezeState,
    pub first_freeze_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ManagementWindow {
    pub id: i64,
    pub department_id: i64,
    pub batch_id: i64,
    pub review_type: ReviewType,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RubricTemplate {
    pub id: i64,
    pub name: String,
    pub review_type: ReviewType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RubricItem {
    pub id: i64,
    pub template_id: i64,
    pub item_order: i64,
    pub title: String,
    pub max_score: i64,
}

// ========================================
// Marks & History
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PanelRole {
    Hod,
    Supervisor,
    Evaluator1,
    Evaluator2,
}

impl PanelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelRole::Hod => "hod",
            PanelRole::Supervisor => "supervisor",
            PanelRole::Evaluator1 => "evaluator1",
            PanelRole::Evaluator2 => "evaluator2",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PanelEvaluation {
    pub id: i64,
    pub review_id: i64,
    pub student_id: i64,
    pub rubric_item_id: i64,
    pub role: PanelRole,
    pub score: Option<i64>,
    pub comment: String,
    pub version_group_id: String,
    pub version_number: i64,
    pub entered_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FreezeAction {
    Freeze,
    Unfreeze,
    HardLock,
}

impl FreezeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreezeAction::Freeze => "freeze",
            FreezeAction::Unfreeze => "unfreeze",
            FreezeAction::HardLock => "hard_lock",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FreezeHistory {
    pub id: i64,
    pub review_id: i64,
    pub action: FreezeAction,
    pub by_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReviewFile {
    pub id: i64,
    pub review_id: i64,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub size_bytes: i64,
    pub version: i64,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DateChangeHistory {
    pub id: i64,
    pub review_id: i64,
    pub old_date: Option<NaiveDateTime>,
    pub new_date: Option<NaiveDateTime>,
    pub changed_by_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// ========================================
// Sessions
// ========================================

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
