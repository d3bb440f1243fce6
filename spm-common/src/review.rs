//! Review lifecycle rules
//!
//! A review moves through three freeze states controlled by the HOD:
//!
//! ```text
//!   not_frozen --freeze--> frozen_soft --unfreeze--> not_frozen
//!        |                      |
//!        +------hard_lock-------+----> hard_locked (terminal)
//! ```
//!
//! Marks may only be entered while the review is `not_frozen` and today lies
//! inside `[review date, review date + grace_days]`. Each mark submission by
//! a panel role is a new version; the latest version per role is effective.
//!
//! Everything here is pure; persistence lives in the portal's `db::reviews`.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::db::{
    FacultyProfile, FreezeAction, FreezeState, ManagementWindow, PanelEvaluation, PanelRole,
    Review, Team,
};
use crate::{Error, Result};

/// Upper bound for `grace_days`
pub const MAX_GRACE_DAYS: i64 = 2;

impl FreezeState {
    /// Apply an HOD action, returning the next state
    pub fn apply(self, action: FreezeAction) -> Result<FreezeState> {
        match (self, action) {
            (FreezeState::NotFrozen, FreezeAction::Freeze) => Ok(FreezeState::FrozenSoft),
            (FreezeState::FrozenSoft, FreezeAction::Unfreeze) => Ok(FreezeState::NotFrozen),
            (FreezeState::NotFrozen | FreezeState::FrozenSoft, FreezeAction::HardLock) => {
                Ok(FreezeState::HardLocked)
            }
            (FreezeState::HardLocked, _) => Err(Error::Conflict(
                "This review is hard locked.".to_string(),
            )),
            (FreezeState::FrozenSoft, FreezeAction::Freeze) => Err(Error::Conflict(
                "This review is already frozen.".to_string(),
            )),
            (FreezeState::NotFrozen, FreezeAction::Unfreeze) => Err(Error::Conflict(
                "This review is not frozen.".to_string(),
            )),
        }
    }

    pub fn is_frozen(&self) -> bool {
        !matches!(self, FreezeState::NotFrozen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FreezeState::NotFrozen => "not_frozen",
            FreezeState::FrozenSoft => "frozen_soft",
            FreezeState::HardLocked => "hard_locked",
        }
    }
}

/// Inclusive date range during which marks may be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditWindow {
    pub opens: NaiveDate,
    pub closes: NaiveDate,
}

impl EditWindow {
    /// Window for a scheduled review; `None` until a date is set
    pub fn for_schedule(date_time: Option<NaiveDateTime>, grace_days: i64) -> Option<Self> {
        let opens = date_time?.date();
        let closes = opens + Duration::days(grace_days.clamp(0, MAX_GRACE_DAYS));
        Some(Self { opens, closes })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.opens <= day && day <= self.closes
    }
}

/// Reason marks cannot be edited right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditBlock {
    HardLocked,
    Frozen,
    NotScheduled,
    NotYetOpen(NaiveDate),
    Closed(NaiveDate),
}

impl EditBlock {
    pub fn message(&self) -> String {
        match self {
            EditBlock::HardLocked => "This review is hard locked.".to_string(),
            EditBlock::Frozen => "This review is currently frozen.".to_string(),
            EditBlock::NotScheduled => "This review has not been scheduled yet.".to_string(),
            EditBlock::NotYetOpen(opens) => {
                format!("Marks can be entered from {}.", opens)
            }
            EditBlock::Closed(closed) => {
                format!("The marks entry window closed on {}.", closed)
            }
        }
    }
}

impl From<EditBlock> for Error {
    fn from(block: EditBlock) -> Self {
        Error::Conflict(block.message())
    }
}

/// Check whether marks for `review` may be edited on `today`
pub fn check_editable(review: &Review, today: NaiveDate) -> std::result::Result<(), EditBlock> {
    match review.hod_freeze_state {
        FreezeState::HardLocked => return Err(EditBlock::HardLocked),
        FreezeState::FrozenSoft => return Err(EditBlock::Frozen),
        FreezeState::NotFrozen => {}
    }

    let window = EditWindow::for_schedule(review.date_time, review.grace_days)
        .ok_or(EditBlock::NotScheduled)?;

    if today < window.opens {
        Err(EditBlock::NotYetOpen(window.opens))
    } else if today > window.closes {
        Err(EditBlock::Closed(window.closes))
    } else {
        Ok(())
    }
}

/// Check if marks can be edited on `today`
pub fn is_editable(review: &Review, today: NaiveDate) -> bool {
    check_editable(review, today).is_ok()
}

pub fn validate_grace_days(grace_days: i64) -> Result<()> {
    if !(0..=MAX_GRACE_DAYS).contains(&grace_days) {
        return Err(Error::InvalidInput(format!(
            "Grace days must be between 0 and {}.",
            MAX_GRACE_DAYS
        )));
    }
    Ok(())
}

pub fn validate_score(score: Option<i64>, max_score: i64) -> Result<()> {
    match score {
        Some(s) if s < 0 => Err(Error::InvalidInput(
            "Scores cannot be negative.".to_string(),
        )),
        Some(s) if s > max_score => Err(Error::InvalidInput(format!(
            "Score {} exceeds the maximum of {}.",
            s, max_score
        ))),
        _ => Ok(()),
    }
}

/// Next version number after the current maximum (1 when none exists)
pub fn next_version(current_max: Option<i64>) -> i64 {
    current_max.unwrap_or(0) + 1
}

pub fn version_group_id(version_number: i64) -> String {
    format!("v{}", version_number)
}

/// Panel roles `faculty` holds on `review` of `team`
pub fn panel_roles(faculty: &FacultyProfile, team: &Team, review: &Review) -> Vec<PanelRole> {
    let mut roles = Vec::new();
    if faculty.is_hod && faculty.in_department(team.department_id) {
        roles.push(PanelRole::Hod);
    }
    if team.mentor_id == Some(faculty.id) {
        roles.push(PanelRole::Supervisor);
    }
    if review.evaluator1_id == Some(faculty.id) {
        roles.push(PanelRole::Evaluator1);
    }
    if review.evaluator2_id == Some(faculty.id) {
        roles.push(PanelRole::Evaluator2);
    }
    roles
}

/// Validate the evaluator pair for a review of a team in `department_id`
pub fn validate_panel(
    evaluator1: Option<&FacultyProfile>,
    evaluator2: Option<&FacultyProfile>,
    department_id: i64,
) -> Result<()> {
    for evaluator in [evaluator1, evaluator2].into_iter().flatten() {
        if !evaluator.is_evaluator {
            return Err(Error::InvalidInput(format!(
                "{} is not marked as evaluator.",
                evaluator.full_name
            )));
        }
        if !evaluator.in_department(department_id) {
            return Err(Error::InvalidInput(format!(
                "{} is not in this department.",
                evaluator.full_name
            )));
        }
    }

    if let (Some(a), Some(b)) = (evaluator1, evaluator2) {
        if a.id == b.id {
            return Err(Error::InvalidInput(
                "Evaluator 1 and evaluator 2 must be different.".to_string(),
            ));
        }
    }

    Ok(())
}

pub fn validate_window_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(Error::InvalidInput(
                "Window start date must not be after its end date.".to_string(),
            ));
        }
    }
    Ok(())
}

/// Check a review date against the department's management window, if any
pub fn check_within_window(window: Option<&ManagementWindow>, date: NaiveDate) -> Result<()> {
    let Some(window) = window else {
        return Ok(());
    };

    let too_early = window.start_date.is_some_and(|start| date < start);
    let too_late = window.end_date.is_some_and(|end| date > end);
    if too_early || too_late {
        let show = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        return Err(Error::InvalidInput(format!(
            "Review date {} is outside the allowed window ({} to {}).",
            date,
            show(window.start_date),
            show(window.end_date)
        )));
    }
    Ok(())
}

/// Keep only the latest version of each role's marks
pub fn latest_versions(evaluations: Vec<PanelEvaluation>) -> Vec<PanelEvaluation> {
    let mut latest: HashMap<PanelRole, i64> = HashMap::new();
    for e in &evaluations {
        let entry = latest.entry(e.role).or_insert(e.version_number);
        if e.version_number > *entry {
            *entry = e.version_number;
        }
    }
    evaluations
        .into_iter()
        .filter(|e| latest.get(&e.role) == Some(&e.version_number))
        .collect()
}

/// Per-student totals by role, plus the mean across roles that scored
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudentSummary {
    pub student_id: i64,
    pub totals: BTreeMap<PanelRole, i64>,
    pub average: Option<f64>,
}

/// Summarise effective (latest-version) marks per student
pub fn summarize(evaluations: &[PanelEvaluation]) -> Vec<StudentSummary> {
    let mut per_student: BTreeMap<i64, BTreeMap<PanelRole, i64>> = BTreeMap::new();
    for e in evaluations {
        let totals = per_student.entry(e.student_id).or_default();
        let total = totals.entry(e.role).or_insert(0);
        *total += e.score.unwrap_or(0);
    }

    per_student
        .into_iter()
        .map(|(student_id, totals)| {
            let average = if totals.is_empty() {
                None
            } else {
                Some(totals.values().sum::<i64>() as f64 / totals.len() as f64)
            };
            StudentSummary {
                student_id,
                totals,
                average,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ReviewType;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn review(date_time: Option<NaiveDateTime>, grace_days: i64, state: FreezeState) -> Review {
        let stamp = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Review {
            id: 1,
            team_id: 1,
            review_type: ReviewType::First,
            date_time,
            grace_days,
            evaluator1_id: Some(10),
            evaluator2_id: Some(11),
            requirements: String::new(),
            hod_freeze_state: state,
            first_freeze_at: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn faculty(id: i64, department_id: i64) -> FacultyProfile {
        FacultyProfile {
            id,
            user_id: id,
            full_name: format!("Faculty {}", id),
            department_id: Some(department_id),
            is_hod: false,
            is_coordinator: false,
            is_supervisor: false,
            is_evaluator: true,
            is_advisor: false,
            is_principal: false,
            advisor_section_id: None,
            freeze_count: 0,
            unfreeze_count: 0,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn evaluation(student_id: i64, role: PanelRole, version: i64, score: i64) -> PanelEvaluation {
        PanelEvaluation {
            id: 0,
            review_id: 1,
            student_id,
            rubric_item_id: 1,
            role,
            score: Some(score),
            comment: String::new(),
            version_group_id: version_group_id(version),
            version_number: version,
            entered_by: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_freeze_transitions() {
        use FreezeAction::*;
        use FreezeState::*;

        assert_eq!(NotFrozen.apply(Freeze).unwrap(), FrozenSoft);
        assert_eq!(FrozenSoft.apply(Unfreeze).unwrap(), NotFrozen);
        assert_eq!(NotFrozen.apply(HardLock).unwrap(), HardLocked);
        assert_eq!(FrozenSoft.apply(HardLock).unwrap(), HardLocked);

        assert!(FrozenSoft.apply(Freeze).is_err());
        assert!(NotFrozen.apply(Unfreeze).is_err());
    }

    #[test]
    fn test_hard_lock_is_terminal() {
        for action in [FreezeAction::Freeze, FreezeAction::Unfreeze, FreezeAction::HardLock] {
            let err = FreezeState::HardLocked.apply(action).unwrap_err();
            assert!(matches!(err, Error::Conflict(_)));
        }
    }

    #[test]
    fn test_editable_inside_grace_window() {
        let scheduled = date(2025, 3, 10).and_hms_opt(10, 0, 0);
        let r = review(scheduled, 2, FreezeState::NotFrozen);

        assert!(!is_editable(&r, date(2025, 3, 9)));
        assert!(is_editable(&r, date(2025, 3, 10)));
        assert!(is_editable(&r, date(2025, 3, 12)));
        assert!(!is_editable(&r, date(2025, 3, 13)));
    }

    #[test]
    fn test_zero_grace_days_means_review_day_only() {
        let r = review(date(2025, 3, 10).and_hms_opt(23, 0, 0), 0, FreezeState::NotFrozen);
        assert!(is_editable(&r, date(2025, 3, 10)));
        assert_eq!(
            check_editable(&r, date(2025, 3, 11)),
            Err(EditBlock::Closed(date(2025, 3, 10)))
        );
    }

    #[test]
    fn test_frozen_or_unscheduled_review_not_editable() {
        let day = date(2025, 3, 10);
        let scheduled = day.and_hms_opt(9, 0, 0);

        let soft = review(scheduled, 1, FreezeState::FrozenSoft);
        assert_eq!(check_editable(&soft, day), Err(EditBlock::Frozen));

        let locked = review(scheduled, 1, FreezeState::HardLocked);
        assert_eq!(check_editable(&locked, day), Err(EditBlock::HardLocked));

        let unscheduled = review(None, 1, FreezeState::NotFrozen);
        assert_eq!(check_editable(&unscheduled, day), Err(EditBlock::NotScheduled));
    }

    #[test]
    fn test_validate_grace_days() {
        assert!(validate_grace_days(0).is_ok());
        assert!(validate_grace_days(2).is_ok());
        assert!(validate_grace_days(3).is_err());
        assert!(validate_grace_days(-1).is_err());
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(None, 5).is_ok());
        assert!(validate_score(Some(0), 5).is_ok());
        assert!(validate_score(Some(5), 5).is_ok());
        assert!(validate_score(Some(6), 5).is_err());
        assert!(validate_score(Some(-1), 5).is_err());
    }

    #[test]
    fn test_versions() {
        assert_eq!(next_version(None), 1);
        assert_eq!(next_version(Some(3)), 4);
        assert_eq!(version_group_id(4), "v4");
    }

    #[test]
    fn test_validate_panel() {
        let a = faculty(1, 7);
        let b = faculty(2, 7);
        assert!(validate_panel(Some(&a), Some(&b), 7).is_ok());
        assert!(validate_panel(Some(&a), None, 7).is_ok());
        assert!(validate_panel(Some(&a), Some(&a), 7).is_err());
        assert!(validate_panel(Some(&a), Some(&b), 8).is_err());

        let mut not_evaluator = faculty(3, 7);
        not_evaluator.is_evaluator = false;
        assert!(validate_panel(Some(&not_evaluator), None, 7).is_err());
    }

    #[test]
    fn test_window_check() {
        let stamp = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let window = ManagementWindow {
            id: 1,
            department_id: 1,
            batch_id: 1,
            review_type: ReviewType::First,
            start_date: Some(date(2025, 3, 1)),
            end_date: Some(date(2025, 3, 31)),
            updated_at: stamp,
        };

        assert!(check_within_window(None, date(2030, 1, 1)).is_ok());
        assert!(check_within_window(Some(&window), date(2025, 3, 1)).is_ok());
        assert!(check_within_window(Some(&window), date(2025, 3, 31)).is_ok());
        assert!(check_within_window(Some(&window), date(2025, 2, 28)).is_err());
        assert!(check_within_window(Some(&window), date(2025, 4, 1)).is_err());
        assert!(validate_window_bounds(Some(date(2025, 4, 1)), Some(date(2025, 3, 1))).is_err());
    }

    #[test]
    fn test_latest_versions_keep_newest_per_role() {
        let evals = vec![
            evaluation(1, PanelRole::Evaluator1, 1, 2),
            evaluation(1, PanelRole::Evaluator1, 2, 4),
            evaluation(1, PanelRole::Hod, 1, 3),
        ];
        let latest = latest_versions(evals);
        assert_eq!(latest.len(), 2);
        assert!(latest
            .iter()
            .any(|e| e.role == PanelRole::Evaluator1 && e.version_number == 2));
        assert!(latest.iter().any(|e| e.role == PanelRole::Hod));
    }

    #[test]
    fn test_summarize_totals_and_average() {
        let evals = vec![
            evaluation(1, PanelRole::Evaluator1, 1, 4),
            evaluation(1, PanelRole::Evaluator1, 1, 3),
            evaluation(1, PanelRole::Hod, 1, 5),
            evaluation(2, PanelRole::Hod, 1, 2),
        ];
        let summary = summarize(&evals);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].totals[&PanelRole::Evaluator1], 7);
        assert_eq!(summary[0].totals[&PanelRole::Hod], 5);
        assert_eq!(summary[0].average, Some(6.0));
        assert_eq!(summary[1].average, Some(2.0));
    }
}
