//! Roster import
//!
//! Loads departments, batches, class sections, accounts, rubrics and
//! management windows from a TOML file. Rows are matched by natural key
//! (names, roll numbers, usernames) so importing the same roster twice
//! changes nothing; existing accounts keep their passwords.
//!
//! ```toml
//! [[batches]]
//! name = "2021-2025"
//! year = 2025
//!
//! [[sections]]
//! name = "A"
//! department = "CSE"
//! batch = "2021-2025"
//!
//! [[students]]
//! roll_number = "21CS001"
//! full_name = "Asha Rao"
//! password = "changeme"
//! department = "CSE"
//! batch = "2021-2025"
//! section = "A"
//!
//! [[faculty]]
//! username = "hod.cse"
//! full_name = "Dr. Iyer"
//! password = "changeme"
//! department = "CSE"
//! roles = ["hod", "evaluator"]
//!
//! [[rubrics]]
//! name = "Review 1"
//! review_type = "first"
//! items = [{ title = "Problem definition", max_score = 10 }]
//!
//! [[windows]]
//! department = "CSE"
//! batch = "2021-2025"
//! review_type = "first"
//! start_date = "2025-03-01"
//! end_date = "2025-03-31"
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use spm_common::db::ReviewType;
use spm_common::review::validate_window_bounds;
use spm_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::users::{FacultyRoles, NewUser};
use crate::db::{org, reviews, rubrics, users};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub departments: Vec<DepartmentEntry>,
    #[serde(default)]
    pub batches: Vec<BatchEntry>,
    #[serde(default)]
    pub sections: Vec<SectionEntry>,
    #[serde(default)]
    pub students: Vec<StudentEntry>,
    #[serde(default)]
    pub faculty: Vec<FacultyEntry>,
    #[serde(default)]
    pub rubrics: Vec<RubricEntry>,
    #[serde(default)]
    pub windows: Vec<WindowEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentEntry {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchEntry {
    pub name: String,
    pub year: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionEntry {
    pub name: String,
    pub department: String,
    pub batch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentEntry {
    pub roll_number: String,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    pub department: String,
    pub batch: String,
    pub section: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacultyEntry {
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub is_superuser: bool,
    /// Section advised, within `advisor_batch` of the faculty's department
    #[serde(default)]
    pub advisor_section: Option<String>,
    #[serde(default)]
    pub advisor_batch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RubricEntry {
    pub name: String,
    pub review_type: ReviewType,
    #[serde(default)]
    pub items: Vec<RubricItemEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RubricItemEntry {
    pub title: String,
    pub max_score: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowEntry {
    pub department: String,
    pub batch: String,
    pub review_type: ReviewType,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// What an import created versus found already present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub students_created: usize,
    pub students_existing: usize,
    pub faculty_created: usize,
    pub faculty_existing: usize,
    pub rubric_items: usize,
    pub windows: usize,
}

impl Roster {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::InvalidInput(format!("Invalid roster: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn parse_roles(roles: &[String]) -> Result<FacultyRoles> {
    let mut flags = FacultyRoles::default();
    for role in roles {
        match role.trim().to_ascii_lowercase().as_str() {
            "hod" => flags.is_hod = true,
            "coordinator" => flags.is_coordinator = true,
            "supervisor" | "mentor" => flags.is_supervisor = true,
            "evaluator" => flags.is_evaluator = true,
            "advisor" => flags.is_advisor = true,
            "principal" => flags.is_principal = true,
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unknown faculty role: {}",
                    other
                )))
            }
        }
    }
    Ok(flags)
}

/// Name-to-id lookups built up while importing
#[derive(Default)]
struct Ids {
    departments: HashMap<String, i64>,
    batches: HashMap<String, i64>,
    sections: HashMap<(i64, i64, String), i64>,
}

impl Ids {
    async fn department(&mut self, pool: &SqlitePool, name: &str) -> Result<i64> {
        if let Some(id) = self.departments.get(name) {
            return Ok(*id);
        }
        let id = org::ensure_department(pool, name).await?;
        self.departments.insert(name.to_string(), id);
        Ok(id)
    }

    fn batch(&self, name: &str) -> Result<i64> {
        self.batches.get(name).copied().ok_or_else(|| {
            Error::InvalidInput(format!("Batch {} is not declared in the roster.", name))
        })
    }

    fn section(&self, department_id: i64, batch_id: i64, name: &str) -> Result<i64> {
        self.sections
            .get(&(department_id, batch_id, name.to_string()))
            .copied()
            .ok_or_else(|| {
                Error::InvalidInput(format!("Section {} is not declared in the roster.", name))
            })
    }
}

/// Import a roster into the database
pub async fn import_roster(pool: &SqlitePool, roster: &Roster) -> Result<ImportSummary> {
    let mut ids = Ids::default();
    let mut summary = ImportSummary::default();

    for department in &roster.departments {
        ids.department(pool, &department.name).await?;
    }

    for batch in &roster.batches {
        let id = org::ensure_batch(pool, &batch.name, batch.year).await?;
        ids.batches.insert(batch.name.clone(), id);
    }

    for section in &roster.sections {
        let department_id = ids.department(pool, &section.department).await?;
        let batch_id = ids.batch(&section.batch)?;
        let id = org::ensure_section(pool, &section.name, department_id, batch_id).await?;
        ids.sections
            .insert((department_id, batch_id, section.name.clone()), id);
    }

    for student in &roster.students {
        let roll = student.roll_number.trim();
        if users::student_by_roll(pool, roll).await?.is_some() {
            summary.students_existing += 1;
            continue;
        }

        let department_id = ids.department(pool, &student.department).await?;
        let batch_id = ids.batch(&student.batch)?;
        let section_id = ids.section(department_id, batch_id, &student.section)?;

        let user_id = users::create_user(
            pool,
            &NewUser {
                username: roll,
                password: &student.password,
                full_name: &student.full_name,
                email: &student.email,
                is_superuser: false,
            },
        )
        .await?;
        users::create_student(
            pool,
            user_id,
            roll,
            Some(department_id),
            Some(batch_id),
            Some(section_id),
        )
        .await?;
        debug!("Imported student {}", roll);
        summary.students_created += 1;
    }

    for member in &roster.faculty {
        let username = member.username.trim();
        if users::find_user_by_username(pool, username).await?.is_some() {
            summary.faculty_existing += 1;
            continue;
        }

        let roles = parse_roles(&member.roles)?;
        let department_id = match &member.department {
            Some(name) => Some(ids.department(pool, name).await?),
            None => None,
        };
        let advisor_section_id = match (&member.advisor_section, &member.advisor_batch, department_id) {
            (Some(section), Some(batch), Some(department_id)) => {
                Some(ids.section(department_id, ids.batch(batch)?, section)?)
            }
            (None, _, _) => None,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Advisor section for {} needs advisor_batch and department.",
                    username
                )))
            }
        };

        let user_id = users::create_user(
            pool,
            &NewUser {
                username,
                password: &member.password,
                full_name: &member.full_name,
                email: &member.email,
                is_superuser: member.is_superuser,
            },
        )
        .await?;
        users::create_faculty(pool, user_id, department_id, roles, advisor_section_id).await?;
        debug!("Imported faculty {}", username);
        summary.faculty_created += 1;
    }

    for rubric in &roster.rubrics {
        let template_id = rubrics::ensure_template(pool, &rubric.name, rubric.review_type).await?;
        for (index, item) in rubric.items.iter().enumerate() {
            if item.max_score < 0 {
                return Err(Error::InvalidInput(format!(
                    "Rubric item {} has a negative maximum.",
                    item.title
                )));
            }
            rubrics::upsert_item(pool, template_id, index as i64 + 1, &item.title, item.max_score)
                .await?;
            summary.rubric_items += 1;
        }
    }

    for window in &roster.windows {
        validate_window_bounds(window.start_date, window.end_date)?;
        let department_id = ids.department(pool, &window.department).await?;
        let batch_id = ids.batch(&window.batch)?;
        reviews::upsert_window(
            pool,
            department_id,
            batch_id,
            window.review_type,
            window.start_date,
            window.end_date,
        )
        .await?;
        summary.windows += 1;
    }

    info!(
        "Roster import: {} students created ({} existing), {} faculty created ({} existing)",
        summary.students_created,
        summary.students_existing,
        summary.faculty_created,
        summary.faculty_existing
    );

    Ok(summary)
}
