//! Teams and membership

use serde::Serialize;
use spm_common::db::{ProposalStatus, StudentProfile, Team};
use spm_common::time;
use spm_common::Result;
use sqlx::{FromRow, SqlitePool};

const LISTING_SELECT: &str = r#"
    SELECT t.*,
           (SELECT COUNT(*) FROM team_members m WHERE m.team_id = t.id) AS member_count,
           p.status AS proposal_status
    FROM teams t
    LEFT JOIN project_proposals p ON p.team_id = t.id
"#;

/// Team row with its size and proposal status for dashboards
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub team: Team,
    pub member_count: i64,
    pub proposal_status: Option<ProposalStatus>,
}

/// A team to be created with its leader and any members named up front
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub department_id: i64,
    pub batch_id: i64,
    pub class_section_id: i64,
    pub leader_id: i64,
    pub member_ids: Vec<i64>,
}

/// Create a team and its membership rows in one transaction
pub async fn create_team(pool: &SqlitePool, new_team: &NewTeam) -> Result<Team> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    let team_id = sqlx::query(
        r#"
        INSERT INTO teams (name, department_id, batch_id, class_section_id, leader_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new_team.name)
    .bind(new_team.department_id)
    .bind(new_team.batch_id)
    .bind(new_team.class_section_id)
    .bind(new_team.leader_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for student_id in std::iter::once(new_team.leader_id).chain(new_team.member_ids.iter().copied()) {
        sqlx::query("INSERT INTO team_members (team_id, student_id, joined_at) VALUES (?, ?, ?)")
            .bind(team_id)
            .bind(student_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }

    // Everyone now in the team drops their outstanding invitations
    for student_id in std::iter::once(&new_team.leader_id).chain(&new_team.member_ids) {
        sqlx::query(
            "UPDATE invitations SET status = 'expired', responded_at = ? WHERE to_student_id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;
    }

    let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(team)
}

pub async fn get_team(pool: &SqlitePool, id: i64) -> Result<Option<Team>> {
    let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(team)
}

/// The team a student belongs to, as leader or member
pub async fn team_for_student(pool: &SqlitePool, student_id: i64) -> Result<Option<Team>> {
    let team = sqlx::query_as::<_, Team>(
        r#"
        SELECT t.* FROM teams t
        JOIN team_members m ON m.team_id = t.id
        WHERE m.student_id = ?
        "#,
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(team)
}

pub async fn is_in_team(pool: &SqlitePool, student_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM team_members WHERE student_id = ?")
        .bind(student_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn is_member(pool: &SqlitePool, team_id: i64, student_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM team_members WHERE team_id = ? AND student_id = ?",
    )
    .bind(team_id)
    .bind(student_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn member_count(pool: &SqlitePool, team_id: i64) -> Result<usize> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM team_members WHERE team_id = ?")
        .bind(team_id)
        .fetch_one(pool)
        .await?;
    Ok(count as usize)
}

/// Members of a team, leader first
pub async fn members(pool: &SqlitePool, team_id: i64) -> Result<Vec<StudentProfile>> {
    let members = sqlx::query_as::<_, StudentProfile>(
        r#"
        SELECT s.id, s.user_id, s.roll_number, u.full_name,
               s.department_id, s.batch_id, s.class_section_id, s.created_at
        FROM team_members m
        JOIN teams t ON t.id = m.team_id
        JOIN student_profiles s ON s.id = m.student_id
        JOIN users u ON u.id = s.user_id
        WHERE m.team_id = ?
        ORDER BY (s.id = t.leader_id) DESC, s.roll_number
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok(members)
}

pub async fn teams_mentored_by(pool: &SqlitePool, faculty_id: i64) -> Result<Vec<Team>> {
    let teams = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE mentor_id = ? ORDER BY name")
        .bind(faculty_id)
        .fetch_all(pool)
        .await?;
    Ok(teams)
}

pub async fn set_mentor(pool: &SqlitePool, team_id: i64, mentor_id: Option<i64>) -> Result<()> {
    sqlx::query("UPDATE teams SET mentor_id = ?, updated_at = ? WHERE id = ?")
        .bind(mentor_id)
        .bind(time::now())
        .bind(team_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn listings_for_department(pool: &SqlitePool, department_id: i64) -> Result<Vec<TeamListing>> {
    let sql = format!(
        "{} WHERE t.department_id = ? ORDER BY t.class_section_id, t.name",
        LISTING_SELECT
    );
    let listings = sqlx::query_as::<_, TeamListing>(&sql)
        .bind(department_id)
        .fetch_all(pool)
        .await?;
    Ok(listings)
}

pub async fn all_listings(pool: &SqlitePool) -> Result<Vec<TeamListing>> {
    let sql = format!("{} ORDER BY t.department_id, t.name", LISTING_SELECT);
    let listings = sqlx::query_as::<_, TeamListing>(&sql).fetch_all(pool).await?;
    Ok(listings)
}
