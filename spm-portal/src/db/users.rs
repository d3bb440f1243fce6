//! Users and student/faculty profiles

use spm_common::auth::{generate_salt, hash_password};
use spm_common::db::{FacultyProfile, StudentProfile, User};
use spm_common::time;
use spm_common::Result;
use sqlx::SqlitePool;

const STUDENT_SELECT: &str = r#"
    SELECT s.id, s.user_id, s.roll_number, u.full_name,
           s.department_id, s.batch_id, s.class_section_id, s.created_at
    FROM student_profiles s
    JOIN users u ON u.id = s.user_id
"#;

const FACULTY_SELECT: &str = r#"
    SELECT f.id, f.user_id, u.full_name, f.department_id,
           f.is_hod, f.is_coordinator, f.is_supervisor, f.is_evaluator,
           f.is_advisor, f.is_principal, f.advisor_section_id,
           f.freeze_count, f.unfreeze_count, f.created_at
    FROM faculty_profiles f
    JOIN users u ON u.id = f.user_id
"#;

/// Account details for a new user
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    pub email: &'a str,
    pub is_superuser: bool,
}

/// Role flags for a new faculty profile
#[derive(Debug, Clone, Copy, Default)]
pub struct FacultyRoles {
    pub is_hod: bool,
    pub is_coordinator: bool,
    pub is_supervisor: bool,
    pub is_evaluator: bool,
    pub is_advisor: bool,
    pub is_principal: bool,
}

/// Create a user with a freshly salted password hash
pub async fn create_user(pool: &SqlitePool, new_user: &NewUser<'_>) -> Result<i64> {
    let salt = generate_salt();
    let hash = hash_password(new_user.password, &salt);

    let id = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, password_salt, full_name, email, is_superuser, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(new_user.username)
    .bind(&hash)
    .bind(&salt)
    .bind(new_user.full_name)
    .bind(new_user.email)
    .bind(new_user.is_superuser)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

// ========================================
// Students
// ========================================

pub async fn create_student(
    pool: &SqlitePool,
    user_id: i64,
    roll_number: &str,
    department_id: Option<i64>,
    batch_id: Option<i64>,
    class_section_id: Option<i64>,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO student_profiles (user_id, roll_number, department_id, batch_id, class_section_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(roll_number)
    .bind(department_id)
    .bind(batch_id)
    .bind(class_section_id)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn student_by_user(pool: &SqlitePool, user_id: i64) -> Result<Option<StudentProfile>> {
    let sql = format!("{} WHERE s.user_id = ?", STUDENT_SELECT);
    let student = sqlx::query_as::<_, StudentProfile>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(student)
}

pub async fn student_by_id(pool: &SqlitePool, id: i64) -> Result<Option<StudentProfile>> {
    let sql = format!("{} WHERE s.id = ?", STUDENT_SELECT);
    let student = sqlx::query_as::<_, StudentProfile>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(student)
}

pub async fn student_by_roll(pool: &SqlitePool, roll_number: &str) -> Result<Option<StudentProfile>> {
    let sql = format!("{} WHERE s.roll_number = ?", STUDENT_SELECT);
    let student = sqlx::query_as::<_, StudentProfile>(&sql)
        .bind(roll_number.trim())
        .fetch_optional(pool)
        .await?;
    Ok(student)
}

pub async fn students_in_department(
    pool: &SqlitePool,
    department_id: i64,
) -> Result<Vec<StudentProfile>> {
    let sql = format!(
        "{} WHERE s.department_id = ? ORDER BY s.class_section_id, s.roll_number",
        STUDENT_SELECT
    );
    let students = sqlx::query_as::<_, StudentProfile>(&sql)
        .bind(department_id)
        .fetch_all(pool)
        .await?;
    Ok(students)
}

pub async fn students_in_section(
    pool: &SqlitePool,
    class_section_id: i64,
) -> Result<Vec<StudentProfile>> {
    let sql = format!(
        "{} WHERE s.class_section_id = ? ORDER BY s.roll_number",
        STUDENT_SELECT
    );
    let students = sqlx::query_as::<_, StudentProfile>(&sql)
        .bind(class_section_id)
        .fetch_all(pool)
        .await?;
    Ok(students)
}

// ========================================
// Faculty
// ========================================

pub async fn create_faculty(
    pool: &SqlitePool,
    user_id: i64,
    department_id: Option<i64>,
    roles: FacultyRoles,
    advisor_section_id: Option<i64>,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO faculty_profiles (
            user_id, department_id, is_hod, is_coordinator, is_supervisor,
            is_evaluator, is_advisor, is_principal, advisor_section_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(department_id)
    .bind(roles.is_hod)
    .bind(roles.is_coordinator)
    .bind(roles.is_supervisor)
    .bind(roles.is_evaluator)
    .bind(roles.is_advisor)
    .bind(roles.is_principal)
    .bind(advisor_section_id)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn faculty_by_user(pool: &SqlitePool, user_id: i64) -> Result<Option<FacultyProfile>> {
    let sql = format!("{} WHERE f.user_id = ?", FACULTY_SELECT);
    let faculty = sqlx::query_as::<_, FacultyProfile>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(faculty)
}

pub async fn faculty_by_id(pool: &SqlitePool, id: i64) -> Result<Option<FacultyProfile>> {
    let sql = format!("{} WHERE f.id = ?", FACULTY_SELECT);
    let faculty = sqlx::query_as::<_, FacultyProfile>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(faculty)
}

pub async fn faculty_in_department(
    pool: &SqlitePool,
    department_id: i64,
) -> Result<Vec<FacultyProfile>> {
    let sql = format!(
        "{} WHERE f.department_id = ? ORDER BY u.username",
        FACULTY_SELECT
    );
    let staff = sqlx::query_as::<_, FacultyProfile>(&sql)
        .bind(department_id)
        .fetch_all(pool)
        .await?;
    Ok(staff)
}
