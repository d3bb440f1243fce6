//! Shared fixture for portal integration tests
//!
//! Each `TestApp` owns a temporary root folder with a fresh database seeded
//! from `ROSTER`, and drives the router with `oneshot` requests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use spm_portal::db::{self, users};
use spm_portal::media::MediaStore;
use spm_portal::roster::{import_roster, Roster};
use spm_portal::{build_router, AppState};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "secret";

/// Two departments, two batches; CSE 2021-2025 has sections A and B
pub const ROSTER: &str = r#"
[[departments]]
name = "CSE"

[[departments]]
name = "ECE"

[[batches]]
name = "2021-2025"
year = 2025

[[batches]]
name = "2022-2026"
year = 2026

[[sections]]
name = "A"
department = "CSE"
batch = "2021-2025"

[[sections]]
name = "B"
department = "CSE"
batch = "2021-2025"

[[sections]]
name = "A"
department = "ECE"
batch = "2021-2025"

[[sections]]
name = "A"
department = "CSE"
batch = "2022-2026"

[[students]]
roll_number = "21CS001"
full_name = "Asha Rao"
password = "secret"
department = "CSE"
batch = "2021-2025"
section = "A"

[[students]]
roll_number = "21CS002"
full_name = "Bala Kumar"
password = "secret"
department = "CSE"
batch = "2021-2025"
section = "A"

[[students]]
roll_number = "21CS003"
full_name = "Chitra Nair"
password = "secret"
department = "CSE"
batch = "2021-2025"
section = "A"

[[students]]
roll_number = "21CS004"
full_name = "Dev Menon"
password = "secret"
department = "CSE"
batch = "2021-2025"
section = "A"

[[students]]
roll_number = "21CS005"
full_name = "Esha Pillai"
password = "secret"
department = "CSE"
batch = "2021-2025"
section = "A"

[[students]]
roll_number = "21CS010"
full_name = "Farah Khan"
password = "secret"
department = "CSE"
batch = "2021-2025"
section = "B"

[[students]]
roll_number = "21EC001"
full_name = "Gopal Das"
password = "secret"
department = "ECE"
batch = "2021-2025"
section = "A"

[[students]]
roll_number = "22CS001"
full_name = "Hema Iyer"
password = "secret"
department = "CSE"
batch = "2022-2026"
section = "A"

[[faculty]]
username = "hod.cse"
full_name = "Dr. Iyer"
password = "secret"
department = "CSE"
roles = ["hod"]

[[faculty]]
username = "coord.cse"
full_name = "Dr. Joseph"
password = "secret"
department = "CSE"
roles = ["coordinator"]

[[faculty]]
username = "mentor.cse"
full_name = "Dr. Krishnan"
password = "secret"
department = "CSE"
roles = ["supervisor"]

[[faculty]]
username = "eval1.cse"
full_name = "Dr. Lakshmi"
password = "secret"
department = "CSE"
roles = ["evaluator"]

[[faculty]]
username = "eval2.cse"
full_name = "Dr. Mohan"
password = "secret"
department = "CSE"
roles = ["evaluator"]

[[faculty]]
username = "advisor.cse"
full_name = "Dr. Nisha"
password = "secret"
department = "CSE"
roles = ["advisor"]
advisor_section = "A"
advisor_batch = "2021-2025"

[[faculty]]
username = "principal"
full_name = "Dr. Prakash"
password = "secret"
roles = ["principal"]

[[faculty]]
username = "hod.ece"
full_name = "Dr. Rajan"
password = "secret"
department = "ECE"
roles = ["hod"]

[[faculty]]
username = "eval.ece"
full_name = "Dr. Sunita"
password = "secret"
department = "ECE"
roles = ["evaluator"]

[[faculty]]
username = "nobody"
full_name = "No Roles"
password = "secret"
department = "CSE"

[[rubrics]]
name = "Review 1"
review_type = "first"
items = [
    { title = "Problem definition", max_score = 10 },
    { title = "Design", max_score = 20 },
]

[[rubrics]]
name = "Zeroth review"
review_type = "zeroth"
items = [{ title = "Idea", max_score = 10 }]
"#;

pub struct TestApp {
    pub pool: SqlitePool,
    pub router: Router,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_upload_limit(1024 * 1024).await
    }

    pub async fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let pool = db::init_database(&dir.path().join("spm.db")).await.unwrap();

        let roster = Roster::from_toml_str(ROSTER).unwrap();
        import_roster(&pool, &roster).await.unwrap();

        let media = MediaStore::new(dir.path().join("media"), max_upload_bytes);
        let state = AppState::new(pool.clone(), media, 12);
        let router = build_router(state);

        Self { pool, router, dir }
    }

    /// Send a request and decode the body as JSON (`Null` when it is not JSON)
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(token), Some(body)).await
    }

    /// Upload `data` as the multipart `file` field
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        file_name: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "spm-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Raw GET returning status, content type and body bytes
    pub async fn download(&self, uri: &str, token: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, bytes.to_vec())
    }

    pub async fn login_student(&self, roll_number: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({
                    "login_type": "student",
                    "roll_number": roll_number,
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {} failed: {}", roll_number, body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn login_faculty(&self, username: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({
                    "login_type": "faculty",
                    "username": username,
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {} failed: {}", username, body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn student_id(&self, roll_number: &str) -> i64 {
        users::student_by_roll(&self.pool, roll_number)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    pub async fn faculty_id(&self, username: &str) -> i64 {
        let user = users::find_user_by_username(&self.pool, username)
            .await
            .unwrap()
            .unwrap();
        users::faculty_by_user(&self.pool, user.id)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    /// Create a team led by `leader` with `members` named up front
    pub async fn create_team(&self, leader: &str, name: &str, members: &[&str]) -> i64 {
        let token = self.login_student(leader).await;
        let (status, body) = self
            .post(
                "/api/student/team",
                &token,
                json!({ "name": name, "member_rolls": members }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create team failed: {}", body);
        body["team"]["team"]["id"].as_i64().unwrap()
    }

    /// A three-member CSE team with an approved proposal mentored by
    /// `mentor.cse`; returns the team id
    pub async fn approved_team(&self) -> i64 {
        let team_id = self
            .create_team("21CS001", "Falcons", &["21CS002", "21CS003"])
            .await;
        let mentor_id = self.faculty_id("mentor.cse").await;

        let leader = self.login_student("21CS001").await;
        let (status, body) = self
            .post(
                "/api/student/proposal",
                &leader,
                json!({
                    "title": "Campus navigation",
                    "abstract_text": "Indoor routing for the main block.",
                    "preferred_mentor_id": mentor_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "submit failed: {}", body);
        let proposal_id = body["proposal"]["id"].as_i64().unwrap();

        let coordinator = self.login_faculty("coord.cse").await;
        let (status, body) = self
            .post(
                &format!("/api/coordinator/proposals/{}/decision", proposal_id),
                &coordinator,
                json!({ "status": "approved" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "approve failed: {}", body);

        team_id
    }
}
