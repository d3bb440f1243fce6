//! HTTP API tests: login, team formation, invitations and proposals

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use spm_portal::db::{sessions, users};

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "spm-portal");
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send("GET", "/api/student/dashboard", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Please log in.");

    let (status, body) = app
        .send("GET", "/api/student/dashboard", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Session expired or invalid.");
}

#[tokio::test]
async fn test_expired_session_rejected_and_purged() {
    let app = TestApp::new().await;
    let user_id = users::student_by_roll(&app.pool, "21CS001")
        .await
        .unwrap()
        .unwrap()
        .user_id;

    let expired = sessions::create_session(&app.pool, user_id, chrono::Duration::hours(-1))
        .await
        .unwrap();
    let (status, body) = app.get("/api/student/dashboard", &expired.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Session expired or invalid.");

    let live = app.login_student("21CS001").await;
    assert_eq!(sessions::purge_expired(&app.pool).await.unwrap(), 1);
    assert_eq!(sessions::purge_expired(&app.pool).await.unwrap(), 0);

    let (status, _) = app.get("/api/student/dashboard", &live).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_inactive_users_cannot_log_in() {
    let app = TestApp::new().await;
    sqlx::query("UPDATE users SET is_active = 0 WHERE username IN ('21CS004', 'eval2.cse')")
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "login_type": "student",
                "roll_number": "21CS004",
                "password": common::PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid roll number or password.");

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "login_type": "faculty",
                "username": "eval2.cse",
                "password": common::PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid username or password.");
}

#[tokio::test]
async fn test_student_login_errors() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "login_type": "student",
                "roll_number": "21CS001",
                "password": "wrong",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid roll number or password.");

    // A faculty username is not a roll number
    let (status, _) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "login_type": "student",
                "roll_number": "hod.cse",
                "password": "secret",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_faculty_login_routes_to_role_dashboard() {
    let app = TestApp::new().await;

    for (username, role) in [
        ("hod.cse", "hod"),
        ("coord.cse", "coordinator"),
        ("mentor.cse", "faculty"),
        ("principal", "principal"),
    ] {
        let (status, body) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({
                    "login_type": "faculty",
                    "username": username,
                    "password": "secret",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], role);
        assert_eq!(body["dashboard"], format!("/api/{}/dashboard", role));
    }

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "login_type": "faculty",
                "username": "hod.cse",
                "password": "nope",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid username or password.");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new().await;
    let token = app.login_student("21CS001").await;

    let (status, body) = app.get("/api/dashboard", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "student");
    assert_eq!(body["full_name"], "Asha Rao");

    let (status, _) = app.post("/api/auth/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/dashboard", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_guards() {
    let app = TestApp::new().await;
    let student = app.login_student("21CS001").await;
    let mentor = app.login_faculty("mentor.cse").await;

    let (status, body) = app.get("/api/hod/dashboard", &student).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Faculty profile not found.");

    let (status, body) = app.get("/api/hod/dashboard", &mentor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "You are not marked as HOD.");

    let (status, body) = app.get("/api/student/dashboard", &mentor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "You are not a student.");

    let (status, _) = app.get("/api/principal/dashboard", &mentor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Teams
// ============================================================================

#[tokio::test]
async fn test_create_team_with_members() {
    let app = TestApp::new().await;
    let token = app.login_student("21CS001").await;

    let (status, body) = app
        .post(
            "/api/student/team",
            &token,
            json!({ "name": "  Falcons  ", "member_rolls": ["21CS002", "21CS003"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["team"]["team"]["name"], "Falcons");

    let members = body["team"]["members"].as_array().unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[0]["roll_number"], "21CS001", "leader is listed first");

    let (status, body) = app.get("/api/student/dashboard", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_leader"], true);

    // A member sees the team but is not leader
    let member = app.login_student("21CS002").await;
    let (_, body) = app.get("/api/student/dashboard", &member).await;
    assert_eq!(body["team"]["team"]["name"], "Falcons");
    assert_eq!(body["is_leader"], false);
}

#[tokio::test]
async fn test_create_team_rules() {
    let app = TestApp::new().await;
    let token = app.login_student("21CS001").await;

    // Members at creation must share the class section
    let (status, body) = app
        .post(
            "/api/student/team",
            &token,
            json!({ "name": "Mixed", "member_rolls": ["21CS010"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "21CS010 is not in your class section.");

    // Leader plus four would exceed the maximum of four
    let (status, body) = app
        .post(
            "/api/student/team",
            &token,
            json!({
                "name": "Crowd",
                "member_rolls": ["21CS002", "21CS003", "21CS004", "21CS005"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Team cannot have more than 4 members.");

    let (status, body) = app
        .post("/api/student/team", &token, json!({ "name": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Team name is required.");

    app.create_team("21CS001", "Falcons", &[]).await;
    let (status, body) = app
        .post("/api/student/team", &token, json!({ "name": "Second" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "You are already part of a team.");

    // Already-teamed students cannot be named by another leader
    let other = app.login_student("21CS002").await;
    let (status, body) = app
        .post(
            "/api/student/team",
            &other,
            json!({ "name": "Hawks", "member_rolls": ["21CS001"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "21CS001 is already part of a team.");
}

#[tokio::test]
async fn test_team_name_unique_within_section() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &[]).await;

    let same_section = app.login_student("21CS002").await;
    let (status, _) = app
        .post("/api/student/team", &same_section, json!({ "name": "Falcons" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Another section may reuse the name
    let other_section = app.login_student("21CS010").await;
    let (status, _) = app
        .post("/api/student/team", &other_section, json!({ "name": "Falcons" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

// ============================================================================
// Invitations
// ============================================================================

#[tokio::test]
async fn test_invite_rules() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &[]).await;
    let leader = app.login_student("21CS001").await;

    // Another section of the same batch is fine
    let (status, body) = app
        .post("/api/student/invitations", &leader, json!({ "roll_number": "21CS010" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["invitation"]["status"], "pending");

    let (status, body) = app
        .post("/api/student/invitations", &leader, json!({ "roll_number": "21CS010" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"]["message"],
        "You already sent an invitation to this student."
    );

    let (status, body) = app
        .post("/api/student/invitations", &leader, json!({ "roll_number": "21CS001" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "You cannot invite yourself.");

    // Other batch and other department both read as not found
    for roll in ["22CS001", "21EC001", "99XX999"] {
        let (status, body) = app
            .post("/api/student/invitations", &leader, json!({ "roll_number": roll }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "roll {}", roll);
        assert_eq!(
            body["error"]["message"],
            "Student with that roll was not found in your batch."
        );
    }

    // Only leaders invite
    let student = app.login_student("21CS002").await;
    let (status, body) = app
        .post("/api/student/invitations", &student, json!({ "roll_number": "21CS003" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "You are not part of a team.");
}

#[tokio::test]
async fn test_invite_member_of_another_team_is_refused() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &[]).await;
    app.create_team("21CS002", "Hawks", &[]).await;
    let leader = app.login_student("21CS001").await;

    let (status, body) = app
        .post("/api/student/invitations", &leader, json!({ "roll_number": "21CS002" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "This student is already part of a team.");
}

#[tokio::test]
async fn test_accept_expires_other_invitations() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &[]).await;
    app.create_team("21CS002", "Hawks", &[]).await;

    let falcons = app.login_student("21CS001").await;
    let hawks = app.login_student("21CS002").await;

    let (_, body) = app
        .post("/api/student/invitations", &falcons, json!({ "roll_number": "21CS003" }))
        .await;
    let falcons_invite = body["invitation"]["id"].as_i64().unwrap();
    let (_, body) = app
        .post("/api/student/invitations", &hawks, json!({ "roll_number": "21CS003" }))
        .await;
    let hawks_invite = body["invitation"]["id"].as_i64().unwrap();

    let invitee = app.login_student("21CS003").await;

    // Not addressed to this student
    let (status, _) = app
        .post(
            &format!("/api/student/invitations/{}/accept", falcons_invite),
            &falcons,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/api/student/invitations/{}/accept", falcons_invite),
            &invitee,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invitation"]["status"], "accepted");

    let (_, body) = app.get("/api/student/dashboard", &invitee).await;
    assert_eq!(body["team"]["team"]["name"], "Falcons");
    let received = body["received_invitations"].as_array().unwrap();
    let hawks_row = received
        .iter()
        .find(|i| i["id"].as_i64() == Some(hawks_invite))
        .unwrap();
    assert_eq!(hawks_row["status"], "expired");

    let (status, body) = app
        .post(
            &format!("/api/student/invitations/{}/accept", hawks_invite),
            &invitee,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "This invitation is already processed.");
}

#[tokio::test]
async fn test_reject_and_unknown_action() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &[]).await;
    let leader = app.login_student("21CS001").await;

    let (_, body) = app
        .post("/api/student/invitations", &leader, json!({ "roll_number": "21CS004" }))
        .await;
    let invite_id = body["invitation"]["id"].as_i64().unwrap();
    let invitee = app.login_student("21CS004").await;

    let (status, _) = app
        .post(
            &format!("/api/student/invitations/{}/maybe", invite_id),
            &invitee,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &format!("/api/student/invitations/{}/reject", invite_id),
            &invitee,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invitation"]["status"], "rejected");

    let (status, _) = app
        .post(
            &format!("/api/student/invitations/{}/reject", invite_id),
            &invitee,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_accept_into_full_team_is_refused() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &["21CS002", "21CS003"]).await;
    let leader = app.login_student("21CS001").await;

    let mut invites = Vec::new();
    for roll in ["21CS004", "21CS005"] {
        let (status, body) = app
            .post("/api/student/invitations", &leader, json!({ "roll_number": roll }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        invites.push(body["invitation"]["id"].as_i64().unwrap());
    }

    let first = app.login_student("21CS004").await;
    let (status, _) = app
        .post(
            &format!("/api/student/invitations/{}/accept", invites[0]),
            &first,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let second = app.login_student("21CS005").await;
    let (status, body) = app
        .post(
            &format!("/api/student/invitations/{}/accept", invites[1]),
            &second,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Team cannot have more than 4 members.");

    // The full team cannot send more invitations either
    let (status, _) = app
        .post("/api/student/invitations", &leader, json!({ "roll_number": "21CS010" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ============================================================================
// Proposals
// ============================================================================

#[tokio::test]
async fn test_proposal_needs_three_members_and_leader() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &["21CS002"]).await;
    let leader = app.login_student("21CS001").await;

    let proposal = json!({ "title": "Campus navigation", "abstract_text": "Routing." });
    let (status, body) = app.post("/api/student/proposal", &leader, proposal.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Team must have at least 3 members.");

    let member = app.login_student("21CS002").await;
    let (status, body) = app.post("/api/student/proposal", &member, proposal).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"]["message"],
        "Only the team leader can submit the proposal."
    );
}

#[tokio::test]
async fn test_preferred_mentor_must_be_supervisor_in_department() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &["21CS002", "21CS003"]).await;
    let leader = app.login_student("21CS001").await;

    for username in ["eval1.cse", "hod.ece"] {
        let faculty_id = app.faculty_id(username).await;
        let (status, body) = app
            .post(
                "/api/student/proposal",
                &leader,
                json!({
                    "title": "Campus navigation",
                    "abstract_text": "Routing.",
                    "preferred_mentor_id": faculty_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", username);
        assert_eq!(
            body["error"]["message"],
            "Preferred mentor must be a supervisor in your department."
        );
    }
}

#[tokio::test]
async fn test_proposal_decision_flow() {
    let app = TestApp::new().await;
    let team_id = app
        .create_team("21CS001", "Falcons", &["21CS002", "21CS003"])
        .await;
    let mentor_id = app.faculty_id("mentor.cse").await;
    let leader = app.login_student("21CS001").await;

    let (status, body) = app
        .post(
            "/api/student/proposal",
            &leader,
            json!({
                "title": "Campus navigation",
                "abstract_text": "Indoor routing.",
                "preferred_mentor_id": mentor_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["proposal"]["status"], "pending");
    let proposal_id = body["proposal"]["id"].as_i64().unwrap();

    let coordinator = app.login_faculty("coord.cse").await;

    let (_, listings) = app
        .get("/api/coordinator/proposals?status=pending&q=campus", &coordinator)
        .await;
    let listings = listings.as_array().unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0]["team_name"], "Falcons");

    // Wildcard characters in the search text match only themselves
    for query in ["%25", "_", "c%25n"] {
        let (status, listings) = app
            .get(&format!("/api/coordinator/proposals?q={}", query), &coordinator)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(listings.as_array().unwrap().is_empty(), "q={} matched", query);
    }

    let (status, _) = app
        .get("/api/coordinator/proposals?status=bogus", &coordinator)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Request a revision, then resubmit
    let (status, body) = app
        .post(
            &format!("/api/coordinator/proposals/{}/decision", proposal_id),
            &coordinator,
            json!({ "status": "revision", "comment": "Narrow the scope." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["proposal"]["status"], "revision");
    assert_eq!(body["proposal"]["reviewer_comment"], "Narrow the scope.");

    let (status, body) = app
        .post(
            "/api/student/proposal",
            &leader,
            json!({
                "title": "Campus navigation v2",
                "abstract_text": "Indoor routing for one block.",
                "preferred_mentor_id": mentor_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["proposal"]["id"].as_i64(), Some(proposal_id));
    assert_eq!(body["proposal"]["status"], "pending");
    assert_eq!(body["proposal"]["reviewer_comment"], "");

    // Approval assigns the preferred mentor
    let (status, _) = app
        .post(
            &format!("/api/coordinator/proposals/{}/decision", proposal_id),
            &coordinator,
            json!({ "status": "approved" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/teams/{}", team_id), &leader).await;
    assert_eq!(body["team"]["mentor_id"].as_i64(), Some(mentor_id));
    assert_eq!(body["mentor"]["full_name"], "Dr. Krishnan");

    // Approved proposals are final
    let (status, body) = app
        .post(
            "/api/student/proposal",
            &leader,
            json!({ "title": "Another", "abstract_text": "Idea." }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"]["message"],
        "This proposal is approved and can no longer be changed."
    );

    // The mentor now sees the team
    let mentor = app.login_faculty("mentor.cse").await;
    let (_, body) = app.get("/api/supervisor/dashboard", &mentor).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["team"]["name"], "Falcons");
}

#[tokio::test]
async fn test_pending_is_not_a_decision_and_departments_are_scoped() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &["21CS002", "21CS003"]).await;
    let leader = app.login_student("21CS001").await;
    let (_, body) = app
        .post(
            "/api/student/proposal",
            &leader,
            json!({ "title": "Campus navigation", "abstract_text": "Routing." }),
        )
        .await;
    let proposal_id = body["proposal"]["id"].as_i64().unwrap();

    let hod = app.login_faculty("hod.cse").await;
    let (status, _) = app
        .post(
            &format!("/api/hod/proposals/{}/decision", proposal_id),
            &hod,
            json!({ "status": "pending" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let other_hod = app.login_faculty("hod.ece").await;
    let (status, body) = app
        .get(&format!("/api/hod/proposals/{}", proposal_id), &other_hod)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "This proposal is not in your department.");

    let (status, body) = app
        .post(
            &format!("/api/hod/proposals/{}/decision", proposal_id),
            &hod,
            json!({ "status": "rejected", "comment": "Out of scope." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["proposal"]["status"], "rejected");
}

#[tokio::test]
async fn test_proposal_document_versions() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &["21CS002", "21CS003"]).await;
    let leader = app.login_student("21CS001").await;

    let (status, body) = app
        .upload("/api/student/proposal/documents", &leader, "draft.pdf", b"%PDF-1.4")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Submit the proposal before uploading documents."
    );

    app.post(
        "/api/student/proposal",
        &leader,
        json!({ "title": "Campus navigation", "abstract_text": "Routing." }),
    )
    .await;

    let (status, body) = app
        .upload("/api/student/proposal/documents", &leader, "notes.txt", b"hello")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Only PDF files are accepted.");

    let (status, body) = app
        .upload("/api/student/proposal/documents", &leader, "draft.pdf", b"%PDF-1.4 one")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["document"]["version"], 1);

    // Any member may upload a newer version
    let member = app.login_student("21CS002").await;
    let (status, body) = app
        .upload("/api/student/proposal/documents", &member, "draft.pdf", b"%PDF-1.4 two")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["document"]["version"], 2);
    let document_id = body["document"]["id"].as_i64().unwrap();
    assert!(body["document"].get("stored_path").is_none());

    let (status, content_type, data) = app
        .download(&format!("/api/documents/{}", document_id), &leader)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert_eq!(data, b"%PDF-1.4 two");

    // Students outside the team cannot download it
    let outsider = app.login_student("21CS004").await;
    let (status, _, _) = app
        .download(&format!("/api/documents/{}", document_id), &outsider)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.get("/api/student/proposal", &leader).await;
    let documents = body["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["version"], 2, "newest first");
}

#[tokio::test]
async fn test_failed_document_insert_removes_stored_file() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &["21CS002", "21CS003"]).await;
    let leader = app.login_student("21CS001").await;
    app.post(
        "/api/student/proposal",
        &leader,
        json!({ "title": "Campus navigation", "abstract_text": "Routing." }),
    )
    .await;

    sqlx::query("DROP TABLE proposal_documents")
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, _) = app
        .upload("/api/student/proposal/documents", &leader, "plan.pdf", b"%PDF-1.4")
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let folder = app.dir.path().join("media").join("proposals");
    let leftovers = match std::fs::read_dir(&folder) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_upload_limit() {
    let app = TestApp::with_upload_limit(16).await;
    app.create_team("21CS001", "Falcons", &["21CS002", "21CS003"]).await;
    let leader = app.login_student("21CS001").await;
    app.post(
        "/api/student/proposal",
        &leader,
        json!({ "title": "Campus navigation", "abstract_text": "Routing." }),
    )
    .await;

    let (status, _) = app
        .upload(
            "/api/student/proposal/documents",
            &leader,
            "big.pdf",
            &[b'x'; 64],
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    // Past the route's body limit the multipart stream itself is cut off
    let (status, body) = app
        .upload(
            "/api/student/proposal/documents",
            &leader,
            "big.pdf",
            &vec![b'x'; 200 * 1024],
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

// ============================================================================
// Dashboards
// ============================================================================

#[tokio::test]
async fn test_department_dashboards() {
    let app = TestApp::new().await;
    let team_id = app.approved_team().await;
    app.create_team("21EC001", "Sparks", &[]).await;

    let hod = app.login_faculty("hod.cse").await;
    let (status, body) = app.get("/api/hod/dashboard", &hod).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["department"]["name"], "CSE");
    assert_eq!(body["counts"]["teams"], 1);
    assert_eq!(body["teams"][0]["id"].as_i64(), Some(team_id));
    assert_eq!(body["teams"][0]["member_count"], 3);
    assert_eq!(body["teams"][0]["proposal_status"], "approved");
    assert!(body["faculty"].as_array().unwrap().len() >= 6);

    let principal = app.login_faculty("principal").await;
    let (status, body) = app.get("/api/principal/dashboard", &principal).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["teams"].as_array().unwrap().len(), 2);

    // Principal may open any team
    let (status, _) = app.get(&format!("/api/teams/{}", team_id), &principal).await;
    assert_eq!(status, StatusCode::OK);

    let other_hod = app.login_faculty("hod.ece").await;
    let (status, _) = app.get(&format!("/api/teams/{}", team_id), &other_hod).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_advisor_sees_section_students() {
    let app = TestApp::new().await;
    app.create_team("21CS001", "Falcons", &["21CS002"]).await;

    let advisor = app.login_faculty("advisor.cse").await;
    let (status, body) = app.get("/api/advisor/dashboard", &advisor).await;
    assert_eq!(status, StatusCode::OK);

    let students = body.as_array().unwrap();
    assert_eq!(students.len(), 5, "section A of CSE 2021-2025");
    let asha = students
        .iter()
        .find(|s| s["student"]["roll_number"] == "21CS001")
        .unwrap();
    assert_eq!(asha["team_name"], "Falcons");
    let dev = students
        .iter()
        .find(|s| s["student"]["roll_number"] == "21CS004")
        .unwrap();
    assert!(dev["team_id"].is_null());
}
