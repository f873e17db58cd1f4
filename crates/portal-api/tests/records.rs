mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use common::{Account, TestApp};
use portal_db::LinkKind;
use portal_types::models::Role;

fn mock(name: &str, date: &str, vr: u16, dm: u16, qr: u16) -> Value {
    json!({
        "mock_name": name,
        "test_date": date,
        "verbal_reasoning": vr,
        "decision_making": dm,
        "quantitative_reasoning": qr
    })
}

#[tokio::test]
async fn ucat_scores_are_bounded_per_subtest() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let uri = format!("/students/{}/ucat", student.id);

    let (status, body) = app.post(&uri, &student, mock("Full marks", "2026-06-01", 900, 900, 900)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total"], 2700);

    let (status, body) = app.post(&uri, &student, mock("Too high", "2026-06-02", 900, 900, 901)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("quantitative reasoning"));

    let (status, _) = app.post(&uri, &student, mock("Too low", "2026-06-02", 299, 600, 600)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.get(&uri, &student).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn only_the_student_or_an_admin_edits_scores() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let parent = app.approved("pat@example.com", Role::Parent);
    let admin = app.approved("boss@example.com", Role::Admin);
    app.link(LinkKind::Guardian, &parent, &student);
    let uri = format!("/students/{}/ucat", student.id);

    let (status, _) = app.post(&uri, &parent, mock("Mock 1", "2026-05-01", 600, 600, 600)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post(&uri, &admin, mock("Mock 1", "2026-05-01", 600, 600, 600)).await;
    assert_eq!(status, StatusCode::CREATED);

    // The parent still reads them.
    let (status, list) = app.get(&uri, &parent).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bulk_save_inserts_updates_and_deletes() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let uri = format!("/students/{}/ucat", student.id);

    let (_, keep) = app.post(&uri, &student, mock("Keep", "2026-04-01", 600, 600, 600)).await;
    let (_, drop) = app.post(&uri, &student, mock("Drop", "2026-04-02", 610, 610, 610)).await;

    let mut updated = mock("Keep (retake)", "2026-04-01", 700, 700, 700);
    updated["id"] = json!({ "kind": "persisted", "value": keep["id"] });
    let mut fresh = mock("New", "2026-04-03", 650, 650, 650);
    fresh["id"] = json!({ "kind": "temporary", "value": "row-3" });
    let mut broken = mock("Broken", "2026-04-04", 950, 650, 650);
    broken["id"] = json!({ "kind": "temporary", "value": "row-4" });

    let (status, body) = app
        .request(
            Method::PUT,
            &uri,
            Some(&student.token),
            Some(json!({ "entries": [updated, fresh, broken] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let saved = body["saved"].as_array().unwrap();
    assert_eq!(saved.len(), 3);
    assert_eq!(saved[0]["persisted_id"], keep["id"]);
    assert_eq!(saved[1]["id"]["value"], "row-3");
    assert!(saved[1]["persisted_id"].is_string());
    assert_eq!(saved[2]["persisted_id"], Value::Null);
    assert!(saved[2]["error"].is_string());

    let deleted = body["deleted"].as_array().unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["persisted_id"], drop["id"]);

    let (_, list) = app.get(&uri, &student).await;
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["mock_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Keep (retake)", "New"]);
}

async fn comment(app: &TestApp, who: &Account, student: &Account, body: Value) -> (StatusCode, Value) {
    app.post(&format!("/students/{}/comments", student.id), who, body).await
}

#[tokio::test]
async fn mentor_comments_need_a_link() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let mentor = app.approved("mo@example.com", Role::Mentor);
    let outsider = app.approved("sue@example.com", Role::Mentor);
    let parent = app.approved("pat@example.com", Role::Parent);
    let admin = app.approved("boss@example.com", Role::Admin);
    app.link(LinkKind::Mentor, &mentor, &student);
    app.link(LinkKind::Guardian, &parent, &student);

    let body = json!({ "section": "ucat", "comment_type": "feedback", "body": "Work on timing." });
    let (status, created) = comment(&app, &mentor, &student, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["author_id"], mentor.id.to_string());

    assert_eq!(comment(&app, &outsider, &student, body.clone()).await.0, StatusCode::FORBIDDEN);
    assert_eq!(comment(&app, &parent, &student, body.clone()).await.0, StatusCode::FORBIDDEN);

    // Admins may write on behalf of any mentor, linked or not.
    let mut on_behalf = body.clone();
    on_behalf["author_id"] = json!(outsider.id);
    let (status, created) = comment(&app, &admin, &student, on_behalf.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["author_id"], outsider.id.to_string());

    // A mentor cannot sign as someone else.
    on_behalf["author_id"] = json!(admin.id);
    assert_eq!(comment(&app, &mentor, &student, on_behalf).await.0, StatusCode::FORBIDDEN);

    // Only the author or an admin edits.
    let id = created["id"].as_str().unwrap();
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/comments/{}", id),
            Some(&mentor.token),
            Some(json!({ "body": "Edited" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(Method::DELETE, &format!("/comments/{}", id), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn comments_are_listed_by_exact_section_and_item() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let mentor = app.approved("mo@example.com", Role::Mentor);
    app.link(LinkKind::Mentor, &mentor, &student);
    let item = uuid::Uuid::new_v4();

    comment(&app, &mentor, &student, json!({ "section": "portfolio", "comment_type": "plan", "body": "General" })).await;
    comment(
        &app,
        &mentor,
        &student,
        json!({ "section": "portfolio", "section_item_id": item, "comment_type": "suggestion", "body": "On item" }),
    )
    .await;

    let base = format!("/students/{}/comments", student.id);
    let (_, general) = app.get(&format!("{}?section=portfolio", base), &student).await;
    assert_eq!(general.as_array().unwrap().len(), 1);
    assert_eq!(general[0]["body"], "General");

    let (_, on_item) = app.get(&format!("{}?section=portfolio&item_id={}", base, item), &student).await;
    assert_eq!(on_item.as_array().unwrap().len(), 1);
    assert_eq!(on_item[0]["body"], "On item");

    let (_, other) = app.get(&format!("{}?section=ucat", base), &student).await;
    assert!(other.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_summarises_scores_and_portfolio() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let mentor = app.approved("mo@example.com", Role::Mentor);
    app.link(LinkKind::Mentor, &mentor, &student);
    let ucat = format!("/students/{}/ucat", student.id);

    // Entered out of order; the average follows test dates.
    app.post(&ucat, &student, mock("Fourth", "2026-04-01", 800, 800, 800)).await;
    app.post(&ucat, &student, mock("First", "2026-01-01", 500, 500, 500)).await;
    app.post(&ucat, &student, mock("Second", "2026-02-01", 600, 600, 600)).await;
    app.post(&ucat, &student, mock("Third", "2026-03-01", 700, 700, 700)).await;

    let portfolio = format!("/students/{}/portfolio", student.id);
    for title in ["Ward shadowing", "Care home"] {
        let (status, _) = app
            .post(&portfolio, &student, json!({ "category": "volunteering", "title": title, "hours": 12.5 }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    app.post(
        "/messages",
        &student,
        json!({ "recipient_id": mentor.id, "student_id": student.id, "body": "Can we talk about the mocks?" }),
    )
    .await;

    let (status, body) = app.get(&format!("/students/{}/dashboard", student.id), &mentor).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mock_count"], 4);
    assert_eq!(body["highest_total"], 2400);
    assert_eq!(body["recent_average"], 2100.0);
    assert_eq!(body["average_window"], 3);
    assert_eq!(body["portfolio_count"], 2);
    assert_eq!(body["portfolio_completeness"], 10.0);
    assert_eq!(body["unread_messages"], 1);
    let days = body["days_until_deadline"].as_i64().unwrap();
    assert!((0..=366).contains(&days));
}

#[tokio::test]
async fn portfolio_entries_are_validated_and_deletable() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let portfolio = format!("/students/{}/portfolio", student.id);

    let (status, _) = app
        .post(
            &portfolio,
            &student,
            json!({
                "category": "work_experience",
                "title": "GP surgery",
                "start_date": "2026-07-10",
                "end_date": "2026-07-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, activity) = app
        .post(&portfolio, &student, json!({ "category": "supracurricular", "title": "MOOC" }))
        .await;
    let uri = format!("/portfolio/{}", activity["id"].as_str().unwrap());
    let (status, _) = app.request(Method::DELETE, &uri, Some(&student.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = app.get(&portfolio, &student).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn documents_upload_list_download_and_delete() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let parent = app.approved("pat@example.com", Role::Parent);
    let stranger = app.approved("zed@example.com", Role::Parent);
    app.link(LinkKind::Guardian, &parent, &student);
    let contents = b"%PDF-1.7 personal statement".to_vec();

    let upload = Request::builder()
        .method(Method::POST)
        .uri(format!("/students/{}/documents?file_name=../statement.pdf", student.id))
        .header(header::AUTHORIZATION, format!("Bearer {}", student.token))
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from(contents.clone()))
        .unwrap();
    let (status, document) = app.send(upload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(document["file_name"], "statement.pdf");
    assert_eq!(document["size"], contents.len());
    assert_eq!(document["sha256"], hex::encode(Sha256::digest(&contents)));

    let (_, list) = app.get(&format!("/students/{}/documents", student.id), &parent).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let uri = format!("/documents/{}", document["id"].as_str().unwrap());
    let download = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", parent.token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(download).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), contents.as_slice());

    let (status, _) = app.get(&uri, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.request(Method::DELETE, &uri, Some(&parent.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request(Method::DELETE, &uri, Some(&student.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &student).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_uploads_are_refused() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let upload = Request::builder()
        .method(Method::POST)
        .uri(format!("/students/{}/documents?file_name=notes.txt", student.id))
        .header(header::AUTHORIZATION, format!("Bearer {}", student.token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(upload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uploads_past_the_axum_default_are_accepted_up_to_the_cap() {
    let app = TestApp::new().await;
    let student = app.approved("ann@example.com", Role::Student);
    let upload = |size: usize| {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/students/{}/documents?file_name=scan.pdf", student.id))
            .header(header::AUTHORIZATION, format!("Bearer {}", student.token))
            .header(header::CONTENT_TYPE, "application/pdf")
            .header(header::CONTENT_LENGTH, size)
            .body(Body::from(vec![b'x'; size]))
            .unwrap()
    };

    let (status, document) = app.send(upload(3 * 1024 * 1024)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(document["size"], 3 * 1024 * 1024);

    let (status, _) = app.send(upload(portal_api::documents::MAX_DOCUMENT_SIZE + 1)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn resources_are_managed_by_admins() {
    let app = TestApp::new().await;
    let admin = app.approved("boss@example.com", Role::Admin);
    let student = app.approved("ann@example.com", Role::Student);
    let resource = json!({ "title": "UCAT guide", "category": "UCAT", "url": "https://example.com/ucat" });

    let (status, _) = app.post("/resources", &student, resource.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/resources", &admin, resource).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post("/resources", &admin, json!({ "title": "Bad", "url": "ftp://example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.get("/resources", &student).await;
    assert_eq!(list[0]["title"], "UCAT guide");

    let uri = format!("/resources/{}", created["id"].as_str().unwrap());
    let (status, _) = app.request(Method::DELETE, &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.request(Method::DELETE, &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_email_reports_each_recipient() {
    let app = TestApp::new().await;
    let admin = app.approved("boss@example.com", Role::Admin);
    app.approved("ann@example.com", Role::Student);
    app.approved("ben@example.com", Role::Student);
    let pending = app.account("new@example.com", Role::Student, portal_types::models::ApprovalStatus::Pending);

    let (status, outcomes) = app
        .post(
            "/admin/email",
            &admin,
            json!({
                "role": "student",
                "subject": "Hello {name}",
                "html_content": "<p>Hi</p>",
                "text_content": "Hi"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let outcomes = outcomes.as_array().unwrap();
    // Pending accounts are not mailed; with no mail service configured every send fails.
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o["success"] == false && o["error"].is_string()));

    let (status, _) = app
        .post(
            "/admin/email",
            &admin,
            json!({ "recipient_ids": [], "subject": "Hi", "html_content": "", "text_content": "Hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Picking a pending account by id does not get around approval.
    let (status, body) = app
        .post(
            "/admin/email",
            &admin,
            json!({ "recipient_ids": [pending.id], "subject": "Hi", "html_content": "", "text_content": "Hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no recipients selected");
}

#[tokio::test]
async fn inquiries_are_validated_before_forwarding() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(
            Method::POST,
            "/inquiries/partnership",
            None,
            Some(json!({ "name": "", "email": "school@example.com", "message": "Hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::POST,
            "/inquiries/suitability",
            None,
            Some(json!({ "name": "Sam", "email": "not-an-email", "message": "Hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::POST,
            "/inquiries/suitability",
            None,
            Some(json!({ "name": "Sam", "email": "sam@example.com", "course": "dentistry", "message": "Is it for me?" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}
