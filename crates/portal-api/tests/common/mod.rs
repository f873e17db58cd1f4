#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use portal_api::auth::create_token;
use portal_api::config::PortalConfig;
use portal_api::email::Mailer;
use portal_api::storage::Storage;
use portal_api::{AppState, AppStateInner, router};
use portal_db::models::NewUser;
use portal_db::{Database, LinkKind};
use portal_types::api::AdminUpdateUserRequest;
use portal_types::models::{ApprovalStatus, Role};

pub const SECRET: &str = "test-secret";
pub const PRIMARY_ADMIN: &str = "owner@example.com";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = PortalConfig {
            storage_dir: dir.path().join("documents"),
            primary_admin_email: Some(PRIMARY_ADMIN.into()),
            office_email: Some("office@example.com".into()),
            ..PortalConfig::default()
        };
        let storage = Storage::new(config.storage_dir.clone()).await.unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.into(),
            config,
            storage,
            mailer: Mailer::new(None),
        });
        Self {
            router: router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// Creates an account directly in the database and signs a token for it.
    pub fn account(&self, email: &str, role: Role, status: ApprovalStatus) -> Account {
        let db = &self.state.db;
        let user = db
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                email,
                password_hash: "unused",
                full_name: email.split('@').next().unwrap(),
                role,
            })
            .unwrap()
            .unwrap();
        db.admin_update_user(
            user.id,
            &AdminUpdateUserRequest {
                approval_status: Some(status),
                ..Default::default()
            },
        )
        .unwrap();
        Account {
            id: user.id,
            token: create_token(SECRET, user.id, email).unwrap(),
        }
    }

    pub fn approved(&self, email: &str, role: Role) -> Account {
        self.account(email, role, ApprovalStatus::Approved)
    }

    pub fn link(&self, kind: LinkKind, user: &Account, student: &Account) {
        self.state.db.link(kind, user.id, student.id).unwrap();
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, who: &Account) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(&who.token), None).await
    }

    pub async fn post(&self, uri: &str, who: &Account, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(&who.token), Some(body)).await
    }
}
