//! In-process test harness: the full router over a `MemoryStore`

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use taskhive_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskhive_shared::auth::password::HashingParams;
use taskhive_shared::services::{IdentitySettings, ServiceSettings, Services};
use taskhive_shared::store::{MemoryStore, SharedStore};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-key-with-at-least-32-characters";
pub const PASSWORD: &str = "Secret123!";

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
}

pub struct Response {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgresql://unused/test".to_string()),
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            _ => None,
        })
        .expect("test config");

        let mut identity = IdentitySettings::new(JWT_SECRET);
        identity.hashing = HashingParams::fast_insecure();

        let store = Arc::new(MemoryStore::new());
        let shared: SharedStore = store.clone();
        let services = Services::new(shared.clone(), ServiceSettings::new(identity));

        Self {
            app: build_router(AppState::with_services(shared, services, config)),
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        Response { status, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Response {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Response {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Response {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Registers a user and returns (token, user id)
    pub async fn signup(&self, name: &str) -> (String, String) {
        let response = self
            .request(
                Method::POST,
                "/v1/auth/register",
                None,
                Some(json!({
                    "full_name": name,
                    "email": format!("{}@example.com", name.to_lowercase()),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        (
            response.body["credential"]["token"].as_str().unwrap().to_string(),
            response.body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Creates an organization and returns (id, invite code)
    pub async fn create_org(&self, token: &str, name: &str) -> (String, String) {
        let response = self
            .post("/v1/organizations", token, json!({ "name": name }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        (
            response.body["id"].as_str().unwrap().to_string(),
            response.body["invite_code"].as_str().unwrap().to_string(),
        )
    }

    /// Creates a task and returns its id
    pub async fn create_task(&self, token: &str, org_id: &str, assignee: Option<&str>) -> String {
        let response = self
            .post(
                "/v1/tasks",
                token,
                json!({
                    "title": "Fix bug",
                    "org_id": org_id,
                    "due_at": "2025-06-01",
                    "assigned_to": assignee,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        response.body["id"].as_str().unwrap().to_string()
    }
}
