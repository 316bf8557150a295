#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use congreso::config::AppConfig;
use congreso::database;
use congreso::services::mailer::{LogMailer, Mailer};
use congreso::web::router::build_router;
use congreso::AppState;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<LogMailer>,
    pub media_root: PathBuf,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_mailer(LogMailer::default()).await
}

pub async fn spawn_app_with_mailer(mailer: LogMailer) -> TestApp {
    let media_root = std::env::temp_dir().join(format!("congreso-test-{}", uuid::Uuid::new_v4()));
    let config = AppConfig::for_tests(media_root.clone());

    let pool = database::connect(&config.database_url)
        .await
        .expect("in-memory database");
    database::migrate(&pool).await.expect("migrations apply");

    let mailer = Arc::new(mailer);
    let state = AppState::new(pool, config, mailer.clone() as Arc<dyn Mailer>);
    TestApp {
        router: build_router(state.clone()),
        state,
        mailer,
        media_root,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes()
            .to_vec();
        (status, bytes)
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub fn admin_auth(&self) -> String {
        let credentials = format!(
            "{}:{}",
            self.state.config.admin_username, self.state.config.admin_password
        );
        format!("Basic {}", general_purpose::STANDARD.encode(credentials))
    }

    pub async fn admin_get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, self.admin_auth())
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn admin_post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, self.admin_auth())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}

/// A visitor registration in the individual form's wire shape.
pub fn visitor(first_name: &str, email: &str, dni: &str) -> Value {
    serde_json::json!({
        "asistente": {
            "first_name": first_name,
            "last_name": "Gómez",
            "email": email,
            "dni": dni,
            "phone": "1122334455",
            "profile_type": "VISITOR"
        }
    })
}

pub const BOUNDARY: &str = "congreso-test-boundary";

/// A multipart/form-data body with text fields and an optional
/// `(field, filename, bytes)` file part.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, content)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, body: Vec<u8>, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(auth) = authorization {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body)).unwrap()
}
