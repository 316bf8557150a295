use axum::{
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use cookie::{Cookie, SameSite};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;

const CSRF_TOKEN_LEN: usize = 32;

/// Build marker set by build.rs; `dev` when built without it.
pub fn build_id() -> &'static str {
    option_env!("CONGRESO_BUILD_ID").unwrap_or("dev")
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "build_id": build_id() }))
}

/// The frontend reads the token from the body and echoes the cookie back.
/// Nothing in the API enforces it.
pub async fn csrf_token_handler() -> Response {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LEN)
        .map(char::from)
        .collect();

    let cookie = Cookie::build(("csrftoken", token.clone()))
        .path("/")
        .same_site(SameSite::Lax)
        .build();

    (
        [(header::SET_COOKIE, cookie.to_string())],
        Json(json!({ "csrfToken": token })),
    )
        .into_response()
}
