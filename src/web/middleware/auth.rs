use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Clone, Debug)]
pub struct AdminUser {
    pub username: String,
}

/// Decodes `Authorization: Basic <base64(user:password)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Constant-time over the password bytes.
fn credentials_match(user: &str, password: &str, expected_user: &str, expected_password: &str) -> bool {
    let user_ok = user.as_bytes().ct_eq(expected_user.as_bytes());
    let password_ok = password.as_bytes().ct_eq(expected_password.as_bytes());
    (user_ok & password_ok).into()
}

fn unauthorized() -> Response {
    let mut response = AppError::Unauthorized.into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"congreso-admin\""),
    );
    response
}

pub async fn require_admin(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    // An empty password disables the console.
    if state.config.admin_password.is_empty() {
        warn!("admin request rejected: ADMIN_PASSWORD is not set");
        return (StatusCode::SERVICE_UNAVAILABLE, unauthorized()).into_response();
    }

    match basic_credentials(request.headers()) {
        Some((user, password))
            if credentials_match(
                &user,
                &password,
                &state.config.admin_username,
                &state.config.admin_password,
            ) =>
        {
            request
                .extensions_mut()
                .insert(AdminUser { username: user });
            next.run(request).await
        }
        Some((user, _)) => {
            warn!("admin login failed for user {}", user);
            unauthorized()
        }
        None => unauthorized(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_basic_header() {
        let mut headers = HeaderMap::new();
        let encoded = general_purpose::STANDARD.encode("admin:s3cr:et");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        );
        assert_eq!(
            basic_credentials(&headers),
            Some(("admin".to_string(), "s3cr:et".to_string()))
        );
    }

    #[test]
    fn credentials_must_match_exactly() {
        assert!(credentials_match("admin", "secret", "admin", "secret"));
        assert!(!credentials_match("admin", "secre", "admin", "secret"));
        assert!(!credentials_match("admin", "secret!", "admin", "secret"));
        assert!(!credentials_match("root", "secret", "admin", "secret"));
    }

    #[test]
    fn rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(basic_credentials(&headers), None);
    }
}
