use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::error;

use crate::services::certificate_pdf::PdfError;
use crate::services::mailer::MailError;

/// Field-scoped validation messages, keyed by request field path.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }

    fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (field, messages) in &self.0 {
            map.insert(field.clone(), json!(messages));
        }
        Value::Object(map)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Datos inválidos")]
    Validation(FieldErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict {
        message: String,
        errors: FieldErrors,
        details: Option<Value>,
    },
    #[error("No autorizado")]
    Unauthorized,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("mail error: {0}")]
    Mail(#[from] MailError),
    #[error("pdf error: {0}")]
    Pdf(#[from] PdfError),
    #[error("qr error: {0}")]
    Qr(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("import error: {0}")]
    Import(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            errors: FieldErrors::new(),
            details: None,
        }
    }

    pub fn field_conflict(errors: FieldErrors) -> Self {
        AppError::Conflict {
            message: "Ya existe un registro con estos datos".to_string(),
            errors,
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Import(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(e) if unique_violation_field(e).is_some() => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps a SQLite unique-constraint failure on attendees to the offending field.
pub fn unique_violation_field(err: &sqlx::Error) -> Option<&'static str> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    if !db.is_unique_violation() {
        return None;
    }
    let message = db.message();
    if message.contains("attendees.email") {
        Some("email")
    } else if message.contains("attendees.dni") {
        Some("dni")
    } else if message.contains("companies.name") {
        Some("name")
    } else {
        Some("__all__")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(errors) => json!({
                "status": "error",
                "message": self.to_string(),
                "errors": errors.to_json(),
            }),
            AppError::Conflict {
                message,
                errors,
                details,
            } => {
                let mut body = json!({ "status": "error", "message": message });
                if !errors.is_empty() {
                    body["errors"] = errors.to_json();
                }
                if let Some(Value::Object(extra)) = details {
                    for (k, v) in extra {
                        body[k.as_str()] = v.clone();
                    }
                }
                body
            }
            AppError::Database(e) if status == StatusCode::CONFLICT => {
                let field = unique_violation_field(e).unwrap_or("__all__");
                json!({
                    "status": "error",
                    "message": "Ya existe un registro con estos datos",
                    "errors": { field: ["Este valor ya está registrado."] },
                })
            }
            _ => {
                if status.is_server_error() {
                    error!("request failed: {}", self);
                }
                json!({ "status": "error", "message": self.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_messages_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("career", "requerido");
        errors.add("career", "otro");
        errors.add("dni", "inválido");
        assert!(errors.contains("career"));
        assert_eq!(errors.0["career"].len(), 2);
        assert!(matches!(
            errors.into_result(),
            Err(AppError::Validation(_))
        ));
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::Validation(FieldErrors::single("x", "y")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("nope".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::conflict("dup").status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
