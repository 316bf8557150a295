use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::{AppError, FieldErrors};

pub mod admin;
pub mod certificates;
pub mod checkin;
pub mod companies;
pub mod dni_update;
pub mod misc;
pub mod program;
pub mod qr;
pub mod registration;

/// Malformed JSON bodies get the same 400 shape as validation errors.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        AppError::Validation(FieldErrors::single("__all__", rejection.body_text()))
    })
}

/// Like `json_body`, for actions whose body is optional: only an empty body
/// falls back to the defaults, anything else must parse.
pub(crate) fn optional_json_body<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(FieldErrors::single("__all__", e.to_string())))
}
