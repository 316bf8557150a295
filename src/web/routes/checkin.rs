use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::json_body;
use crate::error::AppError;
use crate::models::AttendeeView;
use crate::services::checkin_service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DniBody {
    #[serde(default, deserialize_with = "string_or_number")]
    dni: String,
}

#[derive(Debug, Deserialize)]
pub struct QrBody {
    #[serde(default, alias = "codigo", alias = "qr_code")]
    token: String,
}

// Some kiosks post the DNI as a JSON number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

pub async fn verify_dni_handler(
    State(state): State<AppState>,
    body: Result<Json<DniBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    let outcome = checkin_service::confirm_by_dni(&state, &body.dni).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "¡Asistencia confirmada!",
        "asistencia_confirmada": outcome.attendee.attendance_confirmed,
        "asistente": AttendeeView::from(&outcome.attendee),
        "certificate_id": outcome.certificate_id,
        "email_sent": outcome.email_sent,
    })))
}

pub async fn qr_checkin_handler(
    State(state): State<AppState>,
    body: Result<Json<QrBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    let outcome = checkin_service::check_in_qr(&state, &body.token).await?;
    let message = if outcome.newly_confirmed {
        "Check-in registrado. ¡Asistencia confirmada!"
    } else {
        "Check-in registrado."
    };
    Ok(Json(json!({
        "status": "success",
        "message": message,
        "asistencia_confirmada": outcome.attendee.attendance_confirmed,
        "asistente": AttendeeView::from(&outcome.attendee),
        "checked_in_at": outcome.checked_in_at,
        "newly_confirmed": outcome.newly_confirmed,
        "certificate_id": outcome.certificate_id,
        "email_sent": outcome.email_sent,
    })))
}
