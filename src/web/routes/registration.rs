use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::json_body;
use crate::error::AppError;
use crate::models::AttendeeView;
use crate::services::registration_service::{
    self, AttendeeInput, QuickInput, RegistrationOutcome, RegistrationPayload,
};
use crate::state::AppState;

fn outcome_json(outcome: &RegistrationOutcome) -> Value {
    json!({
        "asistente": AttendeeView::from(&outcome.attendee),
        "registration_id": outcome.registration_id,
        "qr_token": outcome.qr_token,
        "email_sent": outcome.email_sent,
    })
}

pub async fn register_individual_handler(
    State(state): State<AppState>,
    body: Result<Json<RegistrationPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let input = json_body(body)?.into_input();
    let outcome = registration_service::register_attendee(&state, input).await?;

    let mut body = outcome_json(&outcome);
    body["status"] = json!("success");
    body["message"] = json!("Inscripción exitosa");
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn register_group_handler(
    State(state): State<AppState>,
    body: Result<Json<AttendeeInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let input = json_body(body)?;
    let outcome = registration_service::register_group(&state, input).await?;

    let members: Vec<Value> = outcome.members.iter().map(outcome_json).collect();
    let emails_sent = outcome.members.iter().filter(|m| m.email_sent).count()
        + usize::from(outcome.representative.email_sent);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Inscripción grupal exitosa",
            "representante": outcome_json(&outcome.representative),
            "miembros": members,
            "emails_sent": emails_sent,
        })),
    ))
}

pub async fn register_on_site_handler(
    State(state): State<AppState>,
    body: Result<Json<QuickInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let input = json_body(body)?;
    let outcome = registration_service::register_on_site(&state, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Registro exitoso. Tu asistencia quedó confirmada.",
            "asistente": AttendeeView::from(&outcome.attendee),
            "certificate_id": outcome.certificate_id,
            "email_sent": outcome.email_sent,
        })),
    ))
}
