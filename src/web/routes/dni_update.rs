use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::json_body;
use crate::error::AppError;
use crate::models::AttendeeView;
use crate::services::dni_service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    token: String,
    #[serde(default)]
    dni: Value,
}

pub async fn lookup_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, AppError> {
    let lookup = dni_service::lookup_update_token(&state.pool, query.token.trim()).await?;
    Ok(Json(json!({ "status": "success", "asistente": lookup })))
}

pub async fn update_handler(
    State(state): State<AppState>,
    body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    let raw_dni = match &body.dni {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    let attendee = dni_service::apply_dni_update(&state.pool, body.token.trim(), &raw_dni).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "DNI actualizado correctamente",
        "asistente": AttendeeView::from(&attendee),
    })))
}
