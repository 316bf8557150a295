use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::AppError;
use crate::services::qr_service::{self, StaticCodes};
use crate::state::AppState;

/// Check-in and on-site registration codes for printing at the venue.
pub async fn static_codes_handler(State(state): State<AppState>) -> Result<Json<StaticCodes>, AppError> {
    Ok(Json(qr_service::static_codes(&state.config)?))
}

pub async fn registration_qr_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let png = qr_service::registration_png(&state.pool, &token).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
