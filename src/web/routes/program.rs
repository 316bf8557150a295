use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::AppError;
use crate::models::SpeakerRow;
use crate::services::program_service::{self, SessionFilter, SessionView, SpeakerDetail};
use crate::state::AppState;

pub async fn list_sessions_handler(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    Ok(Json(program_service::list_sessions(&state.pool, &filter).await?))
}

pub async fn session_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(program_service::get_session(&state.pool, id).await?))
}

pub async fn list_speakers_handler(State(state): State<AppState>) -> Result<Json<Vec<SpeakerRow>>, AppError> {
    Ok(Json(program_service::list_speakers(&state.pool).await?))
}

pub async fn speaker_detail_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SpeakerDetail>, AppError> {
    Ok(Json(program_service::get_speaker(&state.pool, &slug).await?))
}
