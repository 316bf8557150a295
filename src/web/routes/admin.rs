use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{json_body, optional_json_body};
use crate::error::{AppError, FieldErrors};
use crate::models::{AttendeeView, CertificateRow, CompanyRow, RegistrationRow, SpeakerRow};
use crate::services::admin_service::{
    self, BatchReport, GenerateReport, GenerateRequest, ListQuery, MarkAttendedReport, Page,
    SendCertificatesRequest, SpeakerCertificateReport, Summary,
};
use crate::services::certificate_service;
use crate::services::dni_service::NormalizeReport;
use crate::services::import_service::{self, ImportReport};
use crate::services::program_service::{self, SessionInput, SessionView, SpeakerInput};
use crate::state::AppState;
use crate::web::middleware::auth::AdminUser;

#[derive(Debug, Deserialize)]
pub struct IdsBody {
    #[serde(default)]
    ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitBody {
    #[serde(default)]
    limit: Option<i64>,
}

pub async fn summary_handler(State(state): State<AppState>) -> Result<Json<Summary>, AppError> {
    Ok(Json(admin_service::summary(&state).await?))
}

pub async fn list_attendees_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<AttendeeView>>, AppError> {
    Ok(Json(admin_service::list_attendees(&state.pool, &query).await?))
}

pub async fn list_companies_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CompanyRow>>, AppError> {
    Ok(Json(admin_service::list_companies(&state.pool, &query).await?))
}

pub async fn list_registrations_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RegistrationRow>>, AppError> {
    Ok(Json(admin_service::list_registrations(&state.pool, &query).await?))
}

pub async fn list_certificates_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CertificateRow>>, AppError> {
    Ok(Json(admin_service::list_certificates(&state.pool, &query).await?))
}

pub async fn mark_attended_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    body: Result<Json<IdsBody>, JsonRejection>,
) -> Result<Json<MarkAttendedReport>, AppError> {
    let body = json_body(body)?;
    if body.ids.is_empty() {
        return Err(AppError::Validation(FieldErrors::single(
            "ids",
            "Seleccioná al menos un asistente.",
        )));
    }
    info!("🛠️ {} marking {} attendees as attended", admin.username, body.ids.len());
    Ok(Json(admin_service::mark_attended(&state.pool, &body.ids).await?))
}

pub async fn send_certificates_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchReport>, AppError> {
    let request: SendCertificatesRequest = optional_json_body(&body)?;
    Ok(Json(admin_service::send_certificates(&state, request).await?))
}

pub async fn generate_certificates_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateReport>, AppError> {
    let request: GenerateRequest = optional_json_body(&body)?;
    Ok(Json(admin_service::generate_certificates(&state, request).await?))
}

pub async fn send_dni_requests_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchReport>, AppError> {
    let body: LimitBody = optional_json_body(&body)?;
    Ok(Json(admin_service::send_dni_update_requests(&state, body.limit).await?))
}

pub async fn normalize_dnis_handler(State(state): State<AppState>) -> Result<Json<NormalizeReport>, AppError> {
    Ok(Json(admin_service::normalize_dnis(&state.pool).await?))
}

pub async fn export_attendees_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let bytes = admin_service::export_attendees_csv(&state.pool).await?;
    let filename = format!("asistentes_{}.csv", Utc::now().format("%Y%m%d_%H%M"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Spreadsheet upload in the `file` field (.csv or .xlsx).
pub async fn import_attendees_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, AppError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(FieldErrors::single("file", e.to_string()))
    };
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(invalid)?;
        let report = import_service::import_attendees(&state, &file_name, &bytes).await?;
        return Ok(Json(report));
    }
    Err(AppError::Validation(FieldErrors::single(
        "file",
        "Adjuntá un archivo .csv o .xlsx.",
    )))
}

pub async fn create_speaker_handler(
    State(state): State<AppState>,
    body: Result<Json<SpeakerInput>, JsonRejection>,
) -> Result<(StatusCode, Json<SpeakerRow>), AppError> {
    let speaker = program_service::create_speaker(&state.pool, json_body(body)?).await?;
    Ok((StatusCode::CREATED, Json(speaker)))
}

pub async fn create_session_handler(
    State(state): State<AppState>,
    body: Result<Json<SessionInput>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let session = program_service::create_session(&state.pool, json_body(body)?).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn generate_speaker_certificates_handler(
    State(state): State<AppState>,
) -> Result<Json<SpeakerCertificateReport>, AppError> {
    Ok(Json(admin_service::generate_speaker_certificates(&state).await?))
}

pub async fn speaker_certificate_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let file = certificate_service::speaker_certificate_by_id(&state, id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response())
}

pub async fn whoami_handler(Extension(admin): Extension<AdminUser>) -> Json<Value> {
    Json(json!({ "username": admin.username }))
}
