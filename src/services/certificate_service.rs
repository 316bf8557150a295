use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::database::{attendee_repo, certificate_repo, program_repo, registration_repo};
use crate::error::AppError;
use crate::models::{AttendeeRow, CertificateKind, CertificateRow, SpeakerRow};
use crate::services::certificate_pdf::{self, CertificateContent};
use crate::services::email_service;
use crate::state::AppState;

/// Idempotent per (attendee, kind).
pub async fn get_or_create(
    pool: &SqlitePool,
    attendee_id: i64,
    kind: CertificateKind,
) -> Result<CertificateRow, AppError> {
    if certificate_repo::insert_if_missing(pool, attendee_id, kind.as_str(), Utc::now()).await? {
        info!("📜 {} certificate created for attendee {}", kind.as_str(), attendee_id);
    }
    certificate_repo::find_for_attendee(pool, attendee_id, kind.as_str())
        .await?
        .ok_or_else(|| AppError::Internal("certificate missing after insert".to_string()))
}

async fn load_attendee(pool: &SqlitePool, attendee_id: i64) -> Result<AttendeeRow, AppError> {
    attendee_repo::find_by_id(pool, attendee_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asistente no encontrado".to_string()))
}

/// Returns the stored PDF, rendering and saving it first if needed.
pub async fn ensure_pdf(state: &AppState, certificate: &CertificateRow) -> Result<Vec<u8>, AppError> {
    if let Some(path) = certificate.pdf_path.as_deref() {
        if state.media.exists(path).await {
            return Ok(state.media.read(path).await?);
        }
        warn!("📜 certificate {} lost its file {}, rendering again", certificate.id, path);
    }

    let attendee = load_attendee(&state.pool, certificate.attendee_id).await?;
    let kind = certificate.kind();
    let now = Utc::now();
    let bytes = certificate_pdf::render(&CertificateContent {
        kind,
        recipient_name: attendee.full_name(),
        dni: attendee.dni.clone(),
        event_name: state.config.event_name.clone(),
        issued_on: now.date_naive(),
    })?;

    let relative = format!("certificates/{}", certificate_pdf::file_name(kind, certificate.id));
    state.media.save(&relative, &bytes).await?;
    certificate_repo::set_pdf(&state.pool, certificate.id, &relative, now).await?;
    Ok(bytes)
}

#[derive(Debug)]
pub struct CertificateFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub async fn download(state: &AppState, id: i64) -> Result<CertificateFile, AppError> {
    let certificate = certificate_repo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Certificado no encontrado".to_string()))?;
    let bytes = ensure_pdf(state, &certificate).await?;
    Ok(CertificateFile {
        filename: certificate_pdf::file_name(certificate.kind(), certificate.id),
        bytes,
    })
}

#[derive(Debug)]
pub struct SpeakerCertificateFile {
    /// Media-relative path of the stored PDF.
    pub path: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Renders the speaker's certificate and stores it under
/// `certificates/disertantes/`, replacing any earlier copy.
pub async fn speaker_certificate(state: &AppState, speaker: &SpeakerRow) -> Result<SpeakerCertificateFile, AppError> {
    let bytes = certificate_pdf::render(&CertificateContent {
        kind: CertificateKind::Speaker,
        recipient_name: speaker.name.clone(),
        dni: None,
        event_name: state.config.event_name.clone(),
        issued_on: Utc::now().date_naive(),
    })?;
    let filename = certificate_pdf::speaker_file_name(&speaker.slug);
    let path = state
        .media
        .save(&format!("certificates/disertantes/{}", filename), &bytes)
        .await?;
    info!("🎤 speaker certificate stored for {}", speaker.slug);
    Ok(SpeakerCertificateFile { path, filename, bytes })
}

pub async fn speaker_certificate_by_id(state: &AppState, speaker_id: i64) -> Result<SpeakerCertificateFile, AppError> {
    let speaker = program_repo::find_speaker(&state.pool, speaker_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Disertante no encontrado".to_string()))?;
    speaker_certificate(state, &speaker).await
}

/// Emails the certificate, stamps `sent_at` and moves the registration to
/// `certified`.
pub async fn send_certificate(state: &AppState, certificate: &CertificateRow) -> Result<(), AppError> {
    let attendee = load_attendee(&state.pool, certificate.attendee_id).await?;
    let pdf = ensure_pdf(state, certificate).await?;
    let now = Utc::now();
    let email = email_service::certificate_email(
        &state.config,
        &attendee,
        certificate.kind(),
        now.date_naive(),
        pdf,
    )?;
    state.mailer.send(email).await?;

    certificate_repo::mark_sent(&state.pool, certificate.id, now).await?;
    registration_repo::mark_certified(&state.pool, attendee.id, now).await?;
    info!("📜 certificate {} sent to {}", certificate.id, attendee.email);
    Ok(())
}
