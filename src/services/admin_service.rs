use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::database::attendee_repo::{self, AttendeeFilter};
use crate::database::{certificate_repo, company_repo, program_repo, registration_repo};
use crate::error::{AppError, FieldErrors};
use crate::models::{
    AttendeeRow, AttendeeView, CertificateKind, CertificateRow, CompanyRow, ProfileType,
    RegistrationRow, RegistrationStatus,
};
use crate::services::dni_service::{self, NormalizeReport};
use crate::services::{certificate_service, checkin_service, email_service};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// Query string shared by the admin listings; each listing reads the
/// filters it understands.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub profile_type: Option<String>,
    #[serde(default)]
    pub confirmed: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub sent: Option<bool>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

impl ListQuery {
    fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    fn page_size(&self) -> i64 {
        self.page_size
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    /// Saturates on absurd page numbers; SQLite then returns an empty page.
    fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<T>,
}

pub async fn list_attendees(pool: &SqlitePool, query: &ListQuery) -> Result<Page<AttendeeView>, AppError> {
    let filter = AttendeeFilter {
        q: query.q.clone(),
        profile_type: query
            .profile_type
            .as_deref()
            .and_then(ProfileType::parse)
            .map(|p| p.as_str().to_string()),
        confirmed: query.confirmed,
        limit: query.page_size(),
        offset: query.offset(),
    };
    let count = attendee_repo::count(pool, &filter).await?;
    let rows = attendee_repo::search(pool, &filter).await?;
    Ok(Page {
        count,
        page: query.page(),
        page_size: query.page_size(),
        results: rows.iter().map(AttendeeView::from).collect(),
    })
}

pub async fn list_companies(pool: &SqlitePool, query: &ListQuery) -> Result<Vec<CompanyRow>, AppError> {
    let q = query.q.as_deref().unwrap_or("");
    Ok(company_repo::search(pool, q, query.page_size()).await?)
}

pub async fn list_registrations(pool: &SqlitePool, query: &ListQuery) -> Result<Vec<RegistrationRow>, AppError> {
    let status = query
        .status
        .as_deref()
        .and_then(RegistrationStatus::parse)
        .map(RegistrationStatus::as_str);
    Ok(registration_repo::list(pool, status, query.page_size(), query.offset()).await?)
}

pub async fn list_certificates(pool: &SqlitePool, query: &ListQuery) -> Result<Vec<CertificateRow>, AppError> {
    let kind = query
        .kind
        .as_deref()
        .and_then(CertificateKind::parse)
        .map(CertificateKind::as_str);
    Ok(certificate_repo::list(pool, kind, query.sent, query.page_size(), query.offset()).await?)
}

#[derive(Debug, Default, Serialize)]
pub struct MarkAttendedReport {
    pub confirmed: usize,
    pub already_confirmed: usize,
    pub not_found: Vec<i64>,
}

/// Bulk confirmation from the console. No certificate is created and no
/// email is sent.
pub async fn mark_attended(pool: &SqlitePool, ids: &[i64]) -> Result<MarkAttendedReport, AppError> {
    let mut report = MarkAttendedReport::default();
    let now = Utc::now();
    for &id in ids {
        if attendee_repo::find_by_id(pool, id).await?.is_none() {
            report.not_found.push(id);
            continue;
        }
        if checkin_service::record_attendance(pool, id, now).await? {
            report.confirmed += 1;
        } else {
            report.already_confirmed += 1;
        }
    }
    info!(
        "✅ admin marked {} attendees as attended ({} already confirmed)",
        report.confirmed, report.already_confirmed
    );
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub id: i64,
    pub error: String,
}

/// Outcome of one capped batch; `remaining` is what a further run would pick up.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub sent: usize,
    pub failed: Vec<BatchFailure>,
    pub remaining: i64,
}

impl BatchReport {
    fn fail(&mut self, id: i64, error: impl ToString) {
        self.failed.push(BatchFailure {
            id,
            error: error.to_string(),
        });
    }
}

fn capped(requested: Option<i64>, cap: i64) -> i64 {
    requested.filter(|n| *n >= 1).unwrap_or(cap).min(cap)
}

#[derive(Debug, Default, Deserialize)]
pub struct SendCertificatesRequest {
    /// Explicit certificate ids; sent even if they went out before.
    #[serde(default)]
    pub ids: Option<Vec<i64>>,
    #[serde(default)]
    pub confirmed_on: Option<NaiveDate>,
    #[serde(default)]
    pub kind: Option<CertificateKind>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Attendee batches cover attendance and participation; speakers are not
/// attendees and get their certificates from `generate_speaker_certificates`.
fn attendee_kind(kind: Option<CertificateKind>) -> Result<CertificateKind, AppError> {
    match kind.unwrap_or(CertificateKind::Attendance) {
        CertificateKind::Speaker => Err(AppError::Validation(FieldErrors::single(
            "kind",
            "Los certificados de disertante se generan desde el listado de disertantes.",
        ))),
        kind => Ok(kind),
    }
}

pub async fn send_certificates(
    state: &AppState,
    request: SendCertificatesRequest,
) -> Result<BatchReport, AppError> {
    let limit = capped(request.limit, state.config.certificate_batch_size);
    let confirmed_on = request.confirmed_on.or(state.config.certificate_confirmed_on);
    let kind = attendee_kind(request.kind)?;
    let utc_offset = state.config.event_utc_offset_minutes;

    let mut report = BatchReport::default();
    let certificates = match request.ids {
        Some(ids) => {
            let mut found = Vec::new();
            for id in ids.into_iter().take(limit as usize) {
                match certificate_repo::find_by_id(&state.pool, id).await? {
                    Some(c) => found.push(c),
                    None => report.fail(id, "Certificado no encontrado"),
                }
            }
            found
        }
        None => {
            certificate_repo::list_pending_send(&state.pool, kind.as_str(), confirmed_on, utc_offset, limit)
                .await?
        }
    };

    for certificate in &certificates {
        report.processed += 1;
        match certificate_service::send_certificate(state, certificate).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!("Certificate {} not sent: {}", certificate.id, e);
                report.fail(certificate.id, e);
            }
        }
    }

    report.remaining =
        certificate_repo::count_pending_send(&state.pool, kind.as_str(), confirmed_on, utc_offset).await?;
    info!(
        "📜 certificate batch: {} sent, {} failed, {} remaining",
        report.sent,
        report.failed.len(),
        report.remaining
    );
    Ok(report)
}

#[derive(Debug, Default, Serialize)]
pub struct GenerateReport {
    pub created: u64,
    pub rendered: usize,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub kind: Option<CertificateKind>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Creates the certificate of every confirmed attendee that lacks one
/// (attendance unless `kind` says otherwise), then renders up to `limit`
/// missing PDFs.
pub async fn generate_certificates(state: &AppState, request: GenerateRequest) -> Result<GenerateReport, AppError> {
    let kind = attendee_kind(request.kind)?;
    let limit = capped(request.limit, state.config.certificate_batch_size);
    let mut report = GenerateReport {
        created: certificate_repo::create_missing_for_confirmed(&state.pool, kind.as_str(), Utc::now()).await?,
        ..GenerateReport::default()
    };

    for certificate in certificate_repo::list_without_pdf(&state.pool, limit).await? {
        match certificate_service::ensure_pdf(state, &certificate).await {
            Ok(_) => report.rendered += 1,
            Err(e) => {
                warn!("Certificate {} not rendered: {}", certificate.id, e);
                report.failed.push(BatchFailure {
                    id: certificate.id,
                    error: e.to_string(),
                });
            }
        }
    }
    info!(
        "📜 certificates generated: {} created, {} rendered",
        report.created, report.rendered
    );
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct SpeakerCertificate {
    pub speaker_id: i64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SpeakerCertificateReport {
    pub rendered: Vec<SpeakerCertificate>,
    pub failed: Vec<BatchFailure>,
}

/// Renders and stores a certificate for every speaker, in name order.
pub async fn generate_speaker_certificates(state: &AppState) -> Result<SpeakerCertificateReport, AppError> {
    let mut report = SpeakerCertificateReport::default();
    for speaker in program_repo::list_speakers(&state.pool).await? {
        match certificate_service::speaker_certificate(state, &speaker).await {
            Ok(file) => report.rendered.push(SpeakerCertificate {
                speaker_id: speaker.id,
                name: speaker.name.clone(),
                url: state.media.url(&file.path),
            }),
            Err(e) => {
                warn!("Speaker certificate for {} not rendered: {}", speaker.slug, e);
                report.failed.push(BatchFailure {
                    id: speaker.id,
                    error: e.to_string(),
                });
            }
        }
    }
    info!("🎤 speaker certificates: {} rendered", report.rendered.len());
    Ok(report)
}

async fn request_dni(state: &AppState, attendee: &AttendeeRow) -> Result<(), AppError> {
    let token = dni_service::ensure_update_token(&state.pool, attendee).await?;
    let email = email_service::dni_update_email(&state.config, attendee, &token)?;
    state.mailer.send(email).await?;
    attendee_repo::mark_dni_requested(&state.pool, attendee.id, Utc::now()).await?;
    Ok(())
}

/// Emails the DNI update link to attendees without DNI who were not asked
/// yet. Failed sends stay pending for the next batch.
pub async fn send_dni_update_requests(state: &AppState, limit: Option<i64>) -> Result<BatchReport, AppError> {
    let limit = capped(limit, state.config.dni_request_batch_size);
    let mut report = BatchReport::default();

    for attendee in attendee_repo::list_pending_dni_request(&state.pool, limit).await? {
        report.processed += 1;
        match request_dni(state, &attendee).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!("DNI request to {} failed: {}", attendee.email, e);
                report.fail(attendee.id, e);
            }
        }
    }

    report.remaining = attendee_repo::count_pending_dni_request(&state.pool).await?;
    info!(
        "🪪 DNI requests: {} sent, {} failed, {} remaining",
        report.sent,
        report.failed.len(),
        report.remaining
    );
    Ok(report)
}

pub async fn normalize_dnis(pool: &SqlitePool) -> Result<NormalizeReport, AppError> {
    dni_service::normalize_all(pool).await
}

const EXPORT_HEADERS: [&str; 15] = [
    "id",
    "nombre",
    "apellido",
    "email",
    "dni",
    "telefono",
    "perfil",
    "institucion",
    "carrera",
    "ocupacion",
    "grupo",
    "representante_id",
    "asistencia_confirmada",
    "fecha_confirmacion",
    "fecha_inscripcion",
];

fn csv_err(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("csv export failed: {}", e))
}

/// Every attendee as CSV, one row per attendee, oldest first.
pub async fn export_attendees_csv(pool: &SqlitePool) -> Result<Vec<u8>, AppError> {
    let attendees = attendee_repo::list_all(pool).await?;
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS).map_err(csv_err)?;
    for a in &attendees {
        let occupation = a.occupation.as_deref().or(a.work_area.as_deref()).unwrap_or("");
        writer
            .write_record([
                a.id.to_string().as_str(),
                a.first_name.as_str(),
                a.last_name.as_str(),
                a.email.as_str(),
                a.dni.as_deref().unwrap_or(""),
                a.phone.as_deref().unwrap_or(""),
                a.profile().label(),
                a.institution.as_deref().unwrap_or(""),
                a.career.as_deref().or(a.career_taught.as_deref()).unwrap_or(""),
                occupation,
                a.group_name.as_deref().unwrap_or(""),
                a.representative_id.map(|id| id.to_string()).unwrap_or_default().as_str(),
                if a.attendance_confirmed { "si" } else { "no" },
                a.confirmed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default()
                    .as_str(),
                a.created_at.format("%Y-%m-%d %H:%M").to_string().as_str(),
            ])
            .map_err(csv_err)?;
    }
    writer.into_inner().map_err(csv_err)
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub attendees: i64,
    pub confirmed: i64,
    pub dni_requests_pending: i64,
    pub certificates_pending: i64,
}

pub async fn summary(state: &AppState) -> Result<Summary, AppError> {
    let all = AttendeeFilter::default();
    let confirmed = AttendeeFilter {
        confirmed: Some(true),
        ..AttendeeFilter::default()
    };
    Ok(Summary {
        attendees: attendee_repo::count(&state.pool, &all).await?,
        confirmed: attendee_repo::count(&state.pool, &confirmed).await?,
        dni_requests_pending: attendee_repo::count_pending_dni_request(&state.pool).await?,
        certificates_pending: certificate_repo::count_pending_send(
            &state.pool,
            CertificateKind::Attendance.as_str(),
            state.config.certificate_confirmed_on,
            state.config.event_utc_offset_minutes,
        )
        .await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_limit_never_exceeds_cap() {
        assert_eq!(capped(None, 40), 40);
        assert_eq!(capped(Some(10), 40), 10);
        assert_eq!(capped(Some(500), 40), 40);
        assert_eq!(capped(Some(0), 40), 40);
    }

    #[test]
    fn paging_defaults_and_bounds() {
        let query = ListQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.offset(), 0);

        let query = ListQuery {
            page: Some(3),
            page_size: Some(10_000),
            ..ListQuery::default()
        };
        assert_eq!(query.page_size(), MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 2 * MAX_PAGE_SIZE);

        let query = ListQuery {
            page: Some(i64::MAX),
            ..ListQuery::default()
        };
        assert_eq!(query.offset(), i64::MAX);
    }

    #[test]
    fn attendee_batches_refuse_speaker_kind() {
        assert_eq!(attendee_kind(None).unwrap(), CertificateKind::Attendance);
        assert_eq!(
            attendee_kind(Some(CertificateKind::Participation)).unwrap(),
            CertificateKind::Participation
        );
        assert!(matches!(
            attendee_kind(Some(CertificateKind::Speaker)),
            Err(AppError::Validation(_))
        ));
    }
}
