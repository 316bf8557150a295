use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::database::{attendee_repo, qr_code_repo, registration_repo};
use crate::error::{AppError, FieldErrors};
use crate::models::{AttendeeRow, AttendeeView, CertificateKind};
use crate::services::certificate_service;
use crate::services::dni_service::normalize_dni;
use crate::state::AppState;

pub const MSG_DNI_NOT_FOUND: &str =
    "DNI no encontrado. Verificá que esté bien escrito o inscribite en el evento.";
pub const MSG_ALREADY_CONFIRMED: &str = "La asistencia ya fue confirmada anteriormente.";

#[derive(Debug)]
pub struct CheckInOutcome {
    pub attendee: AttendeeRow,
    pub certificate_id: Option<i64>,
    pub email_sent: bool,
}

fn already_confirmed(attendee: &AttendeeRow) -> AppError {
    AppError::Conflict {
        message: MSG_ALREADY_CONFIRMED.to_string(),
        errors: FieldErrors::new(),
        details: Some(json!({
            "fecha_confirmacion": attendee.confirmed_at,
            "asistente": AttendeeView::from(attendee),
        })),
    }
}

pub async fn confirm_by_dni(state: &AppState, raw_dni: &str) -> Result<CheckInOutcome, AppError> {
    if raw_dni.trim().is_empty() {
        return Err(AppError::Validation(FieldErrors::single(
            "dni",
            "Este campo es obligatorio.",
        )));
    }
    let dni = normalize_dni(raw_dni)
        .ok_or_else(|| AppError::Validation(FieldErrors::single("dni", "El DNI debe tener 7 u 8 dígitos.")))?;

    let attendee = attendee_repo::find_by_dni(&state.pool, &dni)
        .await?
        .ok_or_else(|| AppError::NotFound(MSG_DNI_NOT_FOUND.to_string()))?;

    confirm_attendee(state, attendee).await
}

/// Confirms the attendee and moves the registration to `attended` in one
/// transaction. False when someone else confirmed first.
pub async fn record_attendance(pool: &SqlitePool, attendee_id: i64, at: DateTime<Utc>) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;
    if attendee_repo::confirm_attendance(&mut *tx, attendee_id, at).await? == 0 {
        tx.rollback().await?;
        return Ok(false);
    }
    registration_repo::mark_attended(&mut *tx, attendee_id, at).await?;
    tx.commit().await?;
    Ok(true)
}

/// `unconfirmed → confirmed`. The conditional update decides races; the
/// loser gets the conflict with the winner's timestamp.
pub async fn confirm_attendee(state: &AppState, attendee: AttendeeRow) -> Result<CheckInOutcome, AppError> {
    if attendee.attendance_confirmed {
        return Err(already_confirmed(&attendee));
    }

    let now = Utc::now();
    if !record_attendance(&state.pool, attendee.id, now).await? {
        let current = attendee_repo::find_by_id(&state.pool, attendee.id)
            .await?
            .unwrap_or(attendee);
        return Err(already_confirmed(&current));
    }
    info!("✅ attendance confirmed for attendee {}", attendee.id);

    let attendee = AttendeeRow {
        attendance_confirmed: true,
        confirmed_at: Some(now),
        ..attendee
    };

    let certificate =
        match certificate_service::get_or_create(&state.pool, attendee.id, CertificateKind::Attendance).await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Certificate creation for attendee {} failed: {}", attendee.id, e);
                None
            }
        };

    let mut email_sent = false;
    if let Some(cert) = &certificate {
        match certificate_service::send_certificate(state, cert).await {
            Ok(()) => email_sent = true,
            Err(e) => warn!("Certificate email to {} failed: {}", attendee.email, e),
        }
    }

    Ok(CheckInOutcome {
        certificate_id: certificate.map(|c| c.id),
        attendee,
        email_sent,
    })
}

#[derive(Debug)]
pub struct QrCheckInOutcome {
    pub attendee: AttendeeRow,
    pub checked_in_at: DateTime<Utc>,
    /// False when attendance had already been confirmed by DNI.
    pub newly_confirmed: bool,
    pub certificate_id: Option<i64>,
    pub email_sent: bool,
}

fn qr_consumed(checked_in_at: Option<DateTime<Utc>>) -> AppError {
    AppError::Conflict {
        message: "Este código QR ya fue utilizado.".to_string(),
        errors: FieldErrors::new(),
        details: Some(json!({ "checked_in_at": checked_in_at })),
    }
}

pub async fn check_in_qr(state: &AppState, token: &str) -> Result<QrCheckInOutcome, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Validation(FieldErrors::single(
            "codigo",
            "Este campo es obligatorio.",
        )));
    }

    let qr = qr_code_repo::find_by_token(&state.pool, token)
        .await?
        .ok_or_else(|| AppError::NotFound("Código QR inválido".to_string()))?;
    if qr.checked_in {
        return Err(qr_consumed(qr.checked_in_at));
    }

    let now = Utc::now();
    if qr_code_repo::consume(&state.pool, qr.id, now).await? == 0 {
        let current = qr_code_repo::find_by_token(&state.pool, token).await?;
        return Err(qr_consumed(current.and_then(|q| q.checked_in_at)));
    }
    info!("🎫 QR {} consumed", qr.id);

    let registration = registration_repo::find_by_id(&state.pool, qr.registration_id)
        .await?
        .ok_or_else(|| AppError::Internal("QR without registration".to_string()))?;
    let attendee = attendee_repo::find_by_id(&state.pool, registration.attendee_id)
        .await?
        .ok_or_else(|| AppError::Internal("registration without attendee".to_string()))?;

    if attendee.attendance_confirmed {
        return Ok(QrCheckInOutcome {
            attendee,
            checked_in_at: now,
            newly_confirmed: false,
            certificate_id: None,
            email_sent: false,
        });
    }

    match confirm_attendee(state, attendee).await {
        Ok(outcome) => Ok(QrCheckInOutcome {
            attendee: outcome.attendee,
            checked_in_at: now,
            newly_confirmed: true,
            certificate_id: outcome.certificate_id,
            email_sent: outcome.email_sent,
        }),
        // Confirmed by DNI in the meantime; the QR itself was still valid.
        Err(AppError::Conflict { .. }) => {
            let attendee = attendee_repo::find_by_id(&state.pool, registration.attendee_id)
                .await?
                .ok_or_else(|| AppError::Internal("registration without attendee".to_string()))?;
            Ok(QrCheckInOutcome {
                attendee,
                checked_in_at: now,
                newly_confirmed: false,
                certificate_id: None,
                email_sent: false,
            })
        }
        Err(e) => Err(e),
    }
}
