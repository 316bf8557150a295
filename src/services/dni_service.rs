use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::database::attendee_repo;
use crate::error::{AppError, FieldErrors};
use crate::models::AttendeeRow;

const TOKEN_LEN: usize = 40;

/// Digits only. A 9-digit value ending in 0 is a common typo and loses the
/// trailing zero. Returns `None` unless 7 or 8 digits remain.
pub fn normalize_dni(raw: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 9 && digits.ends_with('0') {
        digits.pop();
    }
    if (7..=8).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

pub fn generate_update_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Returns the attendee's current token, assigning a new one if missing.
pub async fn ensure_update_token(pool: &SqlitePool, attendee: &AttendeeRow) -> sqlx::Result<String> {
    if let Some(token) = attendee.dni_update_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    let token = generate_update_token();
    attendee_repo::set_update_token(pool, attendee.id, Some(&token)).await?;
    Ok(token)
}

#[derive(Debug, Serialize)]
pub struct TokenLookup {
    pub nombre_completo: String,
    pub email: String,
    pub dni: Option<String>,
}

pub async fn lookup_update_token(pool: &SqlitePool, token: &str) -> Result<TokenLookup, AppError> {
    let attendee = find_by_token(pool, token).await?;
    Ok(TokenLookup {
        nombre_completo: attendee.full_name(),
        email: attendee.email,
        dni: attendee.dni,
    })
}

/// Stores the DNI and burns the token.
pub async fn apply_dni_update(pool: &SqlitePool, token: &str, raw_dni: &str) -> Result<AttendeeRow, AppError> {
    let attendee = find_by_token(pool, token).await?;

    let dni = normalize_dni(raw_dni).ok_or_else(|| {
        AppError::Validation(FieldErrors::single(
            "dni",
            "El DNI debe tener 7 u 8 dígitos.",
        ))
    })?;

    if let Some(owner) = attendee_repo::find_by_dni(pool, &dni).await? {
        if owner.id != attendee.id {
            return Err(AppError::field_conflict(FieldErrors::single(
                "dni",
                "Este DNI ya está registrado por otro asistente.",
            )));
        }
    }

    attendee_repo::set_dni(pool, attendee.id, Some(&dni)).await?;
    info!("🪪 DNI updated for attendee {}", attendee.id);

    Ok(AttendeeRow {
        dni: Some(dni),
        dni_update_token: None,
        ..attendee
    })
}

async fn find_by_token(pool: &SqlitePool, token: &str) -> Result<AttendeeRow, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Validation(FieldErrors::single(
            "token",
            "Token requerido.",
        )));
    }
    attendee_repo::find_by_update_token(pool, token)
        .await?
        .ok_or_else(|| AppError::NotFound("Token inválido o ya utilizado.".to_string()))
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct NormalizeReport {
    pub checked: usize,
    pub normalized: usize,
    pub cleared_invalid: usize,
    pub cleared_duplicate: usize,
    pub tokens_assigned: usize,
    pub tokens_cleared: usize,
}

/// Cleans every stored DNI. Invalid or colliding values are nulled so the
/// attendee can be asked for it again through the token flow.
pub async fn normalize_all(pool: &SqlitePool) -> Result<NormalizeReport, AppError> {
    let attendees = attendee_repo::list_all(pool).await?;
    let mut report = NormalizeReport {
        checked: attendees.len(),
        ..Default::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    for attendee in attendees {
        let current = attendee.dni.as_deref().map(str::trim).filter(|d| !d.is_empty());
        let mut final_dni = match current {
            None => None,
            Some(raw) => match normalize_dni(raw) {
                Some(clean) if seen.contains(&clean) => {
                    warn!("🪪 duplicate DNI {} on attendee {} cleared", clean, attendee.id);
                    report.cleared_duplicate += 1;
                    None
                }
                Some(clean) => Some(clean),
                None => {
                    warn!("🪪 invalid DNI {:?} on attendee {} cleared", raw, attendee.id);
                    report.cleared_invalid += 1;
                    None
                }
            },
        };

        if final_dni.as_deref() != current {
            // Free the old value first so the unique index never sees two rows.
            attendee_repo::set_dni(pool, attendee.id, None).await?;
            if let Some(dni) = final_dni.clone() {
                if attendee_repo::dni_exists(pool, &dni).await? {
                    report.cleared_duplicate += 1;
                    final_dni = None;
                } else {
                    attendee_repo::set_dni(pool, attendee.id, Some(&dni)).await?;
                    report.normalized += 1;
                }
            }
        }

        match final_dni {
            Some(dni) => {
                seen.insert(dni);
                if attendee.dni_update_token.is_some() {
                    attendee_repo::set_update_token(pool, attendee.id, None).await?;
                    report.tokens_cleared += 1;
                }
            }
            None => {
                let has_token = attendee
                    .dni_update_token
                    .as_deref()
                    .is_some_and(|t| !t.is_empty());
                // set_dni clears the token, so only a row left untouched keeps it.
                let untouched = current.is_none();
                if !(has_token && untouched) {
                    let token = generate_update_token();
                    attendee_repo::set_update_token(pool, attendee.id, Some(&token)).await?;
                    report.tokens_assigned += 1;
                }
            }
        }
    }

    info!(
        "🪪 DNI normalization: {} checked, {} normalized, {} invalid, {} duplicates",
        report.checked, report.normalized, report.cleared_invalid, report.cleared_duplicate
    );
    Ok(report)
}
