use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::database::program_repo::{self, NewSession, NewSpeaker};
use crate::error::{AppError, FieldErrors};
use crate::models::{ProgramSessionRow, SpeakerRow};
use crate::services::registration_service::clean;

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: i64,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub disertante: Option<String>,
    pub disertante_slug: Option<String>,
    pub sala: String,
    pub dia: NaiveDate,
    pub hora_inicio: String,
    pub hora_fin: String,
}

impl From<ProgramSessionRow> for SessionView {
    fn from(p: ProgramSessionRow) -> Self {
        Self {
            id: p.id,
            titulo: p.title,
            descripcion: p.description,
            disertante: p.speaker_name,
            disertante_slug: p.speaker_slug,
            sala: p.room,
            dia: p.day,
            hora_inicio: p.start_time.format("%H:%M").to_string(),
            hora_fin: p.end_time.format("%H:%M").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpeakerDetail {
    #[serde(flatten)]
    pub speaker: SpeakerRow,
    pub sesiones: Vec<SessionView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionFilter {
    #[serde(default, alias = "dia")]
    pub day: Option<NaiveDate>,
    #[serde(default, alias = "sala")]
    pub room: Option<String>,
}

pub async fn list_sessions(pool: &SqlitePool, filter: &SessionFilter) -> Result<Vec<SessionView>, AppError> {
    let room = clean(filter.room.as_deref());
    let rows = program_repo::list_sessions(pool, filter.day, room.as_deref()).await?;
    Ok(rows.into_iter().map(SessionView::from).collect())
}

pub async fn get_session(pool: &SqlitePool, id: i64) -> Result<SessionView, AppError> {
    program_repo::find_session(pool, id)
        .await?
        .map(SessionView::from)
        .ok_or_else(|| AppError::NotFound("Actividad no encontrada".to_string()))
}

pub async fn list_speakers(pool: &SqlitePool) -> Result<Vec<SpeakerRow>, AppError> {
    Ok(program_repo::list_speakers(pool).await?)
}

pub async fn get_speaker(pool: &SqlitePool, slug: &str) -> Result<SpeakerDetail, AppError> {
    let speaker = program_repo::find_speaker_by_slug(pool, slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Disertante no encontrado".to_string()))?;
    let sessions = program_repo::list_sessions_for_speaker(pool, speaker.id).await?;
    Ok(SpeakerDetail {
        speaker,
        sesiones: sessions.into_iter().map(SessionView::from).collect(),
    })
}

/// Lower-case ASCII words joined by dashes.
pub fn slugify(name: &str) -> String {
    let folded: String = name
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'Á' | 'À' | 'Ä' => 'a',
            'é' | 'è' | 'ë' | 'É' | 'È' | 'Ë' => 'e',
            'í' | 'ì' | 'ï' | 'Í' | 'Ì' | 'Ï' => 'i',
            'ó' | 'ò' | 'ö' | 'Ó' | 'Ò' | 'Ö' => 'o',
            'ú' | 'ù' | 'ü' | 'Ú' | 'Ù' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
            _ => ' ',
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join("-")
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeakerInput {
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default, alias = "foto")]
    pub photo_url: Option<String>,
    #[serde(default, alias = "organizacion")]
    pub organization: Option<String>,
}

pub async fn create_speaker(pool: &SqlitePool, input: SpeakerInput) -> Result<SpeakerRow, AppError> {
    let name = clean(input.name.as_deref()).ok_or_else(|| {
        AppError::Validation(FieldErrors::single("name", "Este campo es obligatorio."))
    })?;
    let slug = clean(input.slug.as_deref())
        .map(|s| slugify(&s))
        .unwrap_or_else(|| slugify(&name));
    if slug.is_empty() {
        return Err(AppError::Validation(FieldErrors::single("slug", "Slug inválido.")));
    }
    if program_repo::find_speaker_by_slug(pool, &slug).await?.is_some() {
        return Err(AppError::field_conflict(FieldErrors::single(
            "slug",
            "Ya existe un disertante con este slug.",
        )));
    }

    let bio = clean(input.bio.as_deref());
    let photo_url = clean(input.photo_url.as_deref());
    let organization = clean(input.organization.as_deref());
    let id = program_repo::insert_speaker(
        pool,
        &NewSpeaker {
            slug: &slug,
            name: &name,
            bio: bio.as_deref(),
            photo_url: photo_url.as_deref(),
            organization: organization.as_deref(),
        },
    )
    .await?;
    program_repo::find_speaker(pool, id)
        .await?
        .ok_or_else(|| AppError::Internal("speaker vanished after insert".to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionInput {
    #[serde(default, alias = "titulo")]
    pub title: Option<String>,
    #[serde(default, alias = "descripcion")]
    pub description: Option<String>,
    #[serde(default, alias = "disertante_id")]
    pub speaker_id: Option<i64>,
    #[serde(default, alias = "sala")]
    pub room: Option<String>,
    #[serde(default, alias = "dia")]
    pub day: Option<String>,
    #[serde(default, alias = "hora_inicio")]
    pub start_time: Option<String>,
    #[serde(default, alias = "hora_fin")]
    pub end_time: Option<String>,
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Sessions may overlap; only `start < end` is checked.
pub async fn create_session(pool: &SqlitePool, input: SessionInput) -> Result<SessionView, AppError> {
    let mut errors = FieldErrors::new();
    let title = clean(input.title.as_deref());
    if title.is_none() {
        errors.add("title", "Este campo es obligatorio.");
    }
    let room = clean(input.room.as_deref());
    if room.is_none() {
        errors.add("room", "Este campo es obligatorio.");
    }
    let day = clean(input.day.as_deref())
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
    if day.is_none() {
        errors.add("day", "Fecha inválida (AAAA-MM-DD).");
    }
    let start = clean(input.start_time.as_deref()).and_then(|t| parse_time(&t));
    let end = clean(input.end_time.as_deref()).and_then(|t| parse_time(&t));
    if start.is_none() {
        errors.add("start_time", "Hora inválida (HH:MM).");
    }
    if end.is_none() {
        errors.add("end_time", "Hora inválida (HH:MM).");
    }
    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            errors.add("end_time", "La hora de fin debe ser posterior al inicio.");
        }
    }
    if let Some(speaker_id) = input.speaker_id {
        if program_repo::find_speaker(pool, speaker_id).await?.is_none() {
            errors.add("speaker_id", "El disertante indicado no existe.");
        }
    }
    errors.into_result()?;

    let (Some(title), Some(room), Some(day), Some(start_time), Some(end_time)) =
        (title, room, day, start, end)
    else {
        return Err(AppError::Internal("validated session fields missing".to_string()));
    };
    let description = clean(input.description.as_deref());
    let id = program_repo::insert_session(
        pool,
        &NewSession {
            title: &title,
            description: description.as_deref(),
            speaker_id: input.speaker_id,
            room: &room,
            day,
            start_time,
            end_time,
        },
    )
    .await?;
    get_session(pool, id).await
}
