use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;

use crate::models::{ProgramSessionRow, SpeakerRow};

const SQL_SESSION_SELECT: &str = r#"
SELECT
  p.id,
  p.title,
  p.description,
  p.speaker_id,
  s.name AS speaker_name,
  s.slug AS speaker_slug,
  p.room,
  p.day,
  p.start_time,
  p.end_time
FROM program_sessions p
LEFT JOIN speakers s ON s.id = p.speaker_id
"#;

pub async fn list_sessions(
    pool: &SqlitePool,
    day: Option<NaiveDate>,
    room: Option<&str>,
) -> sqlx::Result<Vec<ProgramSessionRow>> {
    sqlx::query_as::<_, ProgramSessionRow>(&format!(
        r#"{}
WHERE (?1 IS NULL OR p.day = ?1)
  AND (?2 IS NULL OR p.room = ?2)
ORDER BY p.day ASC, p.start_time ASC, p.room ASC
"#,
        SQL_SESSION_SELECT
    ))
    .bind(day)
    .bind(room)
    .fetch_all(pool)
    .await
}

pub async fn find_session(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<ProgramSessionRow>> {
    sqlx::query_as::<_, ProgramSessionRow>(&format!("{} WHERE p.id = ?1 LIMIT 1", SQL_SESSION_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_sessions_for_speaker(
    pool: &SqlitePool,
    speaker_id: i64,
) -> sqlx::Result<Vec<ProgramSessionRow>> {
    sqlx::query_as::<_, ProgramSessionRow>(&format!(
        "{} WHERE p.speaker_id = ?1 ORDER BY p.day ASC, p.start_time ASC",
        SQL_SESSION_SELECT
    ))
    .bind(speaker_id)
    .fetch_all(pool)
    .await
}

pub struct NewSession<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub speaker_id: Option<i64>,
    pub room: &'a str,
    pub day: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

pub async fn insert_session(pool: &SqlitePool, s: &NewSession<'_>) -> sqlx::Result<i64> {
    let res = sqlx::query(
        r#"
INSERT INTO program_sessions (title, description, speaker_id, room, day, start_time, end_time)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
    )
    .bind(s.title)
    .bind(s.description)
    .bind(s.speaker_id)
    .bind(s.room)
    .bind(s.day)
    .bind(s.start_time)
    .bind(s.end_time)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

const SQL_SPEAKER_SELECT: &str = r#"
SELECT id, slug, name, bio, photo_url, organization
FROM speakers
"#;

pub async fn list_speakers(pool: &SqlitePool) -> sqlx::Result<Vec<SpeakerRow>> {
    sqlx::query_as::<_, SpeakerRow>(&format!("{} ORDER BY name ASC", SQL_SPEAKER_SELECT))
        .fetch_all(pool)
        .await
}

pub async fn find_speaker_by_slug(pool: &SqlitePool, slug: &str) -> sqlx::Result<Option<SpeakerRow>> {
    sqlx::query_as::<_, SpeakerRow>(&format!("{} WHERE slug = ?1 LIMIT 1", SQL_SPEAKER_SELECT))
        .bind(slug)
        .fetch_optional(pool)
        .await
}

pub async fn find_speaker(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<SpeakerRow>> {
    sqlx::query_as::<_, SpeakerRow>(&format!("{} WHERE id = ?1 LIMIT 1", SQL_SPEAKER_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub struct NewSpeaker<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub bio: Option<&'a str>,
    pub photo_url: Option<&'a str>,
    pub organization: Option<&'a str>,
}

pub async fn insert_speaker(pool: &SqlitePool, s: &NewSpeaker<'_>) -> sqlx::Result<i64> {
    let res = sqlx::query(
        "INSERT INTO speakers (slug, name, bio, photo_url, organization) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(s.slug)
    .bind(s.name)
    .bind(s.bio)
    .bind(s.photo_url)
    .bind(s.organization)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}
