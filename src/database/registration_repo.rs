use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};

use crate::models::RegistrationRow;

const SQL_REGISTRATION_COLUMNS: &str = r#"
  id,
  attendee_id,
  company_id,
  event_name,
  kind,
  status,
  registered_at,
  attended_at,
  certified_at
"#;

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(&format!(
        "SELECT {} FROM registrations WHERE id = ?1 LIMIT 1",
        SQL_REGISTRATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_attendee(
    pool: &SqlitePool,
    attendee_id: i64,
) -> sqlx::Result<Option<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(&format!(
        "SELECT {} FROM registrations WHERE attendee_id = ?1 LIMIT 1",
        SQL_REGISTRATION_COLUMNS
    ))
    .bind(attendee_id)
    .fetch_optional(pool)
    .await
}

pub async fn list(
    pool: &SqlitePool,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(&format!(
        r#"
SELECT {}
FROM registrations
WHERE (?1 IS NULL OR status = ?1)
ORDER BY id DESC
LIMIT ?2 OFFSET ?3
"#,
        SQL_REGISTRATION_COLUMNS
    ))
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub struct NewRegistration<'a> {
    pub attendee_id: i64,
    pub company_id: Option<i64>,
    pub event_name: &'a str,
    pub kind: &'a str,
    pub registered_at: DateTime<Utc>,
}

const SQL_INSERT_REGISTRATION: &str = r#"
INSERT INTO registrations (
  attendee_id,
  company_id,
  event_name,
  kind,
  status,
  registered_at
) VALUES (?, ?, ?, ?, 'registered', ?)
"#;

pub async fn insert_registration<'e, E>(executor: E, r: &NewRegistration<'_>) -> sqlx::Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_INSERT_REGISTRATION)
        .bind(r.attendee_id)
        .bind(r.company_id)
        .bind(r.event_name)
        .bind(r.kind)
        .bind(r.registered_at)
        .execute(executor)
        .await?;
    Ok(res.last_insert_rowid())
}

const SQL_MARK_ATTENDED: &str = r#"
UPDATE registrations
SET status = 'attended', attended_at = COALESCE(attended_at, ?1)
WHERE attendee_id = ?2
  AND status = 'registered'
"#;

pub async fn mark_attended<'e, E>(executor: E, attendee_id: i64, at: DateTime<Utc>) -> sqlx::Result<u64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_MARK_ATTENDED)
        .bind(at)
        .bind(attendee_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

const SQL_MARK_CERTIFIED: &str = r#"
UPDATE registrations
SET status = 'certified',
    attended_at = COALESCE(attended_at, ?1),
    certified_at = ?1
WHERE attendee_id = ?2
"#;

pub async fn mark_certified(
    pool: &SqlitePool,
    attendee_id: i64,
    at: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_MARK_CERTIFIED)
        .bind(at)
        .bind(attendee_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
