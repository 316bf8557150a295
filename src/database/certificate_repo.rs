use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::models::CertificateRow;

const SQL_CERTIFICATE_COLUMNS: &str = r#"
  c.id,
  c.attendee_id,
  c.kind,
  c.pdf_path,
  c.generated_at,
  c.sent_at,
  c.created_at
"#;

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<CertificateRow>> {
    sqlx::query_as::<_, CertificateRow>(&format!(
        "SELECT {} FROM certificates c WHERE c.id = ?1 LIMIT 1",
        SQL_CERTIFICATE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_for_attendee(
    pool: &SqlitePool,
    attendee_id: i64,
    kind: &str,
) -> sqlx::Result<Option<CertificateRow>> {
    sqlx::query_as::<_, CertificateRow>(&format!(
        "SELECT {} FROM certificates c WHERE c.attendee_id = ?1 AND c.kind = ?2 LIMIT 1",
        SQL_CERTIFICATE_COLUMNS
    ))
    .bind(attendee_id)
    .bind(kind)
    .fetch_optional(pool)
    .await
}

const SQL_INSERT_IF_MISSING: &str = r#"
INSERT INTO certificates (attendee_id, kind, created_at)
VALUES (?1, ?2, ?3)
ON CONFLICT (attendee_id, kind) DO NOTHING
"#;

/// Returns true when a new row was created.
pub async fn insert_if_missing(
    pool: &SqlitePool,
    attendee_id: i64,
    kind: &str,
    created_at: DateTime<Utc>,
) -> sqlx::Result<bool> {
    let res = sqlx::query(SQL_INSERT_IF_MISSING)
        .bind(attendee_id)
        .bind(kind)
        .bind(created_at)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

const SQL_CREATE_MISSING_FOR_CONFIRMED: &str = r#"
INSERT INTO certificates (attendee_id, kind, created_at)
SELECT a.id, ?1, ?2
FROM attendees a
WHERE a.attendance_confirmed = 1
ON CONFLICT (attendee_id, kind) DO NOTHING
"#;

/// Backfills one certificate of `kind` for every confirmed attendee lacking it.
pub async fn create_missing_for_confirmed(
    pool: &SqlitePool,
    kind: &str,
    created_at: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_CREATE_MISSING_FOR_CONFIRMED)
        .bind(kind)
        .bind(created_at)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn set_pdf(
    pool: &SqlitePool,
    id: i64,
    pdf_path: &str,
    generated_at: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE certificates SET pdf_path = ?1, generated_at = ?2 WHERE id = ?3")
        .bind(pdf_path)
        .bind(generated_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn mark_sent(pool: &SqlitePool, id: i64, sent_at: DateTime<Utc>) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE certificates SET sent_at = ?1 WHERE id = ?2")
        .bind(sent_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn list(
    pool: &SqlitePool,
    kind: Option<&str>,
    sent: Option<bool>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<CertificateRow>> {
    sqlx::query_as::<_, CertificateRow>(&format!(
        r#"
SELECT {}
FROM certificates c
WHERE (?1 IS NULL OR c.kind = ?1)
  AND (?2 IS NULL OR (?2 = 1 AND c.sent_at IS NOT NULL) OR (?2 = 0 AND c.sent_at IS NULL))
ORDER BY c.id DESC
LIMIT ?3 OFFSET ?4
"#,
        SQL_CERTIFICATE_COLUMNS
    ))
    .bind(kind)
    .bind(sent)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

const SQL_LIST_PENDING: &str = r#"
FROM certificates c
JOIN attendees a ON a.id = c.attendee_id
WHERE c.kind = ?1
  AND c.sent_at IS NULL
  AND a.attendance_confirmed = 1
  AND (?2 IS NULL OR date(a.confirmed_at, ?3) = ?2)
"#;

/// SQLite date modifier shifting a stored UTC timestamp to the event's
/// local day, e.g. `-180 minutes`.
fn local_day_modifier(utc_offset_minutes: i32) -> String {
    format!("{:+} minutes", utc_offset_minutes)
}

/// Unsent certificates of confirmed attendees, oldest confirmations first.
/// `confirmed_on` is a local calendar day at `utc_offset_minutes`.
pub async fn list_pending_send(
    pool: &SqlitePool,
    kind: &str,
    confirmed_on: Option<NaiveDate>,
    utc_offset_minutes: i32,
    limit: i64,
) -> sqlx::Result<Vec<CertificateRow>> {
    let confirmed_on = confirmed_on.map(|d| d.format("%Y-%m-%d").to_string());
    sqlx::query_as::<_, CertificateRow>(&format!(
        "SELECT {} {} ORDER BY a.confirmed_at ASC, c.id ASC LIMIT ?4",
        SQL_CERTIFICATE_COLUMNS, SQL_LIST_PENDING
    ))
    .bind(kind)
    .bind(confirmed_on)
    .bind(local_day_modifier(utc_offset_minutes))
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn count_pending_send(
    pool: &SqlitePool,
    kind: &str,
    confirmed_on: Option<NaiveDate>,
    utc_offset_minutes: i32,
) -> sqlx::Result<i64> {
    let confirmed_on = confirmed_on.map(|d| d.format("%Y-%m-%d").to_string());
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {}", SQL_LIST_PENDING))
        .bind(kind)
        .bind(confirmed_on)
        .bind(local_day_modifier(utc_offset_minutes))
        .fetch_one(pool)
        .await
}

pub async fn list_without_pdf(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<CertificateRow>> {
    sqlx::query_as::<_, CertificateRow>(&format!(
        "SELECT {} FROM certificates c WHERE c.pdf_path IS NULL ORDER BY c.id ASC LIMIT ?1",
        SQL_CERTIFICATE_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}
