use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};

use crate::models::QrCodeRow;

const SQL_QR_COLUMNS: &str = r#"
  id,
  registration_id,
  token,
  checked_in,
  checked_in_at,
  created_at
"#;

pub async fn find_by_token(pool: &SqlitePool, token: &str) -> sqlx::Result<Option<QrCodeRow>> {
    sqlx::query_as::<_, QrCodeRow>(&format!(
        "SELECT {} FROM qr_codes WHERE token = ?1 LIMIT 1",
        SQL_QR_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
}

const SQL_INSERT_QR: &str = r#"
INSERT INTO qr_codes (registration_id, token, checked_in, created_at)
VALUES (?, ?, 0, ?)
"#;

pub async fn insert_qr_code<'e, E>(
    executor: E,
    registration_id: i64,
    token: &str,
    created_at: DateTime<Utc>,
) -> sqlx::Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_INSERT_QR)
        .bind(registration_id)
        .bind(token)
        .bind(created_at)
        .execute(executor)
        .await?;
    Ok(res.last_insert_rowid())
}

const SQL_CONSUME_QR: &str = r#"
UPDATE qr_codes
SET checked_in = 1, checked_in_at = ?1
WHERE id = ?2
  AND checked_in = 0
"#;

/// Returns 0 when the code had already been consumed.
pub async fn consume(pool: &SqlitePool, id: i64, at: DateTime<Utc>) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_CONSUME_QR)
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
