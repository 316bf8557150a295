use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::CompanyRow;

const SQL_COMPANY_COLUMNS: &str = r#"
  id,
  name,
  contact_name,
  contact_email,
  contact_phone,
  contact_position,
  participation,
  website,
  logo_path,
  created_at
"#;

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<CompanyRow>> {
    sqlx::query_as::<_, CompanyRow>(&format!(
        "SELECT {} FROM companies WHERE id = ?1 LIMIT 1",
        SQL_COMPANY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Option<CompanyRow>> {
    sqlx::query_as::<_, CompanyRow>(&format!(
        "SELECT {} FROM companies WHERE name = ?1 COLLATE NOCASE LIMIT 1",
        SQL_COMPANY_COLUMNS
    ))
    .bind(name)
    .fetch_optional(pool)
    .await
}

/// Name search; an empty query lists everything alphabetically.
pub async fn search(pool: &SqlitePool, q: &str, limit: i64) -> sqlx::Result<Vec<CompanyRow>> {
    let like = format!("%{}%", q.trim().to_lowercase());
    sqlx::query_as::<_, CompanyRow>(&format!(
        r#"
SELECT {}
FROM companies
WHERE (?1 = '%%'
  OR lower(name) LIKE ?1
  OR lower(COALESCE(contact_email, '')) LIKE ?1
  OR lower(COALESCE(contact_name, '')) LIKE ?1)
ORDER BY name COLLATE NOCASE ASC
LIMIT ?2
"#,
        SQL_COMPANY_COLUMNS
    ))
    .bind(like)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub struct NewCompany<'a> {
    pub name: &'a str,
    pub contact_name: Option<&'a str>,
    pub contact_email: Option<&'a str>,
    pub contact_phone: Option<&'a str>,
    pub contact_position: Option<&'a str>,
    pub participation: Option<&'a str>,
    pub website: Option<&'a str>,
    pub logo_path: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

const SQL_INSERT_COMPANY: &str = r#"
INSERT INTO companies (
  name,
  contact_name,
  contact_email,
  contact_phone,
  contact_position,
  participation,
  website,
  logo_path,
  created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub async fn insert_company(pool: &SqlitePool, c: &NewCompany<'_>) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_COMPANY)
        .bind(c.name)
        .bind(c.contact_name)
        .bind(c.contact_email)
        .bind(c.contact_phone)
        .bind(c.contact_position)
        .bind(c.participation)
        .bind(c.website)
        .bind(c.logo_path)
        .bind(c.created_at)
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}
