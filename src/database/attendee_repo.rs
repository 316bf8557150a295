use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::AttendeeRow;

const SQL_ATTENDEE_COLUMNS: &str = r#"
  id,
  first_name,
  last_name,
  email,
  phone,
  dni,
  dni_update_token,
  dni_requested_at,
  profile_type,
  is_unab_student,
  institution,
  career,
  year_of_study,
  career_taught,
  work_area,
  occupation,
  group_name,
  group_municipality,
  group_size,
  representative_id,
  company_id,
  attendance_confirmed,
  confirmed_at,
  created_at
"#;

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM attendees WHERE {}", SQL_ATTENDEE_COLUMNS, clause)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(&select_where("id = ?1 LIMIT 1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(&select_where("email = ?1 LIMIT 1"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_dni(pool: &SqlitePool, dni: &str) -> sqlx::Result<Option<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(&select_where("dni = ?1 LIMIT 1"))
        .bind(dni)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_update_token(
    pool: &SqlitePool,
    token: &str,
) -> sqlx::Result<Option<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(&select_where("dni_update_token = ?1 LIMIT 1"))
        .bind(token)
        .fetch_optional(pool)
        .await
}

pub async fn list_members(pool: &SqlitePool, representative_id: i64) -> sqlx::Result<Vec<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(&select_where("representative_id = ?1 ORDER BY id ASC"))
        .bind(representative_id)
        .fetch_all(pool)
        .await
}

pub async fn list_all(pool: &SqlitePool) -> sqlx::Result<Vec<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(&select_where("1 = 1 ORDER BY id ASC"))
        .fetch_all(pool)
        .await
}

const SQL_PENDING_DNI_REQUEST: &str =
    "(dni IS NULL OR dni = '') AND dni_requested_at IS NULL";

/// Attendees without DNI who have not been asked for it yet.
pub async fn list_pending_dni_request(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(&select_where(&format!(
        "{} ORDER BY id ASC LIMIT ?1",
        SQL_PENDING_DNI_REQUEST
    )))
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn count_pending_dni_request(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM attendees WHERE {}",
        SQL_PENDING_DNI_REQUEST
    ))
    .fetch_one(pool)
    .await
}

pub async fn mark_dni_requested(pool: &SqlitePool, id: i64, at: DateTime<Utc>) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE attendees SET dni_requested_at = ?1 WHERE id = ?2")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

#[derive(Debug, Default, Clone)]
pub struct AttendeeFilter {
    pub q: Option<String>,
    pub profile_type: Option<String>,
    pub confirmed: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a AttendeeFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{}%", q.to_lowercase());
        builder.push(" AND (lower(first_name) LIKE ");
        builder.push_bind(like.clone());
        builder.push(" OR lower(last_name) LIKE ");
        builder.push_bind(like.clone());
        builder.push(" OR email LIKE ");
        builder.push_bind(like.clone());
        builder.push(" OR COALESCE(dni, '') LIKE ");
        builder.push_bind(like);
        builder.push(")");
    }
    if let Some(profile) = filter.profile_type.as_deref() {
        builder.push(" AND profile_type = ");
        builder.push_bind(profile);
    }
    if let Some(confirmed) = filter.confirmed {
        builder.push(" AND attendance_confirmed = ");
        builder.push_bind(confirmed);
    }
}

pub async fn search(pool: &SqlitePool, filter: &AttendeeFilter) -> sqlx::Result<Vec<AttendeeRow>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM attendees",
        SQL_ATTENDEE_COLUMNS
    ));
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(filter.limit);
    builder.push(" OFFSET ");
    builder.push_bind(filter.offset);
    builder
        .build_query_as::<AttendeeRow>()
        .fetch_all(pool)
        .await
}

pub async fn count(pool: &SqlitePool, filter: &AttendeeFilter) -> sqlx::Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM attendees");
    push_filter(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub struct NewAttendee<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub dni: Option<&'a str>,
    pub dni_update_token: Option<&'a str>,
    pub profile_type: &'a str,
    pub is_unab_student: bool,
    pub institution: Option<&'a str>,
    pub career: Option<&'a str>,
    pub year_of_study: Option<i64>,
    pub career_taught: Option<&'a str>,
    pub work_area: Option<&'a str>,
    pub occupation: Option<&'a str>,
    pub group_name: Option<&'a str>,
    pub group_municipality: Option<&'a str>,
    pub group_size: Option<i64>,
    pub representative_id: Option<i64>,
    pub company_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

const SQL_INSERT_ATTENDEE: &str = r#"
INSERT INTO attendees (
  first_name,
  last_name,
  email,
  phone,
  dni,
  dni_update_token,
  profile_type,
  is_unab_student,
  institution,
  career,
  year_of_study,
  career_taught,
  work_area,
  occupation,
  group_name,
  group_municipality,
  group_size,
  representative_id,
  company_id,
  created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub async fn insert_attendee<'e, E>(executor: E, a: &NewAttendee<'_>) -> sqlx::Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_INSERT_ATTENDEE)
        .bind(a.first_name)
        .bind(a.last_name)
        .bind(a.email)
        .bind(a.phone)
        .bind(a.dni)
        .bind(a.dni_update_token)
        .bind(a.profile_type)
        .bind(a.is_unab_student)
        .bind(a.institution)
        .bind(a.career)
        .bind(a.year_of_study)
        .bind(a.career_taught)
        .bind(a.work_area)
        .bind(a.occupation)
        .bind(a.group_name)
        .bind(a.group_municipality)
        .bind(a.group_size)
        .bind(a.representative_id)
        .bind(a.company_id)
        .bind(a.created_at)
        .execute(executor)
        .await?;
    Ok(res.last_insert_rowid())
}

const SQL_CONFIRM_ATTENDANCE: &str = r#"
UPDATE attendees
SET attendance_confirmed = 1, confirmed_at = ?1
WHERE id = ?2
  AND attendance_confirmed = 0
"#;

/// Returns 0 when the attendee was already confirmed.
pub async fn confirm_attendance<'e, E>(executor: E, id: i64, at: DateTime<Utc>) -> sqlx::Result<u64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(SQL_CONFIRM_ATTENDANCE)
        .bind(at)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

const SQL_SET_DNI: &str = r#"
UPDATE attendees
SET dni = ?1, dni_update_token = NULL
WHERE id = ?2
"#;

pub async fn set_dni(pool: &SqlitePool, id: i64, dni: Option<&str>) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SET_DNI)
        .bind(dni)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

const SQL_SET_UPDATE_TOKEN: &str = r#"
UPDATE attendees
SET dni_update_token = ?1
WHERE id = ?2
"#;

pub async fn set_update_token(pool: &SqlitePool, id: i64, token: Option<&str>) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SET_UPDATE_TOKEN)
        .bind(token)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn email_exists(pool: &SqlitePool, email: &str) -> sqlx::Result<bool> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendees WHERE email = ?1")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}

pub async fn dni_exists(pool: &SqlitePool, dni: &str) -> sqlx::Result<bool> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendees WHERE dni = ?1")
        .bind(dni)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}
