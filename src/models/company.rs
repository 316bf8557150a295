use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CompanyRow {
    pub id: i64,
    pub name: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_position: Option<String>,
    pub participation: Option<String>,
    pub website: Option<String>,
    pub logo_path: Option<String>,
    pub created_at: DateTime<Utc>,
}
