use chrono::{DateTime, Utc};

/// Opaque check-in token; consumed at most once.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QrCodeRow {
    pub id: i64,
    pub registration_id: i64,
    pub token: String,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
