use chrono::{NaiveDate, NaiveTime};

// Joined with speakers; speaker columns are null for sessions without one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgramSessionRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub speaker_id: Option<i64>,
    pub speaker_name: Option<String>,
    pub speaker_slug: Option<String>,
    pub room: String,
    pub day: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}
