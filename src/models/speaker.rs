#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct SpeakerRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub organization: Option<String>,
}
