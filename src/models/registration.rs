use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Individual,
    Group,
    OnSite,
    Import,
}

impl RegistrationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationKind::Individual => "INDIVIDUAL",
            RegistrationKind::Group => "GROUP",
            RegistrationKind::OnSite => "ON_SITE",
            RegistrationKind::Import => "IMPORT",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RegistrationKind::Individual => "Individual",
            RegistrationKind::Group => "Grupal",
            RegistrationKind::OnSite => "En el evento",
            RegistrationKind::Import => "Importada",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Registered,
    Attended,
    Certified,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Attended => "attended",
            RegistrationStatus::Certified => "certified",
        }
    }

    pub fn parse(input: &str) -> Option<RegistrationStatus> {
        match input.trim().to_lowercase().as_str() {
            "registered" => Some(RegistrationStatus::Registered),
            "attended" => Some(RegistrationStatus::Attended),
            "certified" => Some(RegistrationStatus::Certified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RegistrationRow {
    pub id: i64,
    pub attendee_id: i64,
    pub company_id: Option<i64>,
    pub event_name: String,
    pub kind: String,
    pub status: String,
    pub registered_at: DateTime<Utc>,
    pub attended_at: Option<DateTime<Utc>>,
    pub certified_at: Option<DateTime<Utc>>,
}
