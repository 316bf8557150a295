use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateKind {
    Attendance,
    Participation,
    Speaker,
}

impl CertificateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificateKind::Attendance => "ATTENDANCE",
            CertificateKind::Participation => "PARTICIPATION",
            CertificateKind::Speaker => "SPEAKER",
        }
    }

    pub fn parse(input: &str) -> Option<CertificateKind> {
        match input.trim().to_uppercase().as_str() {
            "ATTENDANCE" | "ASISTENCIA" => Some(CertificateKind::Attendance),
            "PARTICIPATION" | "PARTICIPACION" => Some(CertificateKind::Participation),
            "SPEAKER" | "DISERTANTE" => Some(CertificateKind::Speaker),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CertificateKind::Attendance => "Certificado de Asistencia",
            CertificateKind::Participation => "Certificado de Participación",
            CertificateKind::Speaker => "Certificado de Disertante",
        }
    }

    pub fn statement(self) -> &'static str {
        match self {
            CertificateKind::Attendance => "asistió al",
            CertificateKind::Participation => "participó en el",
            CertificateKind::Speaker => "participó como disertante en el",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CertificateRow {
    pub id: i64,
    pub attendee_id: i64,
    pub kind: String,
    pub pdf_path: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CertificateRow {
    pub fn kind(&self) -> CertificateKind {
        CertificateKind::parse(&self.kind).unwrap_or(CertificateKind::Attendance)
    }
}
