use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileType {
    Visitor,
    Student,
    Teacher,
    Professional,
    Press,
    GroupRepresentative,
    Other,
}

impl ProfileType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileType::Visitor => "VISITOR",
            ProfileType::Student => "STUDENT",
            ProfileType::Teacher => "TEACHER",
            ProfileType::Professional => "PROFESSIONAL",
            ProfileType::Press => "PRESS",
            ProfileType::GroupRepresentative => "GROUP_REPRESENTATIVE",
            ProfileType::Other => "OTHER",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProfileType::Visitor => "Visitante",
            ProfileType::Student => "Estudiante",
            ProfileType::Teacher => "Docente",
            ProfileType::Professional => "Profesional",
            ProfileType::Press => "Prensa",
            ProfileType::GroupRepresentative => "Representante de grupo",
            ProfileType::Other => "Otro",
        }
    }

    /// Accepts the stored code, the frontend's camelCase values and the
    /// Spanish labels used in spreadsheets.
    pub fn parse(input: &str) -> Option<ProfileType> {
        let folded: String = input
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        let profile = match folded.as_str() {
            "visitor" | "visitante" | "" => ProfileType::Visitor,
            "student" | "estudiante" | "alumno" | "alumna" | "colaboradoraestudiante" => {
                ProfileType::Student
            }
            "teacher" | "docente" | "profesor" | "profesora" | "colaboradoradocente" => {
                ProfileType::Teacher
            }
            "professional" | "profesional" | "graduado" | "graduada" => {
                ProfileType::Professional
            }
            "press" | "prensa" => ProfileType::Press,
            "grouprepresentative" | "representantedegrupo" | "representante" => {
                ProfileType::GroupRepresentative
            }
            "other" | "otro" | "otra" => ProfileType::Other,
            _ => return None,
        };
        Some(profile)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendeeRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dni: Option<String>,
    pub dni_update_token: Option<String>,
    pub dni_requested_at: Option<DateTime<Utc>>,
    pub profile_type: String,
    pub is_unab_student: bool,
    pub institution: Option<String>,
    pub career: Option<String>,
    pub year_of_study: Option<i64>,
    pub career_taught: Option<String>,
    pub work_area: Option<String>,
    pub occupation: Option<String>,
    pub group_name: Option<String>,
    pub group_municipality: Option<String>,
    pub group_size: Option<i64>,
    pub representative_id: Option<i64>,
    pub company_id: Option<i64>,
    pub attendance_confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AttendeeRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub fn profile(&self) -> ProfileType {
        ProfileType::parse(&self.profile_type).unwrap_or(ProfileType::Other)
    }
}

/// Public representation returned by the registration and check-in endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AttendeeView {
    pub id: i64,
    pub nombre_completo: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dni: Option<String>,
    pub phone: Option<String>,
    pub profile_type: String,
    pub profile_label: &'static str,
    pub group_name: Option<String>,
    pub representative_id: Option<i64>,
    pub company_id: Option<i64>,
    pub attendance_confirmed: bool,
    pub asistencia_confirmada: bool,
    pub fecha_confirmacion: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&AttendeeRow> for AttendeeView {
    fn from(a: &AttendeeRow) -> Self {
        Self {
            id: a.id,
            nombre_completo: a.full_name(),
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            email: a.email.clone(),
            dni: a.dni.clone(),
            phone: a.phone.clone(),
            profile_type: a.profile_type.clone(),
            profile_label: a.profile().label(),
            group_name: a.group_name.clone(),
            representative_id: a.representative_id,
            company_id: a.company_id,
            attendance_confirmed: a.attendance_confirmed,
            asistencia_confirmada: a.attendance_confirmed,
            fecha_confirmacion: a.confirmed_at,
            created_at: a.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_spanish_labels() {
        assert_eq!(ProfileType::parse("STUDENT"), Some(ProfileType::Student));
        assert_eq!(
            ProfileType::parse("groupRepresentative"),
            Some(ProfileType::GroupRepresentative)
        );
        assert_eq!(ProfileType::parse("Docente"), Some(ProfileType::Teacher));
        assert_eq!(
            ProfileType::parse("Colaborador/a Docente"),
            Some(ProfileType::Teacher)
        );
        assert_eq!(ProfileType::parse("Graduado"), Some(ProfileType::Professional));
        assert_eq!(ProfileType::parse(""), Some(ProfileType::Visitor));
        assert_eq!(ProfileType::parse("astronauta"), None);
    }
}
