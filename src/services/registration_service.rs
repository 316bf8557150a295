use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::database::attendee_repo::{self, NewAttendee};
use crate::database::registration_repo::{self, NewRegistration};
use crate::database::{company_repo, qr_code_repo};
use crate::error::{AppError, FieldErrors};
use crate::models::{AttendeeRow, ProfileType, RegistrationKind};
use crate::services::checkin_service::{self, CheckInOutcome};
use crate::services::dni_service::normalize_dni;
use crate::services::{email_service, qr_service};
use crate::state::AppState;

pub const UNAB_INSTITUTION: &str = "UNaB";

const MSG_REQUIRED: &str = "Este campo es obligatorio.";
const MSG_DNI: &str = "El DNI debe tener 7 u 8 dígitos.";
const MSG_EMAIL: &str = "Ingresá un email válido.";
const MSG_EMAIL_TAKEN: &str = "Ya existe una inscripción con este email.";
const MSG_DNI_TAKEN: &str = "Ya existe una inscripción con este DNI.";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AttendeeInput {
    #[serde(default, alias = "firstName", alias = "nombre")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName", alias = "apellido")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dni: Option<String>,
    #[serde(default, alias = "profileType", alias = "participant_type")]
    pub profile_type: Option<String>,
    #[serde(default, alias = "isUnabStudent", deserialize_with = "lenient_bool")]
    pub is_unab_student: Option<bool>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub career: Option<String>,
    #[serde(default, alias = "yearOfStudy", deserialize_with = "lenient_i64")]
    pub year_of_study: Option<i64>,
    #[serde(default, alias = "careerTaught")]
    pub career_taught: Option<String>,
    #[serde(default, alias = "workArea")]
    pub work_area: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default, alias = "groupName")]
    pub group_name: Option<String>,
    #[serde(default, alias = "groupMunicipality")]
    pub group_municipality: Option<String>,
    #[serde(default, alias = "groupSize", deserialize_with = "lenient_i64")]
    pub group_size: Option<i64>,
    #[serde(
        default,
        alias = "companyId",
        alias = "empresa",
        deserialize_with = "lenient_i64"
    )]
    pub company_id: Option<i64>,
    #[serde(default, alias = "groupMembers", alias = "miembros")]
    pub members: Vec<MemberInput>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct MemberInput {
    #[serde(default, alias = "firstName", alias = "nombre")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName", alias = "apellido")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dni: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
}

/// The individual form posts `{ "asistente": {...} }`; other clients post the
/// attendee object directly.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RegistrationPayload {
    Wrapped { asistente: AttendeeInput },
    Flat(AttendeeInput),
}

impl RegistrationPayload {
    pub fn into_input(self) -> AttendeeInput {
        match self {
            RegistrationPayload::Wrapped { asistente } => asistente,
            RegistrationPayload::Flat(input) => input,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct QuickAttendee {
    #[serde(default)]
    pub nombre_completo: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dni: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct QuickInput {
    #[serde(default)]
    pub tipo_inscripcion: Option<String>,
    #[serde(default)]
    pub asistente: QuickAttendee,
    #[serde(default, alias = "company_id", deserialize_with = "lenient_i64")]
    pub empresa: Option<i64>,
    #[serde(default)]
    pub nombre_grupo: Option<String>,
}

/// Validated, trimmed attendee data ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanAttendee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dni: Option<String>,
    pub profile: ProfileType,
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
    pub company_id: Option<i64>,
}

impl CleanAttendee {
    fn as_new<'a>(
        &'a self,
        representative_id: Option<i64>,
        dni_update_token: Option<&'a str>,
        created_at: DateTime<Utc>,
    ) -> NewAttendee<'a> {
        NewAttendee {
            first_name: &self.first_name,
            last_name: &self.last_name,
            email: &self.email,
            phone: self.phone.as_deref(),
            dni: self.dni.as_deref(),
            dni_update_token,
            profile_type: self.profile.as_str(),
            is_unab_student: self.is_unab_student,
            institution: self.institution.as_deref(),
            career: self.career.as_deref(),
            year_of_study: self.year_of_study,
            career_taught: self.career_taught.as_deref(),
            work_area: self.work_area.as_deref(),
            occupation: self.occupation.as_deref(),
            group_name: self.group_name.as_deref(),
            group_municipality: self.group_municipality.as_deref(),
            group_size: self.group_size,
            representative_id,
            company_id: self.company_id,
            created_at,
        }
    }
}

#[derive(Debug)]
pub struct RegistrationOutcome {
    pub attendee: AttendeeRow,
    pub registration_id: i64,
    pub qr_token: String,
    pub email_sent: bool,
}

#[derive(Debug)]
pub struct GroupOutcome {
    pub representative: RegistrationOutcome,
    pub members: Vec<RegistrationOutcome>,
}

pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn require(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    let value = clean(value);
    if value.is_none() {
        errors.add(field, MSG_REQUIRED);
    }
    value
}

fn validate_email(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> String {
    match clean(value) {
        None => {
            errors.add(field, MSG_REQUIRED);
            String::new()
        }
        Some(email) => {
            let email = email.to_lowercase();
            if !is_valid_email(&email) {
                errors.add(field, MSG_EMAIL);
            }
            email
        }
    }
}

fn validate_dni(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    match clean(value) {
        None => {
            errors.add(field, MSG_REQUIRED);
            None
        }
        Some(raw) => {
            let dni = normalize_dni(&raw);
            if dni.is_none() {
                errors.add(field, MSG_DNI);
            }
            dni
        }
    }
}

/// Common fields plus the profile-conditional rules. Group members are
/// validated separately by [`validate_members`].
pub fn validate_attendee(input: &AttendeeInput) -> Result<CleanAttendee, FieldErrors> {
    let mut errors = FieldErrors::new();

    let first_name = require(&mut errors, "first_name", input.first_name.as_deref());
    let last_name = require(&mut errors, "last_name", input.last_name.as_deref());
    let email = validate_email(&mut errors, "email", input.email.as_deref());
    let dni = validate_dni(&mut errors, "dni", input.dni.as_deref());

    let profile = match clean(input.profile_type.as_deref()) {
        None => ProfileType::Visitor,
        Some(raw) => ProfileType::parse(&raw).unwrap_or_else(|| {
            errors.add("profile_type", "Tipo de perfil inválido.");
            ProfileType::Other
        }),
    };

    let is_unab_student = input.is_unab_student.unwrap_or(false);
    let mut institution = clean(input.institution.as_deref());
    let mut career = clean(input.career.as_deref());
    let mut year_of_study = input.year_of_study;
    let mut career_taught = clean(input.career_taught.as_deref());
    let mut work_area = clean(input.work_area.as_deref());
    let mut occupation = clean(input.occupation.as_deref());
    let mut group_name = clean(input.group_name.as_deref());
    let mut group_municipality = clean(input.group_municipality.as_deref());
    let mut group_size = input.group_size;

    match profile {
        ProfileType::Student => {
            if is_unab_student {
                institution.get_or_insert_with(|| UNAB_INSTITUTION.to_string());
            } else if institution.is_none() {
                errors.add("institution", MSG_REQUIRED);
            }
            if career.is_none() {
                errors.add("career", MSG_REQUIRED);
            }
            match year_of_study {
                None => errors.add("year_of_study", MSG_REQUIRED),
                Some(y) if !(1..=10).contains(&y) => {
                    errors.add("year_of_study", "El año de cursada debe estar entre 1 y 10.")
                }
                _ => {}
            }
        }
        ProfileType::Teacher => {
            if institution.is_none() {
                errors.add("institution", MSG_REQUIRED);
            }
            if career_taught.is_none() {
                errors.add("career_taught", MSG_REQUIRED);
            }
        }
        ProfileType::Professional => {
            if work_area.is_none() {
                errors.add("work_area", MSG_REQUIRED);
            }
            if occupation.is_none() {
                errors.add("occupation", MSG_REQUIRED);
            }
        }
        ProfileType::GroupRepresentative => {
            if group_name.is_none() {
                errors.add("group_name", MSG_REQUIRED);
            }
            match group_size {
                None => errors.add("group_size", MSG_REQUIRED),
                Some(n) if n < 1 => errors.add("group_size", "El grupo debe tener al menos 1 integrante."),
                Some(n) if n as usize != input.members.len() => errors.add(
                    "group_size",
                    format!(
                        "La cantidad de integrantes ({}) no coincide con el tamaño del grupo ({}).",
                        input.members.len(),
                        n
                    ),
                ),
                _ => {}
            }
        }
        ProfileType::Visitor | ProfileType::Press | ProfileType::Other => {}
    }

    // Fields that do not belong to the chosen profile are dropped.
    if profile != ProfileType::Student {
        career = None;
        year_of_study = None;
    }
    if !matches!(profile, ProfileType::Student | ProfileType::Teacher) {
        institution = None;
    }
    if profile != ProfileType::Teacher {
        career_taught = None;
    }
    if profile != ProfileType::Professional {
        work_area = None;
        occupation = None;
    }
    if profile != ProfileType::GroupRepresentative {
        group_name = None;
        group_municipality = None;
        group_size = None;
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(CleanAttendee {
        first_name: first_name.unwrap_or_default(),
        last_name: last_name.unwrap_or_default(),
        email,
        phone: clean(input.phone.as_deref()),
        dni,
        profile,
        is_unab_student: profile == ProfileType::Student && is_unab_student,
        institution,
        career,
        year_of_study,
        career_taught,
        work_area,
        occupation,
        group_name,
        group_municipality,
        group_size,
        company_id: input.company_id,
    })
}

/// Members must each carry names, DNI and email, and may not repeat an email
/// or DNI already present in the same payload.
pub fn validate_members(
    representative: &CleanAttendee,
    members: &[MemberInput],
) -> Result<Vec<CleanAttendee>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut seen_emails: HashMap<String, String> = HashMap::new();
    let mut seen_dnis: HashMap<String, String> = HashMap::new();
    seen_emails.insert(representative.email.clone(), "email".to_string());
    if let Some(dni) = &representative.dni {
        seen_dnis.insert(dni.clone(), "dni".to_string());
    }

    let mut out = Vec::with_capacity(members.len());
    for (i, m) in members.iter().enumerate() {
        let field = |name: &str| format!("members[{}].{}", i, name);
        let first_name = require(&mut errors, &field("first_name"), m.first_name.as_deref());
        let last_name = require(&mut errors, &field("last_name"), m.last_name.as_deref());
        let email = validate_email(&mut errors, &field("email"), m.email.as_deref());
        let dni = validate_dni(&mut errors, &field("dni"), m.dni.as_deref());

        if !email.is_empty() {
            if let Some(other) = seen_emails.get(&email) {
                errors.add(field("email"), format!("Email repetido (ya usado en {}).", other));
            } else {
                seen_emails.insert(email.clone(), field("email"));
            }
        }
        if let Some(d) = &dni {
            if let Some(other) = seen_dnis.get(d) {
                errors.add(field("dni"), format!("DNI repetido (ya usado en {}).", other));
            } else {
                seen_dnis.insert(d.clone(), field("dni"));
            }
        }

        out.push(CleanAttendee {
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
            email,
            phone: clean(m.phone.as_deref()),
            dni,
            profile: ProfileType::Visitor,
            is_unab_student: false,
            institution: None,
            career: None,
            year_of_study: None,
            career_taught: None,
            work_area: None,
            occupation: None,
            group_name: None,
            group_municipality: None,
            group_size: None,
            company_id: representative.company_id,
        });
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

async fn check_duplicates(
    state: &AppState,
    attendee: &CleanAttendee,
    email_field: &str,
    dni_field: &str,
    errors: &mut FieldErrors,
) -> Result<(), AppError> {
    if attendee_repo::email_exists(&state.pool, &attendee.email).await? {
        errors.add(email_field, MSG_EMAIL_TAKEN);
    }
    if let Some(dni) = &attendee.dni {
        if attendee_repo::dni_exists(&state.pool, dni).await? {
            errors.add(dni_field, MSG_DNI_TAKEN);
        }
    }
    Ok(())
}

async fn check_company(state: &AppState, company_id: Option<i64>) -> Result<Option<String>, AppError> {
    let Some(id) = company_id else {
        return Ok(None);
    };
    match company_repo::find_by_id(&state.pool, id).await? {
        Some(company) => Ok(Some(company.name)),
        None => Err(AppError::Validation(FieldErrors::single(
            "company_id",
            "La empresa indicada no existe.",
        ))),
    }
}

struct Inserted {
    attendee_id: i64,
    registration_id: i64,
    qr_token: String,
}

async fn insert_with_registration(
    conn: &mut sqlx::SqliteConnection,
    attendee: &CleanAttendee,
    representative_id: Option<i64>,
    kind: RegistrationKind,
    event_name: &str,
    now: DateTime<Utc>,
) -> sqlx::Result<Inserted> {
    let attendee_id =
        attendee_repo::insert_attendee(&mut *conn, &attendee.as_new(representative_id, None, now))
            .await?;
    let registration_id = registration_repo::insert_registration(
        &mut *conn,
        &NewRegistration {
            attendee_id,
            company_id: attendee.company_id,
            event_name,
            kind: kind.as_str(),
            registered_at: now,
        },
    )
    .await?;
    let qr_token = uuid::Uuid::new_v4().to_string();
    qr_code_repo::insert_qr_code(&mut *conn, registration_id, &qr_token, now).await?;
    Ok(Inserted {
        attendee_id,
        registration_id,
        qr_token,
    })
}

async fn load_outcome(state: &AppState, inserted: Inserted) -> Result<RegistrationOutcome, AppError> {
    let attendee = attendee_repo::find_by_id(&state.pool, inserted.attendee_id)
        .await?
        .ok_or_else(|| AppError::Internal("attendee vanished after insert".to_string()))?;
    Ok(RegistrationOutcome {
        attendee,
        registration_id: inserted.registration_id,
        qr_token: inserted.qr_token,
        email_sent: false,
    })
}

/// Best-effort: failures are logged and reported as `false`.
pub async fn send_confirmation(
    state: &AppState,
    attendee: &AttendeeRow,
    kind: RegistrationKind,
    company_name: Option<&str>,
    qr_token: &str,
) -> bool {
    let result = async {
        let png = qr_service::render_png(qr_token)?;
        let email = email_service::confirmation_email(&state.config, attendee, kind, company_name, png)?;
        state.mailer.send(email).await?;
        Ok::<(), AppError>(())
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Confirmation email to {} failed: {}", attendee.email, e);
            false
        }
    }
}

pub async fn register_attendee(state: &AppState, input: AttendeeInput) -> Result<RegistrationOutcome, AppError> {
    let attendee = validate_attendee(&input).map_err(AppError::Validation)?;
    if attendee.profile == ProfileType::GroupRepresentative {
        return register_group(state, input).await.map(|g| g.representative);
    }

    let company_name = check_company(state, attendee.company_id).await?;

    let mut conflicts = FieldErrors::new();
    check_duplicates(state, &attendee, "email", "dni", &mut conflicts).await?;
    if !conflicts.is_empty() {
        return Err(AppError::field_conflict(conflicts));
    }

    let now = Utc::now();
    let mut tx = state.pool.begin().await?;
    let inserted = insert_with_registration(
        &mut tx,
        &attendee,
        None,
        RegistrationKind::Individual,
        &state.config.event_name,
        now,
    )
    .await?;
    tx.commit().await?;

    let mut outcome = load_outcome(state, inserted).await?;
    info!(
        "📝 registered attendee {} ({})",
        outcome.attendee.id,
        outcome.attendee.profile_type
    );
    outcome.email_sent = send_confirmation(
        state,
        &outcome.attendee,
        RegistrationKind::Individual,
        company_name.as_deref(),
        &outcome.qr_token,
    )
    .await;
    Ok(outcome)
}

pub async fn register_group(state: &AppState, mut input: AttendeeInput) -> Result<GroupOutcome, AppError> {
    input.profile_type = Some(ProfileType::GroupRepresentative.as_str().to_string());

    let (representative, members) = match validate_attendee(&input) {
        Ok(rep) => match validate_members(&rep, &input.members) {
            Ok(members) => (rep, members),
            Err(errors) => return Err(AppError::Validation(errors)),
        },
        Err(mut errors) => {
            // Still report member problems in the same response.
            let placeholder = CleanAttendee {
                first_name: String::new(),
                last_name: String::new(),
                email: clean(input.email.as_deref()).unwrap_or_default().to_lowercase(),
                phone: None,
                dni: input.dni.as_deref().and_then(normalize_dni),
                profile: ProfileType::GroupRepresentative,
                is_unab_student: false,
                institution: None,
                career: None,
                year_of_study: None,
                career_taught: None,
                work_area: None,
                occupation: None,
                group_name: None,
                group_municipality: None,
                group_size: None,
                company_id: input.company_id,
            };
            if let Err(member_errors) = validate_members(&placeholder, &input.members) {
                for (field, messages) in member_errors.0 {
                    for message in messages {
                        errors.add(field.clone(), message);
                    }
                }
            }
            return Err(AppError::Validation(errors));
        }
    };

    let company_name = check_company(state, representative.company_id).await?;

    let mut conflicts = FieldErrors::new();
    check_duplicates(state, &representative, "email", "dni", &mut conflicts).await?;
    for (i, member) in members.iter().enumerate() {
        check_duplicates(
            state,
            member,
            &format!("members[{}].email", i),
            &format!("members[{}].dni", i),
            &mut conflicts,
        )
        .await?;
    }
    if !conflicts.is_empty() {
        return Err(AppError::field_conflict(conflicts));
    }

    let now = Utc::now();
    let event_name = state.config.event_name.as_str();
    let mut tx = state.pool.begin().await?;
    let rep_inserted = insert_with_registration(
        &mut tx,
        &representative,
        None,
        RegistrationKind::Group,
        event_name,
        now,
    )
    .await?;
    let mut member_inserted = Vec::with_capacity(members.len());
    for member in &members {
        member_inserted.push(
            insert_with_registration(
                &mut tx,
                member,
                Some(rep_inserted.attendee_id),
                RegistrationKind::Group,
                event_name,
                now,
            )
            .await?,
        );
    }
    tx.commit().await?;

    let mut rep = load_outcome(state, rep_inserted).await?;
    let mut member_outcomes = Vec::with_capacity(member_inserted.len());
    for inserted in member_inserted {
        member_outcomes.push(load_outcome(state, inserted).await?);
    }
    info!(
        "👥 registered group {:?} with {} members",
        rep.attendee.group_name,
        member_outcomes.len()
    );

    rep.email_sent = send_confirmation(
        state,
        &rep.attendee,
        RegistrationKind::Group,
        company_name.as_deref(),
        &rep.qr_token,
    )
    .await;
    for member in &mut member_outcomes {
        member.email_sent = send_confirmation(
            state,
            &member.attendee,
            RegistrationKind::Group,
            company_name.as_deref(),
            &member.qr_token,
        )
        .await;
    }

    Ok(GroupOutcome {
        representative: rep,
        members: member_outcomes,
    })
}

/// Splits "Nombre Apellido Apellido" into first name and the rest.
fn split_full_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

/// Registers a walk-in visitor and confirms attendance right away.
pub async fn register_on_site(state: &AppState, input: QuickInput) -> Result<CheckInOutcome, AppError> {
    let mut errors = FieldErrors::new();
    let full_name = require(&mut errors, "nombre_completo", input.asistente.nombre_completo.as_deref());
    let email = validate_email(&mut errors, "email", input.asistente.email.as_deref());
    let dni = validate_dni(&mut errors, "dni", input.asistente.dni.as_deref());
    let is_group = input
        .tipo_inscripcion
        .as_deref()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("GRUPAL") || t.trim().eq_ignore_ascii_case("GROUP"));
    let group_name = clean(input.nombre_grupo.as_deref());
    if is_group && group_name.is_none() {
        errors.add("nombre_grupo", MSG_REQUIRED);
    }
    errors.into_result()?;

    let (first_name, last_name) = split_full_name(&full_name.unwrap_or_default());
    let attendee = CleanAttendee {
        first_name,
        last_name,
        email,
        phone: None,
        dni,
        profile: ProfileType::Visitor,
        is_unab_student: false,
        institution: None,
        career: None,
        year_of_study: None,
        career_taught: None,
        work_area: None,
        occupation: None,
        group_name: if is_group { group_name } else { None },
        group_municipality: None,
        group_size: None,
        company_id: input.empresa,
    };

    check_company(state, attendee.company_id).await?;

    let mut conflicts = FieldErrors::new();
    check_duplicates(state, &attendee, "email", "dni", &mut conflicts).await?;
    if !conflicts.is_empty() {
        return Err(AppError::Conflict {
            message: "Ya existe una inscripción con estos datos. Confirmá tu asistencia con tu DNI."
                .to_string(),
            errors: conflicts,
            details: None,
        });
    }

    let now = Utc::now();
    let mut tx = state.pool.begin().await?;
    let inserted = insert_with_registration(
        &mut tx,
        &attendee,
        None,
        RegistrationKind::OnSite,
        &state.config.event_name,
        now,
    )
    .await?;
    tx.commit().await?;

    let outcome = load_outcome(state, inserted).await?;
    info!("🚪 on-site registration for attendee {}", outcome.attendee.id);
    checkin_service::confirm_attendee(state, outcome.attendee).await
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) => {
            Some(matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "si" | "sí" | "on"))
        }
        Some(serde_json::Value::Number(n)) => Some(n.as_i64().unwrap_or(0) != 0),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AttendeeInput {
        AttendeeInput {
            first_name: Some(" Ana ".to_string()),
            last_name: Some("Pérez".to_string()),
            email: Some("Ana@Example.com".to_string()),
            dni: Some("30.123.456".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn visitor_needs_only_common_fields() {
        let clean = validate_attendee(&base()).unwrap();
        assert_eq!(clean.first_name, "Ana");
        assert_eq!(clean.email, "ana@example.com");
        assert_eq!(clean.dni.as_deref(), Some("30123456"));
        assert_eq!(clean.profile, ProfileType::Visitor);
    }

    #[test]
    fn student_requires_career_and_year() {
        let mut input = base();
        input.profile_type = Some("student".to_string());
        let errors = validate_attendee(&input).unwrap_err();
        assert!(errors.contains("institution"));
        assert!(errors.contains("career"));
        assert!(errors.contains("year_of_study"));
    }

    #[test]
    fn unab_student_defaults_institution() {
        let mut input = base();
        input.profile_type = Some("STUDENT".to_string());
        input.is_unab_student = Some(true);
        input.career = Some("Logística".to_string());
        input.year_of_study = Some(2);
        let clean = validate_attendee(&input).unwrap();
        assert_eq!(clean.institution.as_deref(), Some(UNAB_INSTITUTION));
    }

    #[test]
    fn teacher_and_professional_rules() {
        let mut input = base();
        input.profile_type = Some("TEACHER".to_string());
        let errors = validate_attendee(&input).unwrap_err();
        assert!(errors.contains("institution"));
        assert!(errors.contains("career_taught"));

        input.profile_type = Some("PROFESSIONAL".to_string());
        let errors = validate_attendee(&input).unwrap_err();
        assert!(errors.contains("work_area"));
        assert!(errors.contains("occupation"));
    }

    #[test]
    fn group_size_must_match_member_count() {
        let mut input = base();
        input.profile_type = Some("groupRepresentative".to_string());
        input.group_name = Some("Escuela 5".to_string());
        input.group_size = Some(2);
        input.members = vec![MemberInput::default()];
        let errors = validate_attendee(&input).unwrap_err();
        assert!(errors.contains("group_size"));
    }

    #[test]
    fn invalid_dni_and_email_are_field_errors() {
        let mut input = base();
        input.dni = Some("12345".to_string());
        input.email = Some("not-an-email".to_string());
        let errors = validate_attendee(&input).unwrap_err();
        assert!(errors.contains("dni"));
        assert!(errors.contains("email"));
    }

    #[test]
    fn members_repeating_payload_values_are_rejected() {
        let rep = validate_attendee(&base()).unwrap();
        let members = vec![
            MemberInput {
                first_name: Some("Luis".to_string()),
                last_name: Some("Gómez".to_string()),
                dni: Some("30123456".to_string()),
                email: Some("luis@example.com".to_string()),
                phone: None,
            },
            MemberInput {
                first_name: Some("Eva".to_string()),
                last_name: Some("Ruiz".to_string()),
                dni: Some("28999888".to_string()),
                email: Some("LUIS@example.com".to_string()),
                phone: None,
            },
        ];
        let errors = validate_members(&rep, &members).unwrap_err();
        assert!(errors.contains("members[0].dni"));
        assert!(errors.contains("members[1].email"));
    }

    #[test]
    fn payload_accepts_wrapped_and_camel_case() {
        let wrapped: RegistrationPayload = serde_json::from_value(serde_json::json!({
            "asistente": { "first_name": "Ana", "year_of_study": "3" }
        }))
        .unwrap();
        let input = wrapped.into_input();
        assert_eq!(input.first_name.as_deref(), Some("Ana"));
        assert_eq!(input.year_of_study, Some(3));

        let flat: RegistrationPayload = serde_json::from_value(serde_json::json!({
            "firstName": "Eva",
            "dni": 30123456,
            "groupMembers": [{ "firstName": "Luis" }]
        }))
        .unwrap();
        let input = flat.into_input();
        assert_eq!(input.first_name.as_deref(), Some("Eva"));
        assert_eq!(input.dni.as_deref(), Some("30123456"));
        assert_eq!(input.members.len(), 1);
    }

    #[test]
    fn splits_full_names() {
        assert_eq!(
            split_full_name("  Ana María   Pérez "),
            ("Ana".to_string(), "María Pérez".to_string())
        );
        assert_eq!(split_full_name("Ana"), ("Ana".to_string(), String::new()));
    }
}
