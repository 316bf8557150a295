use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::database::company_repo::{self, NewCompany};
use crate::error::{AppError, FieldErrors};
use crate::models::CompanyRow;
use crate::services::media_store::safe_file_name;
use crate::services::registration_service::{clean, is_valid_email};
use crate::state::AppState;

const MAX_LOGO_BYTES: usize = 5 * 1024 * 1024;
const LOGO_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "svg", "webp", "gif"];

/// Text fields of the sponsor/exhibitor form, already pulled out of the
/// multipart body.
#[derive(Debug, Default, Clone)]
pub struct CompanyInput {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_position: Option<String>,
    pub participation: Vec<String>,
    pub website: Option<String>,
}

impl CompanyInput {
    /// Maps a multipart field name (snake_case or the form's camelCase) onto
    /// the input. Unknown fields are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "name" | "companyName" | "nombre_empresa" | "razon_social" => self.name = Some(value),
            "contact_name" | "contactPersonName" => self.contact_name = Some(value),
            "contact_email" | "contactPersonEmail" | "companyEmail" => {
                if self.contact_email.is_none() || name != "companyEmail" {
                    self.contact_email = Some(value);
                }
            }
            "contact_phone" | "contactPersonPhone" | "companyPhone" => {
                if self.contact_phone.is_none() || name != "companyPhone" {
                    self.contact_phone = Some(value);
                }
            }
            "contact_position" | "contactPersonPosition" => self.contact_position = Some(value),
            "participation" | "participationOptions" | "participationOptions[]" => {
                self.participation.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string),
                );
            }
            "website" | "sitio_web" => self.website = Some(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogoUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct CompanyView {
    pub id: i64,
    pub nombre_empresa: String,
    pub logo: Option<String>,
    pub sitio_web: Option<String>,
}

impl CompanyView {
    fn from_row(state: &AppState, c: CompanyRow) -> Self {
        Self {
            id: c.id,
            logo: c.logo_path.as_deref().map(|p| state.media.url(p)),
            nombre_empresa: c.name,
            sitio_web: c.website,
        }
    }
}

fn logo_extension(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_lowercase();
    LOGO_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub async fn register_company(
    state: &AppState,
    input: CompanyInput,
    logo: Option<LogoUpload>,
) -> Result<CompanyView, AppError> {
    let mut errors = FieldErrors::new();
    let name = clean(input.name.as_deref());
    if name.is_none() {
        errors.add("name", "Este campo es obligatorio.");
    }
    let contact_email = clean(input.contact_email.as_deref()).map(|e| e.to_lowercase());
    match &contact_email {
        None => errors.add("contact_email", "Este campo es obligatorio."),
        Some(e) if !is_valid_email(e) => errors.add("contact_email", "Ingresá un email válido."),
        _ => {}
    }
    if let Some(logo) = &logo {
        if logo.bytes.len() > MAX_LOGO_BYTES {
            errors.add("logo", "El logo no puede superar los 5 MB.");
        }
        if logo_extension(&logo.filename).is_none() {
            errors.add("logo", "Formato de logo no admitido.");
        }
    }
    errors.into_result()?;
    let name = name.unwrap_or_default();

    if company_repo::find_by_name(&state.pool, &name).await?.is_some() {
        return Err(AppError::field_conflict(FieldErrors::single(
            "name",
            "Ya existe una empresa registrada con este nombre.",
        )));
    }

    let logo_path = match logo {
        Some(logo) => {
            let relative = format!(
                "logos/{}_{}",
                uuid::Uuid::new_v4().simple(),
                safe_file_name(&logo.filename)
            );
            Some(state.media.save(&relative, &logo.bytes).await?)
        }
        None => None,
    };

    let participation = (!input.participation.is_empty()).then(|| input.participation.join(", "));
    let contact_name = clean(input.contact_name.as_deref());
    let contact_phone = clean(input.contact_phone.as_deref());
    let contact_position = clean(input.contact_position.as_deref());
    let website = clean(input.website.as_deref());

    let id = company_repo::insert_company(
        &state.pool,
        &NewCompany {
            name: &name,
            contact_name: contact_name.as_deref(),
            contact_email: contact_email.as_deref(),
            contact_phone: contact_phone.as_deref(),
            contact_position: contact_position.as_deref(),
            participation: participation.as_deref(),
            website: website.as_deref(),
            logo_path: logo_path.as_deref(),
            created_at: Utc::now(),
        },
    )
    .await?;
    info!("🏢 company {} registered ({})", id, name);

    let row = company_repo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Internal("company vanished after insert".to_string()))?;
    Ok(CompanyView::from_row(state, row))
}

pub async fn list_companies(state: &AppState) -> Result<Vec<CompanyView>, AppError> {
    let rows = company_repo::search(&state.pool, "", 1000).await?;
    Ok(rows
        .into_iter()
        .map(|c| CompanyView::from_row(state, c))
        .collect())
}
