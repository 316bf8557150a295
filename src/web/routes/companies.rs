use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, FieldErrors};
use crate::services::company_service::{self, CompanyInput, CompanyView, LogoUpload};
use crate::state::AppState;

fn multipart_err(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(FieldErrors::single("__all__", format!("Formulario inválido: {}", e)))
}

pub async fn list_companies_handler(State(state): State<AppState>) -> Result<Json<Vec<CompanyView>>, AppError> {
    Ok(Json(company_service::list_companies(&state).await?))
}

/// Sponsor/exhibitor form: text fields plus an optional `logo` file.
pub async fn register_company_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut input = CompanyInput::default();
    let mut logo: Option<LogoUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "logo" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_err)?;
            if !filename.is_empty() && !bytes.is_empty() {
                logo = Some(LogoUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }
        let value = field.text().await.map_err(multipart_err)?;
        input.set_field(&name, value);
    }

    let company = company_service::register_company(&state, input, logo).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Empresa registrada correctamente",
            "empresa": company,
        })),
    ))
}
