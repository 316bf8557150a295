use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::Cursor;

use crate::config::AppConfig;
use crate::database::qr_code_repo;
use crate::error::AppError;

const QR_MIN_SIZE: u32 = 300;

pub fn render_png(data: &str) -> Result<Vec<u8>, AppError> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| AppError::Qr(e.to_string()))?;
    let img = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build();

    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| AppError::Qr(e.to_string()))?;
    Ok(buf)
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
}

#[derive(Debug, Serialize)]
pub struct StaticCode {
    pub url: String,
    pub image_base64: String,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StaticCodes {
    pub checkin_qr: StaticCode,
    pub registro_qr: StaticCode,
}

/// Printed at the venue entrance: one code opens DNI check-in, the other the
/// on-site registration form.
pub fn static_codes(config: &AppConfig) -> Result<StaticCodes, AppError> {
    let checkin_url = config.frontend_url("/verificar-dni");
    let registro_url = config.frontend_url("/registro-rapido");
    Ok(StaticCodes {
        checkin_qr: StaticCode {
            image_base64: png_data_url(&render_png(&checkin_url)?),
            url: checkin_url,
            description: "QR para confirmar asistencia (verificación de DNI)",
        },
        registro_qr: StaticCode {
            image_base64: png_data_url(&render_png(&registro_url)?),
            url: registro_url,
            description: "QR para inscripción in-situ en el evento",
        },
    })
}

/// PNG for a registration's check-in token; the payload is the token itself.
pub async fn registration_png(pool: &SqlitePool, token: &str) -> Result<Vec<u8>, AppError> {
    let qr = qr_code_repo::find_by_token(pool, token)
        .await?
        .ok_or_else(|| AppError::NotFound("Código QR no encontrado".to_string()))?;
    render_png(&qr.token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn renders_png_bytes() {
        let png = render_png("5f1c7a0e-2a7b-4c1e-9d1a-3b2f0c9e8d7a").unwrap();
        assert!(png.starts_with(&PNG_MAGIC));
    }

    #[test]
    fn static_codes_point_at_frontend_pages() {
        let config = AppConfig::for_tests(std::env::temp_dir());
        let codes = static_codes(&config).unwrap();
        assert_eq!(codes.checkin_qr.url, "http://localhost:8081/verificar-dni");
        assert_eq!(codes.registro_qr.url, "http://localhost:8081/registro-rapido");
        assert!(codes.checkin_qr.image_base64.starts_with("data:image/png;base64,"));
    }
}
