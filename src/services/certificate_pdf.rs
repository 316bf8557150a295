use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rgb,
};

use crate::models::CertificateKind;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("pdf render failed: {0}")]
    Render(String),
}

fn render_err(e: impl std::fmt::Display) -> PdfError {
    PdfError::Render(e.to_string())
}

#[derive(Debug, Clone)]
pub struct CertificateContent {
    pub kind: CertificateKind,
    pub recipient_name: String,
    pub dni: Option<String>,
    pub event_name: String,
    pub issued_on: NaiveDate,
}

// Landscape A4.
const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const MARGIN: f32 = 12.0;

// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.52;
const PT_TO_MM: f32 = 0.352_778;

pub fn render(content: &CertificateContent) -> Result<Vec<u8>, PdfError> {
    let (doc, page, layer) =
        PdfDocument::new(content.kind.title(), Mm(PAGE_W), Mm(PAGE_H), "certificado");
    let layer = doc.get_page(page).get_layer(layer);

    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?;
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;
    let oblique = doc.add_builtin_font(BuiltinFont::HelveticaOblique).map_err(render_err)?;

    draw_frame(&layer);

    let accent = Color::Rgb(Rgb::new(18.0 / 255.0, 90.0 / 255.0, 150.0 / 255.0, None));
    let black = Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None));

    layer.set_fill_color(accent.clone());
    centered(&layer, &bold, &content.kind.title().to_uppercase(), 30.0, 160.0);

    layer.set_fill_color(black.clone());
    centered(&layer, &regular, "Se certifica que", 16.0, 135.0);

    layer.set_fill_color(accent);
    centered(&layer, &bold, &content.recipient_name.to_uppercase(), 28.0, 115.0);

    layer.set_fill_color(black);
    if let Some(dni) = content.dni.as_deref().filter(|d| !d.is_empty()) {
        centered(&layer, &regular, &format!("DNI {}", dni), 14.0, 102.0);
    }
    centered(
        &layer,
        &regular,
        &format!("{} {}", content.kind.statement(), content.event_name),
        16.0,
        85.0,
    );
    centered(
        &layer,
        &oblique,
        &format!("Emitido el {}", content.issued_on.format("%d/%m/%Y")),
        12.0,
        50.0,
    );

    doc.save_to_bytes().map_err(render_err)
}

fn centered(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, size: f32, y: f32) {
    let width = text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM;
    let x = ((PAGE_W - width) / 2.0).max(MARGIN);
    layer.use_text(text, size, Mm(x), Mm(y), font);
}

fn draw_frame(layer: &PdfLayerReference) {
    layer.set_outline_color(Color::Rgb(Rgb::new(18.0 / 255.0, 90.0 / 255.0, 150.0 / 255.0, None)));
    layer.set_outline_thickness(2.0);
    let corners = [
        (MARGIN, MARGIN),
        (PAGE_W - MARGIN, MARGIN),
        (PAGE_W - MARGIN, PAGE_H - MARGIN),
        (MARGIN, PAGE_H - MARGIN),
    ];
    layer.add_line(Line {
        points: corners
            .iter()
            .map(|&(x, y)| (Point::new(Mm(x), Mm(y)), false))
            .collect(),
        is_closed: true,
    });
}

/// Stored file name for a certificate, e.g. `certificado_asistencia_12.pdf`.
pub fn file_name(kind: CertificateKind, certificate_id: i64) -> String {
    let slug = match kind {
        CertificateKind::Attendance => "asistencia",
        CertificateKind::Participation => "participacion",
        CertificateKind::Speaker => "disertante",
    };
    format!("certificado_{}_{}.pdf", slug, certificate_id)
}

/// Speakers are not attendees, so their file is keyed by slug:
/// `certificado_disertante_maria-perez.pdf`.
pub fn speaker_file_name(slug: &str) -> String {
    format!("certificado_disertante_{}.pdf", slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_pdf_document() {
        let pdf = render(&CertificateContent {
            kind: CertificateKind::Attendance,
            recipient_name: "Ana Pérez".to_string(),
            dni: Some("30123456".to_string()),
            event_name: "Congreso de Logística y Transporte UNaB".to_string(),
            issued_on: NaiveDate::from_ymd_opt(2025, 11, 15).unwrap(),
        })
        .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn file_names_follow_kind() {
        assert_eq!(
            file_name(CertificateKind::Speaker, 7),
            "certificado_disertante_7.pdf"
        );
        assert_eq!(
            speaker_file_name("maria-jose-nunez"),
            "certificado_disertante_maria-jose-nunez.pdf"
        );
    }
}
