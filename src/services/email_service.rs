use askama::Template;
use chrono::{Datelike, NaiveDate, Utc};

use crate::config::AppConfig;
use crate::models::{AttendeeRow, CertificateKind, RegistrationKind};
use crate::services::mailer::{EmailAttachment, MailError, OutgoingEmail};

pub const QR_CONTENT_ID: &str = "qr_code_image";

#[derive(Template)]
#[template(path = "email/confirmation.html")]
struct ConfirmationTemplate<'a> {
    nombre: &'a str,
    event_name: &'a str,
    tipo_inscripcion: &'a str,
    perfil: &'a str,
    empresa: Option<&'a str>,
    nombre_grupo: Option<&'a str>,
    qr_cid: &'a str,
    year: i32,
}

#[derive(Template)]
#[template(path = "email/certificate.html")]
struct CertificateTemplate<'a> {
    nombre: &'a str,
    titulo: &'a str,
    event_name: &'a str,
    fecha_emision: String,
}

#[derive(Template)]
#[template(path = "email/dni_update.html")]
struct DniUpdateTemplate<'a> {
    nombre: &'a str,
    event_name: &'a str,
    link: &'a str,
}

pub fn confirmation_email(
    config: &AppConfig,
    attendee: &AttendeeRow,
    kind: RegistrationKind,
    company_name: Option<&str>,
    qr_png: Vec<u8>,
) -> Result<OutgoingEmail, MailError> {
    let nombre = attendee.full_name();
    let html = ConfirmationTemplate {
        nombre: &nombre,
        event_name: &config.event_name,
        tipo_inscripcion: kind.label(),
        perfil: attendee.profile().label(),
        empresa: company_name,
        nombre_grupo: attendee.group_name.as_deref(),
        qr_cid: QR_CONTENT_ID,
        year: Utc::now().year(),
    }
    .render()?;

    Ok(OutgoingEmail {
        to: attendee.email.clone(),
        subject: format!("Confirmación de inscripción - {}", config.event_name),
        text: strip_tags(&html),
        html,
        attachments: vec![
            EmailAttachment {
                filename: "qr_code.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: qr_png.clone(),
                content_id: Some(QR_CONTENT_ID.to_string()),
            },
            EmailAttachment {
                filename: "qr_code.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: qr_png,
                content_id: None,
            },
        ],
    })
}

pub fn certificate_email(
    config: &AppConfig,
    attendee: &AttendeeRow,
    kind: CertificateKind,
    issued_on: NaiveDate,
    pdf: Vec<u8>,
) -> Result<OutgoingEmail, MailError> {
    let nombre = attendee.full_name();
    let html = CertificateTemplate {
        nombre: &nombre,
        titulo: kind.title(),
        event_name: &config.event_name,
        fecha_emision: issued_on.format("%d/%m/%Y").to_string(),
    }
    .render()?;

    Ok(OutgoingEmail {
        to: attendee.email.clone(),
        subject: format!("{} - {}", kind.title(), config.event_name),
        text: strip_tags(&html),
        html,
        attachments: vec![EmailAttachment {
            filename: format!("Certificado_{}.pdf", nombre.replace(' ', "_")),
            content_type: "application/pdf".to_string(),
            bytes: pdf,
            content_id: None,
        }],
    })
}

pub fn dni_update_email(
    config: &AppConfig,
    attendee: &AttendeeRow,
    token: &str,
) -> Result<OutgoingEmail, MailError> {
    let nombre = attendee.full_name();
    let link = config.frontend_url(&format!("/actualizar-dni?token={}", token));
    let html = DniUpdateTemplate {
        nombre: &nombre,
        event_name: &config.event_name,
        link: &link,
    }
    .render()?;

    Ok(OutgoingEmail {
        to: attendee.email.clone(),
        subject: format!("Actualizá tu DNI - {}", config.event_name),
        text: strip_tags(&html),
        html,
        attachments: Vec::new(),
    })
}

/// Plain-text alternative: drops tags and the document head, decodes the
/// entities askama escapes, and collapses blank lines.
pub fn strip_tags(html: &str) -> String {
    let body = match (html.find("<body"), html.rfind("</body>")) {
        (Some(start), Some(end)) if start < end => &html[start..end],
        _ => html,
    };

    let mut out = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    let decoded = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
        .replace("&#x2f;", "/")
        .replace("&nbsp;", " ");

    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attendee() -> AttendeeRow {
        AttendeeRow {
            id: 1,
            first_name: "Ana".to_string(),
            last_name: "Pérez".to_string(),
            email: "ana@example.com".to_string(),
            phone: None,
            dni: Some("30123456".to_string()),
            dni_update_token: None,
            dni_requested_at: None,
            profile_type: "STUDENT".to_string(),
            is_unab_student: true,
            institution: Some("UNaB".to_string()),
            career: Some("Logística".to_string()),
            year_of_study: Some(2),
            career_taught: None,
            work_area: None,
            occupation: None,
            group_name: None,
            group_municipality: None,
            group_size: None,
            representative_id: None,
            company_id: None,
            attendance_confirmed: false,
            confirmed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn confirmation_embeds_qr_inline_and_as_download() {
        let config = AppConfig::for_tests(std::env::temp_dir());
        let email = confirmation_email(
            &config,
            &attendee(),
            RegistrationKind::Individual,
            Some("Acme & Cía"),
            vec![1, 2, 3],
        )
        .unwrap();
        assert_eq!(email.to, "ana@example.com");
        assert!(email.html.contains("cid:qr_code_image"));
        assert!(email.html.contains("Ana Pérez"));
        assert!(email.text.contains("Empresa: Acme & Cía"));
        assert!(!email.text.contains('<'));
        assert_eq!(email.attachments.len(), 2);
        assert_eq!(
            email.attachments[0].content_id.as_deref(),
            Some(QR_CONTENT_ID)
        );
        assert!(email.attachments[1].content_id.is_none());
    }

    #[test]
    fn dni_update_links_to_frontend_with_token() {
        let config = AppConfig::for_tests(std::env::temp_dir());
        let email = dni_update_email(&config, &attendee(), "abc123").unwrap();
        assert!(email
            .text
            .contains("http://localhost:8081/actualizar-dni?token=abc123"));
    }

    #[test]
    fn strip_tags_keeps_text_lines() {
        let text = strip_tags("<html><head><title>x</title></head><body><p>Hola</p>\n<p>  mundo </p></body></html>");
        assert_eq!(text, "Hola\nmundo");
    }
}
