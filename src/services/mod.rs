pub mod admin_service;
pub mod certificate_pdf;
pub mod certificate_service;
pub mod checkin_service;
pub mod company_service;
pub mod dni_service;
pub mod email_service;
pub mod import_service;
pub mod mailer;
pub mod media_store;
pub mod program_service;
pub mod qr_service;
pub mod registration_service;
