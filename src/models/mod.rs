pub mod attendee;
pub mod certificate;
pub mod company;
pub mod program_session;
pub mod qr_code;
pub mod registration;
pub mod speaker;

pub use attendee::{AttendeeRow, AttendeeView, ProfileType};
pub use certificate::{CertificateKind, CertificateRow};
pub use company::CompanyRow;
pub use program_session::ProgramSessionRow;
pub use qr_code::QrCodeRow;
pub use registration::{RegistrationKind, RegistrationRow, RegistrationStatus};
pub use speaker::SpeakerRow;
