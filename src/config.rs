use chrono::{FixedOffset, NaiveDate};
use std::env;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    Smtp,
    Http,
    Log,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub media_url: String,
    pub frontend_base_url: String,
    pub event_name: String,
    pub mail_transport: MailTransport,
    pub mail_from: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub admin_username: String,
    pub admin_password: String,
    /// Upper bound for one certificate batch; larger batches hit gateway timeouts.
    pub certificate_batch_size: i64,
    pub dni_request_batch_size: i64,
    /// Only certificates of attendees confirmed on this day are sent in batches.
    pub certificate_confirmed_on: Option<NaiveDate>,
    /// Offset of the venue's local time, used to read confirmation days.
    pub event_utc_offset_minutes: i32,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mail_transport = match env::var("MAIL_TRANSPORT")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "smtp" => MailTransport::Smtp,
            "http" => MailTransport::Http,
            _ => MailTransport::Log,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://congreso.db".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT").unwrap_or(8000),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            media_url: env::var("MEDIA_URL").unwrap_or_else(|_| "/media".to_string()),
            frontend_base_url: env::var("FRONTEND_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            event_name: env::var("EVENT_NAME")
                .unwrap_or_else(|_| "Congreso de Logística y Transporte UNaB".to_string()),
            mail_transport,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "congresologisticaytransporte@unab.edu.ar".to_string()),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: parse_var("SMTP_PORT").unwrap_or(587),
            smtp_username: non_empty_var("SMTP_USERNAME"),
            smtp_password: non_empty_var("SMTP_PASSWORD"),
            mail_api_url: non_empty_var("MAIL_API_URL"),
            mail_api_key: non_empty_var("MAIL_API_KEY"),
            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_default(),
            certificate_batch_size: batch_size_var("CERTIFICATE_BATCH_SIZE", 40)?,
            dni_request_batch_size: batch_size_var("DNI_REQUEST_BATCH_SIZE", 50)?,
            certificate_confirmed_on: non_empty_var("CERTIFICATE_CONFIRMED_ON")
                .map(|v| parse_date("CERTIFICATE_CONFIRMED_ON", v))
                .transpose()?,
            event_utc_offset_minutes: non_empty_var("EVENT_UTC_OFFSET")
                .map(|v| parse_utc_offset("EVENT_UTC_OFFSET", v))
                .transpose()?
                .unwrap_or(DEFAULT_UTC_OFFSET_MINUTES),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// Configuration for tests and local tooling: in-memory database, log mailer.
    pub fn for_tests(media_root: PathBuf) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            media_root,
            media_url: "/media".to_string(),
            frontend_base_url: "http://localhost:8081".to_string(),
            event_name: "Congreso de Logística y Transporte UNaB".to_string(),
            mail_transport: MailTransport::Log,
            mail_from: "congreso@example.org".to_string(),
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            smtp_username: None,
            smtp_password: None,
            mail_api_url: None,
            mail_api_key: None,
            admin_username: "admin".to_string(),
            admin_password: "secret".to_string(),
            certificate_batch_size: 40,
            dni_request_batch_size: 50,
            certificate_confirmed_on: None,
            event_utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            cors_allowed_origins: vec![],
        }
    }

    pub fn frontend_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.frontend_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

// Argentina, no daylight saving.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

fn batch_size_var(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match non_empty_var(key) {
        None => Ok(default),
        Some(value) => parse_batch_size(key, value),
    }
}

fn parse_batch_size(key: &'static str, value: String) -> Result<i64, ConfigError> {
    match value.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected a whole number of at least 1",
        }),
    }
}

fn parse_date(key: &'static str, value: String) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| ConfigError::Invalid {
        key,
        value,
        reason: "expected YYYY-MM-DD",
    })
}

fn parse_utc_offset(key: &'static str, value: String) -> Result<i32, ConfigError> {
    value
        .parse::<FixedOffset>()
        .map(|offset| offset.local_minus_utc() / 60)
        .map_err(|_| ConfigError::Invalid {
            key,
            value,
            reason: "expected an offset such as -03:00",
        })
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
