use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::{AppConfig, MailTransport};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address {0}")]
    Address(String),
    #[error("could not build message: {0}")]
    Build(String),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("template failed: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// When set, the part is sent inline and referenced as `cid:<id>` from the HTML.
    pub content_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub attachments: Vec<EmailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

pub fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>, MailError> {
    let mailer: Arc<dyn Mailer> = match config.mail_transport {
        MailTransport::Smtp => Arc::new(SmtpMailer::new(config)?),
        MailTransport::Http => Arc::new(HttpRelayMailer::new(config)?),
        MailTransport::Log => Arc::new(LogMailer::default()),
    };
    Ok(mailer)
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .mail_from
            .parse()
            .map_err(|_| MailError::Address(config.mail_from.clone()))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            from,
            transport: builder.build(),
        })
    }

    fn build_message(&self, email: OutgoingEmail) -> Result<Message, MailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| MailError::Address(email.to.clone()))?;

        let mut related =
            MultiPart::related().multipart(MultiPart::alternative_plain_html(email.text, email.html));
        let mut downloads = Vec::new();
        for att in email.attachments {
            let content_type = ContentType::parse(&att.content_type)
                .map_err(|e| MailError::Build(e.to_string()))?;
            match att.content_id {
                Some(cid) => {
                    related = related
                        .singlepart(Attachment::new_inline(cid).body(att.bytes, content_type));
                }
                None => downloads.push(Attachment::new(att.filename).body(att.bytes, content_type)),
            }
        }

        let mut mixed = MultiPart::mixed().multipart(related);
        for part in downloads {
            mixed = mixed.singlepart(part);
        }

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(mixed)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let to = email.to.clone();
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!("📧 mail sent via smtp to {}", to);
        Ok(())
    }
}

/// Posts messages as JSON to a transactional-mail HTTP API.
pub struct HttpRelayMailer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpRelayMailer {
    pub fn new(config: &AppConfig) -> Result<Self, MailError> {
        let url = config
            .mail_api_url
            .clone()
            .ok_or_else(|| MailError::Transport("MAIL_API_URL is not set".to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let attachments: Vec<serde_json::Value> = email
            .attachments
            .iter()
            .map(|a| {
                serde_json::json!({
                    "filename": a.filename,
                    "content_type": a.content_type,
                    "content_id": a.content_id,
                    "content_base64": general_purpose::STANDARD.encode(&a.bytes),
                })
            })
            .collect();

        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers())
            .json(&serde_json::json!({
                "from": self.from,
                "to": [email.to],
                "subject": email.subject,
                "html": email.html,
                "text": email.text,
                "attachments": attachments,
            }))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Transport(format!("relay returned {}: {}", status, body)));
        }
        info!("📧 mail sent via relay to {}", email.to);
        Ok(())
    }
}

/// Logs messages instead of delivering them and keeps a copy for inspection.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl LogMailer {
    /// A mailer whose every send fails, for exercising best-effort paths.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("log mailer configured to fail".to_string()));
        }
        info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "📧 mail (log transport)"
        );
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}
