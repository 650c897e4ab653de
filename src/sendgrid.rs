//! Sends the test email through SendGrid's v3 HTTP API instead of SMTP.

use std::env;
use std::fmt;
use std::time::Duration;

use lettre::Address;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::email_config::{parse_timeout, DEFAULT_TIMEOUT};
use crate::error::{ConfigError, Stage, StagedError};

pub const DEFAULT_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub const SUBJECT: &str = "Test Email from Rust (SendGrid)";

pub const HTML_BODY: &str = "<html>
    <body>
        <h2>Hello!</h2>
        <p>This is a test email sent from Rust using the SendGrid API.</p>
        <p>If you're reading this, it worked!</p>
        <br>
        <p><strong>Best regards,</strong><br>Your Rust program</p>
    </body>
</html>
";

#[derive(Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl SendGridConfig {
    pub fn new(
        api_key: impl Into<String>,
        sender_email: impl Into<String>,
        recipient_email: impl Into<String>,
    ) -> Self {
        SendGridConfig {
            api_key: api_key.into(),
            sender_email: sender_email.into(),
            recipient_email: recipient_email.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads `SENDGRID_API_KEY`, `SENDER_EMAIL` and `RECIPIENT_EMAIL`, plus the
    /// optional `SENDGRID_API_URL` and `SENDGRID_TIMEOUT_SECS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SendGridConfig::new(
            lookup("SENDGRID_API_KEY").unwrap_or_default(),
            lookup("SENDER_EMAIL").unwrap_or_default(),
            lookup("RECIPIENT_EMAIL").unwrap_or_default(),
        );

        if let Some(url) = lookup("SENDGRID_API_URL").filter(|v| !v.trim().is_empty()) {
            config = config.with_api_url(url.trim());
            config.parsed_url()?;
        }
        if let Some(value) = lookup("SENDGRID_TIMEOUT_SECS").filter(|v| !v.trim().is_empty()) {
            config = config.with_timeout(parse_timeout("SENDGRID_TIMEOUT_SECS", &value)?);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            ("SENDGRID_API_KEY", &self.api_key),
            ("SENDER_EMAIL", &self.sender_email),
            ("RECIPIENT_EMAIL", &self.recipient_email),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    fn parsed_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_url).map_err(|err| ConfigError::InvalidValue {
            name: "SENDGRID_API_URL",
            value: self.api_url.clone(),
            reason: err.to_string(),
        })
    }
}

impl fmt::Debug for SendGridConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendGridConfig")
            .field("api_key", &"<redacted>")
            .field("sender_email", &self.sender_email)
            .field("recipient_email", &self.recipient_email)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum SendGridError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("connection error with {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("authentication error: SendGrid answered {status}: {body}")]
    Authentication { status: StatusCode, body: String },
    #[error("transmission error: SendGrid answered {status}: {body}")]
    Transmission { status: StatusCode, body: String },
}

impl StagedError for SendGridError {
    fn stage(&self) -> Stage {
        match self {
            SendGridError::Configuration(_) => Stage::Configuration,
            SendGridError::Connection { .. } => Stage::Connection,
            SendGridError::Authentication { .. } => Stage::Authentication,
            SendGridError::Transmission { .. } => Stage::Transmission,
        }
    }
}

/// What SendGrid said when it accepted the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendGridReceipt {
    pub status: StatusCode,
    pub message_id: Option<String>,
}

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: EmailAddress<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [EmailAddress<'a>; 1],
}

#[derive(Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

/// Sends one HTML test message through SendGrid.
///
/// 401 and 403 replies are authentication failures; any other non-success
/// reply means SendGrid refused the message.
pub fn send_test_email_sendgrid(config: &SendGridConfig) -> Result<SendGridReceipt, SendGridError> {
    config.validate()?;
    let url = config.parsed_url()?;
    let sender = parse_address("SENDER_EMAIL", &config.sender_email)?;
    let recipient = parse_address("RECIPIENT_EMAIL", &config.recipient_email)?;

    let payload = MailSend {
        personalizations: [Personalization {
            to: [EmailAddress {
                email: recipient.as_ref(),
            }],
        }],
        from: EmailAddress {
            email: sender.as_ref(),
        },
        subject: SUBJECT,
        content: [Content {
            kind: "text/html",
            value: HTML_BODY,
        }],
    };

    let endpoint = url.to_string();
    let connection_error = |source| SendGridError::Connection {
        endpoint: endpoint.clone(),
        source,
    };

    let client = Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(connection_error)?;

    info!(endpoint = %endpoint, to = %recipient, "sending email via SendGrid");
    let response = client
        .post(url)
        .bearer_auth(config.api_key.trim())
        .json(&payload)
        .send()
        .map_err(connection_error)?;

    let status = response.status();
    if status.is_success() {
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        debug!(%status, ?message_id, "SendGrid accepted the message");
        return Ok(SendGridReceipt { status, message_id });
    }

    let body = response.text().unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(SendGridError::Authentication { status, body })
    } else {
        Err(SendGridError::Transmission { status, body })
    }
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidAddress { name, source })
}
