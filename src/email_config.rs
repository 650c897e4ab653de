use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::provider::Provider;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// How the SMTP session is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Plaintext connection upgraded with STARTTLS before AUTH.
    StartTls,
    /// TLS from the first byte (SMTPS).
    Implicit,
    /// No encryption. Only for local relays.
    None,
}

impl Security {
    pub fn for_port(port: u16) -> Self {
        match port {
            465 => Security::Implicit,
            _ => Security::StartTls,
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Security::StartTls => "starttls",
            Security::Implicit => "tls",
            Security::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for Security {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(Security::StartTls),
            "tls" | "ssl" | "implicit" => Ok(Security::Implicit),
            "none" | "plain" => Ok(Security::None),
            _ => Err(ConfigError::InvalidValue {
                name: "SMTP_SECURITY",
                value: s.to_string(),
                reason: "expected one of starttls, tls, none".to_string(),
            }),
        }
    }
}

/// Which service carries the message, chosen with `MAIL_TRANSPORT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Smtp,
    #[cfg(feature = "sendgrid")]
    SendGrid,
}

impl Transport {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("MAIL_TRANSPORT") {
            Some(name) if !name.trim().is_empty() => name.parse(),
            _ => Ok(Transport::default()),
        }
    }
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(Transport::Smtp),
            #[cfg(feature = "sendgrid")]
            "sendgrid" => Ok(Transport::SendGrid),
            #[cfg(not(feature = "sendgrid"))]
            "sendgrid" => Err(ConfigError::InvalidValue {
                name: "MAIL_TRANSPORT",
                value: s.to_string(),
                reason: "built without the sendgrid feature".to_string(),
            }),
            _ => Err(ConfigError::InvalidValue {
                name: "MAIL_TRANSPORT",
                value: s.to_string(),
                reason: "expected smtp or sendgrid".to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct EmailConfig {
    pub sender_email: String,
    /// App password issued by the provider, not the account password.
    pub sender_password: String,
    pub recipient_email: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub security: Security,
    pub timeout: Duration,
}

impl EmailConfig {
    pub fn new(
        sender_email: impl Into<String>,
        sender_password: impl Into<String>,
        recipient_email: impl Into<String>,
    ) -> Self {
        let provider = Provider::default();
        EmailConfig {
            sender_email: sender_email.into(),
            sender_password: sender_password.into(),
            recipient_email: recipient_email.into(),
            smtp_host: provider.host().to_string(),
            smtp_port: provider.port(),
            security: Security::for_port(provider.port()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_provider(self, provider: Provider) -> Self {
        self.with_endpoint(provider.host(), provider.port())
    }

    /// Points the config at `host:port`, picking the security mode the port conventionally uses.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.smtp_host = host.into();
        self.smtp_port = port;
        self.security = Security::for_port(port);
        self
    }

    pub fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`, which maps variable names to values.
    ///
    /// Required variables that are unset load as empty strings; they are
    /// rejected by [`EmailConfig::validate`] when a send is attempted.
    /// Optional variables that are set but malformed fail here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup("SMTP_PROVIDER") {
            Some(name) if !name.trim().is_empty() => name.parse::<Provider>()?,
            _ => Provider::default(),
        };

        let mut config = EmailConfig::new(
            lookup("SENDER_EMAIL").unwrap_or_default(),
            lookup("SENDER_PASSWORD").unwrap_or_default(),
            lookup("RECIPIENT_EMAIL").unwrap_or_default(),
        )
        .with_provider(provider);

        let host = lookup("SMTP_HOST")
            .filter(|host| !host.trim().is_empty())
            .map(|host| host.trim().to_string())
            .unwrap_or(config.smtp_host.clone());
        let port = match lookup("SMTP_PORT") {
            Some(value) if !value.trim().is_empty() => parse_port(&value)?,
            _ => config.smtp_port,
        };
        config = config.with_endpoint(host, port);

        if let Some(value) = lookup("SMTP_SECURITY").filter(|v| !v.trim().is_empty()) {
            config = config.with_security(value.parse()?);
        }
        if let Some(value) = lookup("SMTP_TIMEOUT_SECS").filter(|v| !v.trim().is_empty()) {
            config = config.with_timeout(parse_timeout("SMTP_TIMEOUT_SECS", &value)?);
        }

        Ok(config)
    }

    /// Checks that every required value is present, reporting all that are not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            ("SENDER_EMAIL", &self.sender_email),
            ("SENDER_PASSWORD", &self.sender_password),
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

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.smtp_host, self.smtp_port)
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sender_email", &self.sender_email)
            .field("sender_password", &"<redacted>")
            .field("recipient_email", &self.recipient_email)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("security", &self.security)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidValue {
            name: "SMTP_PORT",
            value: value.to_string(),
            reason: "expected a port number between 1 and 65535".to_string(),
        }),
    }
}

pub(crate) fn parse_timeout(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected a positive number of seconds".to_string(),
        }),
    }
}
