use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Mail providers with a known submission endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Gmail,
    Outlook,
    Yahoo,
}

impl Provider {
    pub fn host(&self) -> &'static str {
        match self {
            Provider::Gmail => "smtp.gmail.com",
            Provider::Outlook => "smtp.office365.com",
            Provider::Yahoo => "smtp.mail.yahoo.com",
        }
    }

    /// All three providers take submissions with STARTTLS on 587.
    pub fn port(&self) -> u16 {
        587
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
            Provider::Yahoo => "yahoo",
        };
        f.write_str(name)
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Ok(Provider::Gmail),
            "outlook" | "hotmail" | "office365" => Ok(Provider::Outlook),
            "yahoo" => Ok(Provider::Yahoo),
            _ => Err(ConfigError::InvalidValue {
                name: "SMTP_PROVIDER",
                value: s.to_string(),
                reason: "expected one of gmail, outlook, yahoo".to_string(),
            }),
        }
    }
}
