use std::fmt;

use lettre::address::AddressError;
use lettre::transport::smtp;
use thiserror::Error;

/// Problems with the configured values, detected before any network I/O.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("{name} is not a valid email address: {source}")]
    InvalidAddress {
        name: &'static str,
        #[source]
        source: AddressError,
    },
    #[error("{name} has invalid value {value:?}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
}

/// Why a send attempt failed. Every variant is fatal to the attempt.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("connection error with {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: smtp::Error,
    },
    #[error("authentication error: {0}")]
    Authentication(#[source] smtp::Error),
    #[error("transmission error: {0}")]
    Transmission(#[source] smtp::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Connection,
    Authentication,
    Transmission,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Connection => "connection",
            Stage::Authentication => "authentication",
            Stage::Transmission => "transmission",
        };
        f.write_str(name)
    }
}

impl Stage {
    /// Process exit code for a failure at this stage, following sysexits(3).
    pub fn exit_code(&self) -> u8 {
        match self {
            Stage::Configuration => 78,
            Stage::Connection => 69,
            Stage::Authentication => 77,
            Stage::Transmission => 76,
        }
    }
}

/// A send failure that knows which stage it happened in.
pub trait StagedError: std::error::Error {
    fn stage(&self) -> Stage;

    fn exit_code(&self) -> u8 {
        self.stage().exit_code()
    }
}

impl StagedError for SendError {
    fn stage(&self) -> Stage {
        SendError::stage(self)
    }
}

impl SendError {
    pub fn stage(&self) -> Stage {
        match self {
            SendError::Configuration(_) => Stage::Configuration,
            SendError::Connection { .. } => Stage::Connection,
            SendError::Authentication(_) => Stage::Authentication,
            SendError::Transmission(_) => Stage::Transmission,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.stage().exit_code()
    }
}
