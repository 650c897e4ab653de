pub mod dispatcher;
pub mod email_config;
pub mod error;
pub mod provider;
#[cfg(feature = "sendgrid")]
pub mod sendgrid;

#[cfg(all(test, feature = "sendgrid"))]
mod mock_http;
#[cfg(test)]
mod mock_smtp;

pub use dispatcher::send_test_email;
pub use email_config::{EmailConfig, Security, Transport};
pub use error::{ConfigError, SendError, Stage, StagedError};
pub use provider::Provider;
#[cfg(feature = "sendgrid")]
pub use sendgrid::{send_test_email_sendgrid, SendGridConfig, SendGridError, SendGridReceipt};
