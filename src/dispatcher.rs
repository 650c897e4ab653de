use std::net::IpAddr;

use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::{
    self,
    authentication::{Credentials, DEFAULT_MECHANISMS},
    client::{SmtpConnection, TlsParameters},
    extension::ClientId,
};
use lettre::Message;
use tracing::{debug, info, warn};

use crate::email_config::{EmailConfig, Security};
use crate::error::{ConfigError, SendError};

pub const SUBJECT: &str = "Test Email from Rust";

pub const BODY: &str = "Hello!

This is a test email sent from Rust.
If you're reading this, it worked!

Best regards,
Your Rust program
";

/// Sends one test message from the configured sender to the configured recipient.
///
/// Configuration problems are reported before any network activity. The SMTP
/// session is closed on every path out of this function.
pub fn send_test_email(config: &EmailConfig) -> Result<(), SendError> {
    config.validate()?;
    let message = build_message(config)?;
    let hello_name = ClientId::default();

    info!(
        endpoint = %config.endpoint(),
        security = %config.security,
        "connecting to email server"
    );
    let mut session = Session::open(config, &hello_name)?;

    info!(user = %config.sender_email, "logging in");
    session.authenticate(config)?;

    info!(to = %config.recipient_email, "sending email");
    session.send(&message)?;

    session.close();
    Ok(())
}

fn build_message(config: &EmailConfig) -> Result<Message, ConfigError> {
    let from = parse_mailbox("SENDER_EMAIL", &config.sender_email)?;
    let to = parse_mailbox("RECIPIENT_EMAIL", &config.recipient_email)?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(SUBJECT)
        .message_id(None)
        .header(ContentType::TEXT_PLAIN)
        .body(BODY.to_string())?;
    Ok(message)
}

fn parse_mailbox(name: &'static str, value: &str) -> Result<Mailbox, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidAddress { name, source })
}

/// An open SMTP session. Dropping it without calling [`Session::close`]
/// aborts the connection.
struct Session {
    conn: SmtpConnection,
    endpoint: String,
    closed: bool,
}

impl Session {
    fn open(config: &EmailConfig, hello_name: &ClientId) -> Result<Self, SendError> {
        let endpoint = config.endpoint();
        let connection_error = |source| SendError::Connection {
            endpoint: endpoint.clone(),
            source,
        };

        if config.security == Security::None && !is_loopback_host(&config.smtp_host) {
            warn!(
                endpoint = %endpoint,
                "SMTP_SECURITY=none: the app password will cross the network unencrypted"
            );
        }

        let server = (config.smtp_host.as_str(), config.smtp_port);
        let timeout = Some(config.timeout);
        let conn = match config.security {
            Security::Implicit => {
                let tls = TlsParameters::new(config.smtp_host.clone()).map_err(connection_error)?;
                SmtpConnection::connect(server, timeout, hello_name, Some(&tls), None)
            }
            Security::StartTls | Security::None => {
                SmtpConnection::connect(server, timeout, hello_name, None, None)
            }
        }
        .map_err(connection_error)?;

        let mut session = Session {
            conn,
            endpoint: endpoint.clone(),
            closed: false,
        };

        if config.security == Security::StartTls {
            let tls = TlsParameters::new(config.smtp_host.clone()).map_err(connection_error)?;
            session
                .conn
                .starttls(&tls, hello_name)
                .map_err(connection_error)?;
            debug!(endpoint = %session.endpoint, "connection encrypted");
        }

        Ok(session)
    }

    fn authenticate(&mut self, config: &EmailConfig) -> Result<(), SendError> {
        let credentials = Credentials::new(
            config.sender_email.trim().to_string(),
            config.sender_password.clone(),
        );

        match self.conn.auth(DEFAULT_MECHANISMS, &credentials) {
            Ok(response) => {
                debug!(code = %response.code(), "authenticated");
                Ok(())
            }
            Err(err) if is_rejection(&err) => Err(SendError::Authentication(err)),
            Err(source) => Err(SendError::Connection {
                endpoint: self.endpoint.clone(),
                source,
            }),
        }
    }

    fn send(&mut self, message: &Message) -> Result<(), SendError> {
        let response = self
            .conn
            .send(message.envelope(), &message.formatted())
            .map_err(SendError::Transmission)?;
        debug!(code = %response.code(), "message accepted");
        Ok(())
    }

    /// Ends the session with QUIT. The message has already been accepted, so
    /// a failure here is only logged.
    fn close(mut self) {
        if let Err(err) = self.conn.quit() {
            warn!(endpoint = %self.endpoint, error = %err, "QUIT failed after message was accepted");
        }
        self.closed = true;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            debug!(endpoint = %self.endpoint, "aborting smtp session");
            self.conn.abort();
        }
    }
}

/// True when the server answered with a negative reply, or no mechanism it
/// offers can be used, as opposed to the transport failing underneath.
fn is_rejection(err: &smtp::Error) -> bool {
    err.is_transient() || err.is_permanent() || err.is_client()
}

fn is_loopback_host(host: &str) -> bool {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}
