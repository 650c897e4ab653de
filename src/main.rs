use std::process::ExitCode;

use mailprobe::{send_test_email, EmailConfig, SendError, Stage, StagedError, Transport};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match Transport::from_env() {
        Ok(Transport::Smtp) => finish(send_over_smtp()),
        #[cfg(feature = "sendgrid")]
        Ok(Transport::SendGrid) => finish(send_over_sendgrid()),
        Err(err) => finish::<SendError>(Err(err.into())),
    }
}

fn send_over_smtp() -> Result<String, SendError> {
    let config = EmailConfig::from_env()?;
    send_test_email(&config)?;
    Ok(format!("Email sent successfully to {}", config.recipient_email))
}

#[cfg(feature = "sendgrid")]
fn send_over_sendgrid() -> Result<String, mailprobe::SendGridError> {
    let config = mailprobe::SendGridConfig::from_env()?;
    let receipt = mailprobe::send_test_email_sendgrid(&config)?;
    Ok(format!(
        "Email sent successfully via SendGrid\n  Status code: {}\n  To: {}\n  From: {}",
        receipt.status.as_u16(),
        config.recipient_email,
        config.sender_email
    ))
}

fn finish<E: StagedError>(result: Result<String, E>) -> ExitCode {
    match result {
        Ok(summary) => {
            println!("✓ {summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            debug!(stage = %err.stage(), error = ?err, "send failed");
            eprintln!("✗ {err}");
            if err.stage() == Stage::Authentication {
                eprintln!("  Check the sender credentials. Providers such as Gmail reject the account password once 2-step verification is on; use an app password or API key.");
            }
            ExitCode::from(err.exit_code())
        }
    }
}
