use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

/// Transactional mail. Without SMTP settings messages are only logged.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
}

impl Mailer {
    pub fn new(config: Option<&SmtpConfig>) -> Result<Self, EmailError> {
        let Some(config) = config else {
            tracing::warn!("SMTP is not configured, outgoing mail will only be logged");
            return Ok(Self {
                transport: None,
                from_address: String::new(),
            });
        };

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport: Some(transport),
            from_address: config.from_address.clone(),
        })
    }

    pub async fn send_vendor_otp(&self, to: &str, name: &str, otp: &str) -> Result<(), EmailError> {
        let body = format!(
            "Hello {name},\n\n\
             Your vendor account verification code is {otp}.\n\
             The code expires in 10 minutes.\n\n\
             If you did not request this, you can ignore this message.\n"
        );
        self.send_text(to, "Verify your vendor account", body).await
    }

    async fn send_text(&self, to: &str, subject: &str, body: String) -> Result<(), EmailError> {
        let Some(transport) = &self.transport else {
            tracing::debug!(to, subject, body = %body, "mail not sent, SMTP disabled");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        transport.send(email).await?;
        tracing::info!(to, subject, "mail sent");
        Ok(())
    }
}
