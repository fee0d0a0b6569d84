//! Email delivery through an authenticated SMTP relay.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};

use crate::email::{EmailError, EmailMessage, SendEmail};

/// Sends emails through an SMTP relay over TLS.
#[derive(Clone)]
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSender {
    /// Create a sender that authenticates against `relay` with the given
    /// credentials.
    ///
    /// # Errors
    /// Returns an [EmailError::RelayConnectionFailed] if the relay name is
    /// not valid.
    pub fn new(relay: &str, username: String, password: String) -> Result<Self, EmailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)
            .map_err(|error| EmailError::RelayConnectionFailed(error.to_string()))?
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl SendEmail for SmtpSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let mut builder = Message::builder()
            .from(message.from)
            .subject(message.subject)
            .header(if message.is_html {
                ContentType::TEXT_HTML
            } else {
                ContentType::TEXT_PLAIN
            });

        for recipient in message.to {
            builder = builder.to(recipient);
        }

        let email = builder.body(message.body)?;

        self.transport.send(email).await?;

        Ok(())
    }
}
