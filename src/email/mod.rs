//! Email delivery: the [SendEmail] abstraction, an SMTP implementation, a
//! recording mock for tests, and the notification template.

use async_trait::async_trait;
use lettre::message::Mailbox;

mod senders;
pub mod template;

pub use senders::{MockSender, SmtpSender};

/// The errors that may occur while sending an email.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// The SMTP relay could not be reached or configured.
    #[error("could not connect to the SMTP relay: {0}")]
    RelayConnectionFailed(String),

    /// The message could not be assembled.
    #[error("could not build the email message: {0}")]
    InvalidMessage(#[from] lettre::error::Error),

    /// The relay rejected the message.
    #[error("could not send the email: {0}")]
    FailedToSend(#[from] lettre::transport::smtp::Error),
}

/// An email, ready to be handed to a [SendEmail] implementation.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// The subject line.
    pub subject: String,
    /// The body, HTML when `is_html` is set.
    pub body: String,
    /// The sender mailbox.
    pub from: Mailbox,
    /// The recipient mailboxes, at least one.
    pub to: Vec<Mailbox>,
    /// Whether the body should be sent with an HTML content type.
    pub is_html: bool,
}

/// A destination emails can be sent to.
///
/// The server uses an SMTP relay in production and a recording mock in tests
/// and local development.
#[async_trait]
pub trait SendEmail: Send + Sync {
    /// Deliver `message`.
    ///
    /// # Errors
    /// Returns an [EmailError] if the message cannot be built or delivered.
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}
