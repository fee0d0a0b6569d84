//! A sender that records messages instead of delivering them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::email::{EmailError, EmailMessage, SendEmail};

/// Records every message it is asked to send.
///
/// Used by tests to assert on notifications, and by the server when no SMTP
/// relay is configured so that local development does not need one.
#[derive(Debug, Clone, Default)]
pub struct MockSender {
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MockSender {
    /// Create an empty recording sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages recorded so far.
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl SendEmail for MockSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        tracing::debug!(
            subject = %message.subject,
            "recording email instead of sending it"
        );
        self.messages.lock().unwrap().push(message);

        Ok(())
    }
}
