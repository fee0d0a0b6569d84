//! The [SendEmail](crate::email::SendEmail) implementations.

mod mock;
mod smtp;

pub use mock::MockSender;
pub use smtp::SmtpSender;
