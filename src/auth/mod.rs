//! Authentication: the credential table, server-side sessions, the private
//! session cookie, the auth guard middleware, and the log-in, log-out, and
//! session-check endpoints.

use serde::{Deserialize, Serialize};

pub mod cookie;
pub mod credentials;
pub mod middleware;
pub mod session;

mod check;
mod log_in;
mod log_out;

pub use check::{CheckAuthResponse, CheckAuthState, get_check_auth};
pub use credentials::CredentialStore;
pub use log_in::{LogInData, LogInResponse, LogInState, post_log_in};
pub use log_out::{LogOutState, post_log_out};

/// The identity the auth guard attaches to a request once its session has
/// been verified.
///
/// Handlers behind the guard receive it through
/// `Extension(user): Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    /// The username the session was created for.
    pub username: String,
}

/// The public view of a logged-in user, as returned by the log-in and
/// session-check endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// The user's username.
    pub username: String,
}
