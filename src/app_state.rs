//! The state shared between route handlers.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};

use crate::{Error, auth::CredentialStore, db::initialize, notifier::Notifier};

/// The state shared between all route handlers.
///
/// Every field is cheap to clone; handlers take the substate they need via
/// `FromRef`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key for signing and encrypting the session cookie.
    pub cookie_key: Key,
    /// The app's SQLite database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The registered users and their password hashes.
    pub credentials: Arc<CredentialStore>,
    /// The handle for queueing notification emails.
    pub notifier: Notifier,
}

impl AppState {
    /// Create the app state, initializing the database schema.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the schema cannot be created.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        credentials: CredentialStore,
        notifier: Notifier,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            db_connection: Arc::new(Mutex::new(db_connection)),
            credentials: Arc::new(credentials),
            notifier,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Derive the cookie key from an arbitrary secret string.
///
/// `Key::from` requires at least 64 bytes, so the secret is stretched with
/// SHA-512 first.
fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
