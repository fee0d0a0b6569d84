//! The endpoint the frontend polls to decide whether to show the log-in form.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::AppState;

use super::{UserInfo, cookie::get_session_id_from_cookies, session::get_session};

/// The state needed to check a request's session.
#[derive(Debug, Clone)]
pub struct CheckAuthState {
    /// The key for decrypting the session cookie.
    pub cookie_key: Key,
    /// The app's database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CheckAuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<CheckAuthState> for Key {
    fn from_ref(state: &CheckAuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// The response to a session check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckAuthResponse {
    /// Whether the request carried a valid, unexpired session.
    pub authenticated: bool,
    /// The logged-in user, when authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

/// Handler that reports whether the request carries a live session.
///
/// This is a pure read: no session is created, refreshed, or deleted, and the
/// response is always 200. Any failure along the way simply reads as "not
/// authenticated".
pub async fn get_check_auth(
    State(state): State<CheckAuthState>,
    jar: PrivateCookieJar,
) -> Json<CheckAuthResponse> {
    let session = get_session_id_from_cookies(&jar).and_then(|session_id| {
        let connection = state.db_connection.lock().ok()?;

        get_session(&session_id, &connection).ok()
    });

    let user = session
        .filter(|session| !session.is_expired())
        .map(|session| UserInfo {
            username: session.data.username,
        });

    Json(CheckAuthResponse {
        authenticated: user.is_some(),
        user,
    })
}
