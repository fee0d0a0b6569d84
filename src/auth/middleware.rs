//! Middleware that checks for a valid session before letting a request
//! through.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;

use crate::{AppState, Error, endpoints};

use super::{
    AuthenticatedUser,
    cookie::get_session_id_from_cookies,
    session::{Session, get_session},
};

/// The state needed to verify a request's session.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key for decrypting the session cookie.
    pub cookie_key: Key,
    /// The app's database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that rejects API requests without a valid, unexpired
/// session.
///
/// On success the requester's [AuthenticatedUser] is placed into the request
/// extensions and the request executed normally; otherwise a 401 with the
/// standard error envelope is returned.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(user): Extension<AuthenticatedUser>` to receive the identity.
pub async fn auth_guard_api(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, || {
        Error::Unauthenticated.into_response()
    })
    .await
}

/// Middleware function for HTML page routes: same check as [auth_guard_api],
/// but an unauthenticated browser is redirected to the log-in page instead of
/// receiving a JSON error.
pub async fn auth_guard_page(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, || {
        Redirect::to(endpoints::LOG_IN_VIEW).into_response()
    })
    .await
}

async fn auth_guard_internal(
    state: AuthState,
    request: Request,
    next: Next,
    reject: impl Fn() -> Response,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(&mut parts, &state)
        .await
        .expect("could not get cookie jar from request parts");

    let Some(session_id) = get_session_id_from_cookies(&jar) else {
        return reject();
    };

    let session: Session = {
        let Ok(connection) = state.db_connection.lock() else {
            return Error::DatabaseLockError.into_response();
        };

        match get_session(&session_id, &connection) {
            Ok(session) => session,
            Err(Error::NotFound) => return reject(),
            Err(error) => return error.into_response(),
        }
    };

    // Expired rows linger until the cleanup task sweeps them, so the window
    // is enforced here as well.
    if session.is_expired() {
        return reject();
    }

    parts.extensions.insert(AuthenticatedUser {
        username: session.data.username,
    });
    let request = Request::from_parts(parts, body);

    next.run(request).await
}
