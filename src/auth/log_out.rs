//! The endpoint for logging out and closing the session.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;

use crate::{ApiMessage, AppState};

use super::{
    cookie::{get_session_id_from_cookies, invalidate_session_cookie},
    session::delete_session,
};

/// The state needed to close a session.
#[derive(Debug, Clone)]
pub struct LogOutState {
    /// The key for decrypting the session cookie.
    pub cookie_key: Key,
    /// The app's database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<LogOutState> for Key {
    fn from_ref(state: &LogOutState) -> Self {
        state.cookie_key.clone()
    }
}

/// Handler for log-out requests.
///
/// Deletes the session row if one is referenced by the cookie, then expires
/// the cookie. Logging out without a session still succeeds, so the endpoint
/// is safe to call unauthenticated.
pub async fn post_log_out(State(state): State<LogOutState>, jar: PrivateCookieJar) -> Response {
    if let Some(session_id) = get_session_id_from_cookies(&jar) {
        let result = {
            let Ok(connection) = state.db_connection.lock() else {
                return log_out_error();
            };

            delete_session(&session_id, &connection)
        };

        if let Err(error) = result {
            tracing::error!("could not delete session: {error}");
            return log_out_error();
        }
    }

    let jar = invalidate_session_cookie(jar);

    (
        StatusCode::OK,
        jar,
        Json(ApiMessage {
            success: true,
            message: "Sesión cerrada correctamente".to_owned(),
        }),
    )
        .into_response()
}

fn log_out_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiMessage {
            success: false,
            message: "Error al cerrar sesión".to_owned(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod log_out_tests {
    use axum::{
        Router,
        routing::{get, post},
    };
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        ApiMessage, AppState, endpoints,
        auth::{CredentialStore, cookie::COOKIE_SESSION_ID, get_check_auth, post_log_in},
        email::MockSender,
        notifier::{Notifier, NotifierConfig},
    };

    use super::post_log_out;

    fn get_test_state() -> AppState {
        let db_connection = Connection::open_in_memory().unwrap();
        let mut credentials = CredentialStore::default();
        credentials.insert("Lucas Ortiz", &bcrypt::hash("hunter2", 4).unwrap());

        let (notifier, _) = Notifier::spawn(
            std::sync::Arc::new(MockSender::new()),
            NotifierConfig::test(),
        );

        AppState::new(db_connection, "foobar", credentials, notifier).unwrap()
    }

    fn get_test_server(state: AppState) -> TestServer {
        let app = Router::new()
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .route(endpoints::LOG_OUT_API, post(post_log_out))
            .route(endpoints::CHECK_AUTH_API, get(get_check_auth))
            .with_state(state);

        TestServer::new(app)
    }

    fn count_sessions(state: &AppState) -> i64 {
        state
            .db_connection
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(sid) FROM session", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn log_out_deletes_the_session_and_expires_the_cookie() {
        let state = get_test_state();
        let server = get_test_server(state.clone());

        let log_in_response = server
            .post(endpoints::LOG_IN_API)
            .content_type("application/json")
            .json(&json!({
                "username": "Lucas Ortiz",
                "password": "hunter2",
            }))
            .await;
        let session_cookie = log_in_response.cookie(COOKIE_SESSION_ID);
        assert_eq!(count_sessions(&state), 1);

        let response = server
            .post(endpoints::LOG_OUT_API)
            .add_cookie(session_cookie)
            .await;

        response.assert_status_ok();
        let body: ApiMessage = response.json();
        assert!(body.success);
        assert_eq!(body.message, "Sesión cerrada correctamente");
        assert_eq!(count_sessions(&state), 0);

        let replacement = response.cookie(COOKIE_SESSION_ID);
        assert_eq!(replacement.max_age(), Some(time::Duration::ZERO));
    }

    #[tokio::test]
    async fn log_out_without_a_session_still_succeeds() {
        let server = get_test_server(get_test_state());

        let response = server.post(endpoints::LOG_OUT_API).await;

        response.assert_status_ok();
        let body: ApiMessage = response.json();
        assert!(body.success);
    }
}
