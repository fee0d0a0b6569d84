//! The endpoint for logging in and opening a session.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{AppState, Error};

use super::{
    UserInfo, cookie::set_session_cookie, credentials::CredentialStore, session::create_session,
};

/// The state needed to verify a log-in attempt and open a session.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key for encrypting the session cookie.
    pub cookie_key: Key,
    /// The app's database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The registered users.
    pub credentials: Arc<CredentialStore>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
            credentials: state.credentials.clone(),
        }
    }
}

impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The body of a log-in request.
///
/// Both fields are optional at the deserialization layer so that an
/// incomplete body produces the application's own error envelope instead of a
/// generic rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogInData {
    /// The username entered during log-in.
    #[serde(default)]
    pub username: Option<String>,
    /// The password entered during log-in.
    #[serde(default)]
    pub password: Option<String>,
}

/// The success response for a log-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogInResponse {
    /// Always `true`.
    pub success: bool,
    /// A human readable confirmation.
    pub message: String,
    /// The logged-in user.
    pub user: UserInfo,
}

/// Handler for log-in requests.
///
/// On success the response carries the session cookie and the user's info; on
/// failure the standard error envelope.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The username or password is missing or empty.
/// - The credentials do not match a registered user.
/// - The session could not be created.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Json(data): Json<LogInData>,
) -> Response {
    let username = data.username.filter(|username| !username.trim().is_empty());
    let password = data.password.filter(|password| !password.is_empty());

    let (Some(username), Some(password)) = (username, password) else {
        return Error::MissingCredentials.into_response();
    };

    if !state.credentials.verify(&username, &password) {
        tracing::debug!("failed log-in attempt for {username}");
        return Error::InvalidCredentials.into_response();
    }

    let session = {
        let Ok(connection) = state.db_connection.lock() else {
            return Error::DatabaseLockError.into_response();
        };

        match create_session(&username, &connection) {
            Ok(session) => session,
            Err(error) => return error.into_response(),
        }
    };

    tracing::info!("{username} logged in");

    let jar = set_session_cookie(jar, &session);

    (
        StatusCode::OK,
        jar,
        Json(LogInResponse {
            success: true,
            message: "Login exitoso".to_owned(),
            user: UserInfo { username },
        }),
    )
        .into_response()
}

#[cfg(test)]
mod log_in_tests {
    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        ApiMessage, AppState, endpoints,
        auth::{CredentialStore, cookie::COOKIE_SESSION_ID},
        email::MockSender,
        notifier::{Notifier, NotifierConfig},
    };

    use super::{LogInResponse, post_log_in};

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
    async fn log_in_succeeds_with_valid_credentials() {
        let state = get_test_state();
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::LOG_IN_API)
            .content_type("application/json")
            .json(&json!({
                "username": "Lucas Ortiz",
                "password": "hunter2",
            }))
            .await;

        response.assert_status_ok();
        let body: LogInResponse = response.json();
        assert!(body.success);
        assert_eq!(body.message, "Login exitoso");
        assert_eq!(body.user.username, "Lucas Ortiz");

        let cookie = response.cookie(COOKIE_SESSION_ID);
        assert!(!cookie.value().is_empty());
        assert_eq!(count_sessions(&state), 1);
    }

    #[tokio::test]
    async fn log_in_fails_with_missing_credentials() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::LOG_IN_API)
            .content_type("application/json")
            .json(&json!({ "username": "Lucas Ortiz" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ApiMessage = response.json();
        assert_eq!(body.message, "Usuario y contraseña son requeridos");
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password_and_creates_no_session() {
        let state = get_test_state();
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::LOG_IN_API)
            .content_type("application/json")
            .json(&json!({
                "username": "Lucas Ortiz",
                "password": "definitelyNotTheCorrectPassword",
            }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: ApiMessage = response.json();
        assert_eq!(body.message, "Usuario o contraseña incorrectos");
        assert_eq!(count_sessions(&state), 0);
    }

    #[tokio::test]
    async fn unknown_user_gets_the_same_message_as_a_wrong_password() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::LOG_IN_API)
            .content_type("application/json")
            .json(&json!({
                "username": "nobody",
                "password": "hunter2",
            }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: ApiMessage = response.json();
        assert_eq!(body.message, "Usuario o contraseña incorrectos");
    }
}
