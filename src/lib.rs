//! Gastos is a small web backend for registering store expense reports
//! ("pagos") with line items.
//!
//! Authenticated users submit an expense record through a JSON API, the
//! record and its items are written to SQLite in a single transaction, and an
//! email notification is dispatched to the finance inbox by a background
//! worker without blocking the response.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::{Deserialize, Serialize};
use tokio::signal;

mod app_state;
pub mod auth;
mod db;
pub mod email;
mod endpoints;
pub mod expense;
mod health;
pub mod notifier;
mod routing;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The uniform envelope for API responses that only carry an outcome and a
/// human readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Whether the request succeeded.
    pub success: bool,
    /// A human readable description of the outcome.
    pub message: String,
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The log-in request did not include both a username and a password.
    #[error("Usuario y contraseña son requeridos")]
    MissingCredentials,

    /// The username or password did not match a registered user.
    ///
    /// The message is intentionally the same for an unknown user and a wrong
    /// password so that the endpoint cannot be used to enumerate users.
    #[error("Usuario o contraseña incorrectos")]
    InvalidCredentials,

    /// The request did not carry a valid, unexpired session.
    #[error("No autorizado. Por favor, inicie sesión.")]
    Unauthenticated,

    /// An expense submission was missing its location, date, or items, or the
    /// item list was empty.
    #[error("Local, fecha y al menos un item son requeridos")]
    MissingFields,

    /// An expense item was missing its concept or amount.
    ///
    /// The payload is the 1-based position of the first offending item.
    #[error("El item {0} debe tener concepto e importe")]
    IncompleteItem(usize),

    /// An expense item's amount did not parse as a finite number greater than
    /// zero. The payload is the item's 1-based position.
    #[error("El importe del item {0} debe ser un número válido mayor a 0")]
    InvalidItemAmount(usize),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while serializing or deserializing a session payload
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::MissingCredentials
            | Error::MissingFields
            | Error::IncompleteItem(_)
            | Error::InvalidItemAmount(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::InvalidCredentials | Error::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            // Store and serialization errors are not intended to be shown to
            // the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error interno del servidor".to_owned(),
                )
            }
        };

        (
            status,
            Json(ApiMessage {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{ApiMessage, Error};

    async fn envelope_of(error: Error) -> (StatusCode, ApiMessage) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let envelope = serde_json::from_slice(&bytes).unwrap();

        (status, envelope)
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests_with_the_item_position() {
        let (status, envelope) = envelope_of(Error::InvalidItemAmount(2)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!envelope.success);
        assert_eq!(
            envelope.message,
            "El importe del item 2 debe ser un número válido mayor a 0"
        );
    }

    #[tokio::test]
    async fn auth_errors_are_unauthorized() {
        let (status, envelope) = envelope_of(Error::Unauthenticated).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!envelope.success);
    }

    #[tokio::test]
    async fn store_errors_do_not_leak_details() {
        let (status, envelope) = envelope_of(Error::DatabaseLockError).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message, "Error interno del servidor");
    }
}
