//! The endpoint for reading back the expense history.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    ApiMessage, AppState, Error,
    expense::{ExpenseRecord, list_expenses},
};

/// The state needed to list expense records.
#[derive(Debug, Clone)]
pub struct ListExpensesState {
    /// The app's database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListExpensesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The success response for the expense listing, newest record first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagoListResponse {
    /// Always `true`.
    pub success: bool,
    /// The expense records with their items embedded.
    pub data: Vec<ExpenseRecord>,
}

/// A handler for listing all expense records with their items.
pub async fn list_expenses_endpoint(State(state): State<ListExpensesState>) -> Response {
    let result = {
        let Ok(connection) = state.db_connection.lock() else {
            return Error::DatabaseLockError.into_response();
        };

        list_expenses(&connection)
    };

    match result {
        Ok(data) => Json(PagoListResponse {
            success: true,
            data,
        })
        .into_response(),
        Err(error) => {
            tracing::error!("could not list expenses: {error}");

            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiMessage {
                    success: false,
                    message: "Error al obtener los datos".to_owned(),
                }),
            )
                .into_response()
        }
    }
}
