//! The endpoint for submitting a new expense report.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    expense::{NewExpense, NewExpenseItem, create_expense},
    notifier::{ExpenseNotification, Notifier},
};

/// The state needed to record an expense submission.
#[derive(Debug, Clone)]
pub struct SubmitExpenseState {
    /// The app's database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The handle used to queue the notification email.
    pub notifier: Notifier,
}

impl FromRef<AppState> for SubmitExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            notifier: state.notifier.clone(),
        }
    }
}

/// The body of an expense submission.
///
/// Every field is optional at the deserialization layer so that an incomplete
/// body produces the application's own error envelope instead of a generic
/// rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubmitPagoRequest {
    /// The store or location the expense belongs to.
    #[serde(default)]
    pub local: Option<String>,
    /// The date the expense applies to.
    #[serde(default)]
    pub fecha: Option<String>,
    /// The line items.
    #[serde(default)]
    pub items: Option<Vec<PagoItemInput>>,
}

/// One unvalidated line item of a submission.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PagoItemInput {
    /// What the money was spent on.
    #[serde(default)]
    pub concepto: Option<String>,
    /// The amount, as either a JSON number or a numeric string.
    #[serde(default)]
    pub importe: Option<serde_json::Value>,
    /// A free-form note.
    #[serde(default)]
    pub observacion: Option<String>,
}

/// The success response for an expense submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitPagoResponse {
    /// Always `true`.
    pub success: bool,
    /// A human readable confirmation.
    pub message: String,
    /// The ID of the newly created record.
    #[serde(rename = "pagoId")]
    pub pago_id: i64,
}

impl SubmitPagoRequest {
    /// Check the submission and convert it into a [NewExpense] attributed to
    /// `usuario_registro`.
    ///
    /// Validation stops at the first failure: the record-level fields are
    /// checked before any item, and items are checked in order.
    ///
    /// # Errors
    /// Returns [Error::MissingFields] if the location, date, or item list is
    /// absent or empty, [Error::IncompleteItem] if an item lacks a concept or
    /// an amount, and [Error::InvalidItemAmount] if an amount is not a number
    /// greater than zero.
    fn validate(self, usuario_registro: &str) -> Result<NewExpense, Error> {
        let local = self.local.filter(|local| !local.trim().is_empty());
        let fecha = self.fecha.filter(|fecha| !fecha.trim().is_empty());
        let items = self.items.filter(|items| !items.is_empty());

        let (Some(local), Some(fecha), Some(items)) = (local, fecha, items) else {
            return Err(Error::MissingFields);
        };

        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| validate_item(item, index + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewExpense {
            local,
            fecha,
            usuario_registro: usuario_registro.to_owned(),
            items,
        })
    }
}

/// Validate a single item. `position` is 1-based and only used in error
/// messages.
fn validate_item(item: PagoItemInput, position: usize) -> Result<NewExpenseItem, Error> {
    let concepto = item
        .concepto
        .map(|concepto| concepto.trim().to_owned())
        .filter(|concepto| !concepto.is_empty())
        .ok_or(Error::IncompleteItem(position))?;

    let importe = item.importe.ok_or(Error::IncompleteItem(position))?;
    let importe = parse_amount(&importe).ok_or(Error::InvalidItemAmount(position))?;

    Ok(NewExpenseItem {
        concepto,
        importe,
        observacion: item.observacion.unwrap_or_default(),
    })
}

/// Interpret a JSON value as a positive amount.
///
/// Clients send amounts both as numbers and as strings, so both forms are
/// accepted. Returns `None` unless the value is a finite number greater than
/// zero.
fn parse_amount(value: &serde_json::Value) -> Option<f64> {
    let amount = match value {
        serde_json::Value::Number(number) => number.as_f64()?,
        serde_json::Value::String(text) => text.trim().parse().ok()?,
        _ => return None,
    };

    (amount.is_finite() && amount > 0.0).then_some(amount)
}

/// A handler for creating an expense record from a submission.
///
/// The record and its items are written in one transaction, and the
/// notification email is queued after the commit so that a slow mail relay
/// never delays the response.
pub async fn submit_expense_endpoint(
    State(state): State<SubmitExpenseState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<SubmitPagoRequest>,
) -> Response {
    let new_expense = match request.validate(&user.username) {
        Ok(new_expense) => new_expense,
        Err(error) => return error.into_response(),
    };

    let pago_id = {
        let Ok(connection) = state.db_connection.lock() else {
            return Error::DatabaseLockError.into_response();
        };

        match create_expense(&new_expense, &connection) {
            Ok(pago_id) => pago_id,
            Err(error) => return error.into_response(),
        }
    };

    tracing::info!(
        pago_id,
        local = %new_expense.local,
        usuario = %new_expense.usuario_registro,
        items = new_expense.items.len(),
        "expense registered"
    );

    state
        .notifier
        .dispatch(ExpenseNotification::new(pago_id, &new_expense));

    (
        StatusCode::CREATED,
        Json(SubmitPagoResponse {
            success: true,
            message: "Gasto registrado correctamente".to_owned(),
            pago_id,
        }),
    )
        .into_response()
}
