//! Defines the core data models and database queries for expense records.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

// ============================================================================
// MODELS
// ============================================================================

/// A submitted expense report with its line items.
///
/// Records are immutable once created; there are no update or delete
/// endpoints. Only `local`, `fecha`, `usuario_registro`, and `fecha_registro`
/// are populated by submissions — the remaining columns exist for parity with
/// the historical schema and read back as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// The ID of the expense record.
    pub id: i64,
    /// The name of the store or location the expense belongs to.
    pub local: String,
    /// The provider the expense was paid to, if recorded.
    pub proveedor: Option<String>,
    /// The date the payment was made.
    pub fecha_pago: Option<String>,
    /// The date the service was rendered.
    pub fecha_servicio: Option<String>,
    /// The date entered on the submission form.
    pub fecha: Option<String>,
    /// The currency the expense was paid in.
    pub moneda: Option<String>,
    /// A record-level concept, if recorded.
    pub concepto: Option<String>,
    /// A record-level amount, if recorded.
    pub importe: Option<f64>,
    /// A record-level note, if recorded.
    pub observacion: Option<String>,
    /// The operation reference, if recorded.
    pub op: Option<String>,
    /// The username of the user that registered the expense.
    pub usuario_registro: String,
    /// When the record was registered.
    #[serde(with = "time::serde::rfc3339")]
    pub fecha_registro: OffsetDateTime,
    /// The line items of the expense, in insertion order.
    #[serde(default)]
    pub items: Vec<ExpenseItem>,
}

/// One line entry within an [ExpenseRecord].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseItem {
    /// The ID of the item.
    pub id: i64,
    /// The ID of the expense record that owns this item.
    pub pago_id: i64,
    /// What the money was spent on.
    pub concepto: String,
    /// The amount spent, always greater than zero.
    pub importe: f64,
    /// A free-form note, empty when none was given.
    pub observacion: String,
}

/// A validated expense submission, ready to be written to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    /// The name of the store or location the expense belongs to.
    pub local: String,
    /// The date entered on the submission form.
    pub fecha: String,
    /// The username of the submitting user.
    pub usuario_registro: String,
    /// The line items, at least one, each with a positive amount.
    pub items: Vec<NewExpenseItem>,
}

impl NewExpense {
    /// The sum of the item amounts.
    ///
    /// Computed on demand for the notification email; never stored on the
    /// parent record.
    pub fn total(&self) -> f64 {
        self.items.iter().map(|item| item.importe).sum()
    }
}

/// A validated line item for a [NewExpense].
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpenseItem {
    /// What the money was spent on.
    pub concepto: String,
    /// The amount spent, guaranteed positive by validation.
    pub importe: f64,
    /// A free-form note, defaulted to the empty string.
    pub observacion: String,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Write a validated expense and its items in a single transaction.
///
/// Either the parent row and every item row commit together, or none of them
/// do. Returns the generated record ID.
///
/// # Errors
/// Returns an [Error::SqlError] if any insert fails; the transaction is
/// rolled back when the error propagates.
pub fn create_expense(expense: &NewExpense, connection: &Connection) -> Result<i64, Error> {
    let tx = connection.unchecked_transaction()?;

    let pago_id: i64 = tx
        .prepare(
            "INSERT INTO pagos (local, fecha, usuario_registro, fecha_registro)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
        )?
        .query_row(
            (
                &expense.local,
                &expense.fecha,
                &expense.usuario_registro,
                OffsetDateTime::now_utc(),
            ),
            |row| row.get(0),
        )?;

    {
        let mut statement = tx.prepare(
            "INSERT INTO pago_items (pago_id, concepto, importe, observacion)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for item in &expense.items {
            statement.execute((pago_id, &item.concepto, item.importe, &item.observacion))?;
        }
    }

    tx.commit()?;

    Ok(pago_id)
}

/// Retrieve all expense records with their items embedded.
///
/// Records are ordered by registration time, most recent first; each record's
/// items are ordered by insertion (ascending ID). Items are fetched with one
/// query per record, which is fine at the volumes this service sees.
///
/// # Errors
/// Returns an [Error::SqlError] if there is a SQL error.
pub fn list_expenses(connection: &Connection) -> Result<Vec<ExpenseRecord>, Error> {
    let mut records: Vec<ExpenseRecord> = connection
        .prepare(
            "SELECT id, local, proveedor, fecha_pago, fecha_servicio, fecha, moneda, concepto,
                    importe, observacion, op, usuario_registro, fecha_registro
             FROM pagos
             ORDER BY fecha_registro DESC, id DESC",
        )?
        .query_map([], map_expense_row)?
        .collect::<Result<_, _>>()?;

    let mut statement = connection.prepare(
        "SELECT id, pago_id, concepto, importe, observacion
         FROM pago_items
         WHERE pago_id = :pago_id
         ORDER BY id ASC",
    )?;

    for record in &mut records {
        record.items = statement
            .query_map(&[(":pago_id", &record.id)], map_expense_item_row)?
            .collect::<Result<_, _>>()?;
    }

    Ok(records)
}

/// Create the expense record table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS pagos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                local TEXT NOT NULL,
                proveedor TEXT,
                fecha_pago TEXT,
                fecha_servicio TEXT,
                fecha TEXT,
                moneda TEXT,
                concepto TEXT,
                importe REAL,
                observacion TEXT,
                op TEXT,
                usuario_registro TEXT NOT NULL,
                fecha_registro TEXT NOT NULL
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('pagos', 0)",
        (),
    )?;

    Ok(())
}

/// Create the expense item table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_expense_item_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS pago_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pago_id INTEGER NOT NULL REFERENCES pagos(id) ON DELETE CASCADE,
                concepto TEXT NOT NULL,
                importe REAL NOT NULL,
                observacion TEXT
                )",
        (),
    )?;

    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('pago_items', 0)",
        (),
    )?;

    Ok(())
}

/// Map a database row to an [ExpenseRecord] with no items attached.
fn map_expense_row(row: &Row) -> Result<ExpenseRecord, rusqlite::Error> {
    Ok(ExpenseRecord {
        id: row.get(0)?,
        local: row.get(1)?,
        proveedor: row.get(2)?,
        fecha_pago: row.get(3)?,
        fecha_servicio: row.get(4)?,
        fecha: row.get(5)?,
        moneda: row.get(6)?,
        concepto: row.get(7)?,
        importe: row.get(8)?,
        observacion: row.get(9)?,
        op: row.get(10)?,
        usuario_registro: row.get(11)?,
        fecha_registro: row.get(12)?,
        items: Vec::new(),
    })
}

/// Map a database row to an [ExpenseItem].
fn map_expense_item_row(row: &Row) -> Result<ExpenseItem, rusqlite::Error> {
    Ok(ExpenseItem {
        id: row.get(0)?,
        pago_id: row.get(1)?,
        concepto: row.get(2)?,
        importe: row.get(3)?,
        observacion: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

// ============================================================================
// TESTS
// ============================================================================
