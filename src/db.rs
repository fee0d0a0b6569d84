//! Database initialization for the application's SQLite schema.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error,
    auth::session::create_session_table,
    expense::{create_expense_item_table, create_expense_table},
};

/// Create the application's tables if they do not exist.
///
/// Tables are created inside a single exclusive transaction so that two
/// processes racing to initialize the same database cannot observe a
/// half-created schema.
///
/// # Errors
/// Returns an [Error::SqlError] if a table or index cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // SQLite leaves foreign keys off by default. The cascade delete on
    // pago_items depends on this being set on every connection.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_expense_table(&transaction)?;
    create_expense_item_table(&transaction)?;
    create_session_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let mut statement = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = statement
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(Result::unwrap)
            .collect();

        for table in ["pagos", "pago_items", "session"] {
            assert!(
                tables.iter().any(|name| name == table),
                "table {table} was not created, got {tables:?}"
            );
        }
    }

    #[test]
    fn is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();
        initialize(&conn).expect("initializing twice should not fail");
    }
}
