//! Server-side sessions stored in the `session` table.
//!
//! The cookie only carries an opaque session ID; the session row in the
//! database is the authority on who is logged in and until when.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::Error;

/// How long a session stays valid after log-in.
///
/// The window is fixed: activity does not extend it, so a user logs in at
/// most once a day.
pub const SESSION_LIFETIME: Duration = Duration::hours(24);

/// The JSON payload stored in a session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// The username the session belongs to.
    pub username: String,
    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub login_time: OffsetDateTime,
}

/// A log-in session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The opaque ID stored in the client's cookie.
    pub id: String,
    /// The session payload.
    pub data: SessionData,
    /// When the session stops being valid.
    pub expiry: OffsetDateTime,
}

impl Session {
    /// Whether the session's lifetime has elapsed.
    pub fn is_expired(&self) -> bool {
        self.expiry <= OffsetDateTime::now_utc()
    }
}

/// Create the session table and its expiry index in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
                sid TEXT PRIMARY KEY,
                sess TEXT NOT NULL,
                expire INTEGER NOT NULL
                )",
        (),
    )?;

    // The cleanup task deletes by expiry, so keep that scan off the table.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_expire ON session (expire)",
        (),
    )?;

    Ok(())
}

/// Create and persist a session for `username`.
///
/// The session ID is a fresh UUID, which makes it unguessable even before the
/// cookie layer's encryption.
///
/// # Errors
/// Returns an [Error::JSONSerializationError] if the payload cannot be
/// serialized, or an [Error::SqlError] if the insert fails.
pub fn create_session(username: &str, connection: &Connection) -> Result<Session, Error> {
    let now = OffsetDateTime::now_utc();
    let session = Session {
        id: Uuid::new_v4().to_string(),
        data: SessionData {
            username: username.to_owned(),
            login_time: now,
        },
        expiry: now + SESSION_LIFETIME,
    };

    let payload = serde_json::to_string(&session.data)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    connection.execute(
        "INSERT INTO session (sid, sess, expire) VALUES (?1, ?2, ?3)",
        (&session.id, &payload, session.expiry.unix_timestamp()),
    )?;

    Ok(session)
}

/// Retrieve the session with the given ID.
///
/// Expired sessions are still returned while the cleanup task has not swept
/// them; callers must check [Session::is_expired].
///
/// # Errors
/// Returns an [Error::NotFound] if there is no such session, or an
/// [Error::SqlError] if there is a SQL error.
pub fn get_session(session_id: &str, connection: &Connection) -> Result<Session, Error> {
    connection
        .prepare("SELECT sid, sess, expire FROM session WHERE sid = :sid")?
        .query_one(&[(":sid", session_id)], map_session_row)
        .map_err(Error::from)
}

/// Delete the session with the given ID. Deleting a session that does not
/// exist is not an error.
///
/// # Errors
/// Returns an [Error::SqlError] if there is a SQL error.
pub fn delete_session(session_id: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM session WHERE sid = :sid", &[(":sid", session_id)])?;

    Ok(())
}

/// Delete every session whose lifetime has elapsed, returning how many rows
/// were removed.
///
/// # Errors
/// Returns an [Error::SqlError] if there is a SQL error.
pub fn delete_expired_sessions(connection: &Connection) -> Result<usize, Error> {
    let deleted = connection.execute(
        "DELETE FROM session WHERE expire <= ?1",
        [OffsetDateTime::now_utc().unix_timestamp()],
    )?;

    Ok(deleted)
}

/// An async task that periodically removes expired session rows.
///
/// Expiry is already enforced on every request, so this only keeps the table
/// from accumulating dead rows.
pub async fn clear_expired_sessions_task(
    db_connection: Arc<Mutex<Connection>>,
    period: std::time::Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let result = {
            let Ok(connection) = db_connection.lock() else {
                tracing::error!("session cleanup could not acquire the database lock");
                continue;
            };

            delete_expired_sessions(&connection)
        };

        match result {
            Ok(0) => {}
            Ok(deleted) => tracing::info!("removed {deleted} expired session(s)"),
            Err(error) => tracing::error!("could not remove expired sessions: {error}"),
        }
    }
}

fn map_session_row(row: &Row) -> Result<Session, rusqlite::Error> {
    let id: String = row.get(0)?;
    let payload: String = row.get(1)?;
    let expire: i64 = row.get(2)?;

    let data: SessionData = serde_json::from_str(&payload).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(error))
    })?;

    let expiry = OffsetDateTime::from_unix_timestamp(expire).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Integer,
            Box::new(error),
        )
    })?;

    Ok(Session { id, data, expiry })
}
