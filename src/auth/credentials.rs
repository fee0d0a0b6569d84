//! The in-memory credential table, loaded once at start-up from a plain text
//! file of `username:bcrypt_hash` lines.

use std::{
    collections::HashMap,
    fs,
    io::{Error as IoError, ErrorKind},
    path::Path,
};

/// The registered users and their bcrypt password hashes.
///
/// The table is read-only after start-up; new users are added with the
/// `add_user` binary and picked up on the next restart.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    /// Load the credential table from `path`.
    ///
    /// Blank lines and lines starting with `#` are skipped. Each remaining
    /// line must be `username:bcrypt_hash`; the hash may itself contain
    /// colons, so only the first colon splits the line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is malformed.
    pub fn from_file(path: &Path) -> Result<Self, IoError> {
        let contents = fs::read_to_string(path)?;
        let mut store = Self::default();

        for (line_number, line) in contents.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((username, hash)) = line.split_once(':') else {
                return Err(IoError::new(
                    ErrorKind::InvalidData,
                    format!(
                        "line {} of {} is not in the form username:hash",
                        line_number + 1,
                        path.display()
                    ),
                ));
            };

            store.insert(username, hash);
        }

        Ok(store)
    }

    /// Whether a user with this username is registered.
    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    /// Add or replace a user's password hash.
    pub fn insert(&mut self, username: &str, password_hash: &str) {
        self.users
            .insert(username.to_owned(), password_hash.to_owned());
    }

    /// Check a username and password against the table.
    ///
    /// Unknown usernames and wrong passwords both return `false`; a malformed
    /// stored hash is logged and also treated as a failed log-in.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(hash) = self.users.get(username) else {
            return false;
        };

        match bcrypt::verify(password, hash) {
            Ok(matches) => matches,
            Err(error) => {
                tracing::error!("could not verify the password hash for {username}: {error}");
                false
            }
        }
    }
}
