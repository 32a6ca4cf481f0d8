//! Account storage: registration rows and the points ledger.
//!
//! All balance mutation lives here, behind conditional SQL updates, so
//! concurrent requests cannot drive a balance negative.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

/// Errors from account operations.
#[derive(Debug)]
pub enum UserStoreError {
    Storage(String),
    /// Registration with an email that already has an account.
    EmailTaken(String),
    /// The referenced account does not exist.
    UnknownUser(String),
    /// A debit was attempted against an empty balance.
    InsufficientPoints,
}

impl fmt::Display for UserStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
            Self::EmailTaken(email) => write!(f, "email '{email}' is already registered"),
            Self::UnknownUser(email) => write!(f, "no account for '{email}'"),
            Self::InsufficientPoints => write!(f, "insufficient points"),
        }
    }
}

impl std::error::Error for UserStoreError {}

/// An account row. The hash is a PHC string; the plaintext password
/// never reaches this module.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub points: i64,
    pub is_admin: bool,
}

/// SQLite-backed account store.
///
/// Wraps a `Connection` in a `Mutex` so it is `Send + Sync`.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open (or create) the accounts database at `path`.
    pub fn open(path: &Path) -> Result<Self, UserStoreError> {
        let conn = Connection::open(path).map_err(|e| {
            UserStoreError::Storage(format!("failed to open database '{}': {e}", path.display()))
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory accounts database (for testing).
    pub fn open_in_memory() -> Result<Self, UserStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| UserStoreError::Storage(format!("failed to open in-memory db: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), UserStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                points INTEGER NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| UserStoreError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Create an account with an already-hashed password and a starting
    /// balance.
    pub fn create(
        &self,
        email: &str,
        password_hash: &str,
        initial_points: i64,
    ) -> Result<User, UserStoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let result = conn.execute(
            "INSERT INTO users (email, password_hash, points, is_admin, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![email, password_hash, initial_points, now],
        );

        match result {
            Ok(_) => Ok(User {
                id: conn.last_insert_rowid(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                points: initial_points,
                is_admin: false,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(UserStoreError::EmailTaken(email.to_string()))
            }
            Err(e) => Err(UserStoreError::Storage(format!(
                "failed to create account: {e}"
            ))),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, email, password_hash, points, is_admin FROM users WHERE email = ?1",
            params![email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    points: row.get(3)?,
                    is_admin: row.get::<_, i64>(4)? != 0,
                })
            },
        )
        .optional()
        .map_err(|e| UserStoreError::Storage(format!("lookup failed: {e}")))
    }

    /// Debit one point if the balance is positive; returns the new
    /// balance. The conditional update is the authoritative check, so a
    /// concurrent spend between precondition and debit cannot overdraw.
    pub fn debit_point(&self, email: &str) -> Result<i64, UserStoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE users SET points = points - 1 WHERE email = ?1 AND points > 0",
                params![email],
            )
            .map_err(|e| UserStoreError::Storage(format!("debit failed: {e}")))?;

        if updated == 1 {
            return conn
                .query_row(
                    "SELECT points FROM users WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )
                .map_err(|e| UserStoreError::Storage(format!("balance read failed: {e}")));
        }

        // Nothing updated: either the account is unknown or the balance
        // was already zero.
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| UserStoreError::Storage(format!("lookup failed: {e}")))?;
        match exists {
            Some(_) => Err(UserStoreError::InsufficientPoints),
            None => Err(UserStoreError::UnknownUser(email.to_string())),
        }
    }

    /// Credit an account; returns the new balance.
    pub fn add_points(&self, email: &str, amount: i64) -> Result<i64, UserStoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE users SET points = points + ?2 WHERE email = ?1",
                params![email, amount],
            )
            .map_err(|e| UserStoreError::Storage(format!("credit failed: {e}")))?;

        if updated == 0 {
            return Err(UserStoreError::UnknownUser(email.to_string()));
        }

        conn.query_row(
            "SELECT points FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .map_err(|e| UserStoreError::Storage(format!("balance read failed: {e}")))
    }

    /// Grant or revoke admin rights on an existing account.
    pub fn set_admin(&self, email: &str, is_admin: bool) -> Result<(), UserStoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE users SET is_admin = ?2 WHERE email = ?1",
                params![email, is_admin as i64],
            )
            .map_err(|e| UserStoreError::Storage(format!("admin update failed: {e}")))?;

        if updated == 0 {
            return Err(UserStoreError::UnknownUser(email.to_string()));
        }
        Ok(())
    }
}
