//! SQLite access to the scraper's exchange database.
//!
//! The file is owned by the scraper; this tool opens it read-write, applies
//! the schema once the run is past validation and backup, and otherwise only
//! counts and deletes rows. It assumes exclusive write access for the length
//! of a run.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::catalog::{describe, ACCOUNT_REGISTRY};

pub mod types;
pub use types::*;

pub struct RecordsDb {
    conn: Connection,
}

impl RecordsDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open an existing database file and apply the schema.
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        let db = Self::open_existing(path)?;
        db.apply_schema()?;
        Ok(db)
    }

    /// Open an existing database file without touching its schema.
    ///
    /// The file is never created here: a missing path is an input error the
    /// caller reports before connecting.
    pub fn open_existing(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Create any missing record tables. Existing rows are left alone.
    pub fn apply_schema(&self) -> Result<(), DbError> {
        crate::migrations::run_migrations(&self.conn).map_err(DbError::Migration)?;
        Ok(())
    }

    /// Open a scratch in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self { conn };
        db.apply_schema()?;
        Ok(db)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    /// Distinct non-null accounts recorded in the balance table, sorted.
    ///
    /// A file without a balance table has no known accounts.
    pub fn distinct_accounts(&self) -> Result<Vec<String>, DbError> {
        let registry = describe(ACCOUNT_REGISTRY);
        if !self.table_exists(registry.table)? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT account FROM {} WHERE account IS NOT NULL ORDER BY account",
            registry.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }
}
