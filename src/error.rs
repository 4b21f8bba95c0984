//! Error types for a prune run
//!
//! Errors are classified by where the run stops:
//! - Input: missing database, no date bound, inverted range, unknown account.
//!   Reported before any backup or mutation.
//! - Backup: the copy failed. Reported before any row is touched.
//! - Storage: a table failed mid-delete. Earlier tables stay committed.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::backup::BackupError;
use crate::db::DbError;

/// Error types for a prune run
#[derive(Debug, Error)]
pub enum PruneError {
    // Input validation
    #[error("Database path '{0}' doesn't exist!")]
    DatabaseNotFound(PathBuf),

    #[error("Must set either '-a' or '-b' !")]
    NoDateBound,

    #[error("'after_date' ({after}) must be earlier than 'before_date' ({before}) !")]
    InvertedRange { after: NaiveDate, before: NaiveDate },

    #[error("Account '{account}' doesn't exist in database! Existing accounts: {existing:?}")]
    UnknownAccount {
        account: String,
        existing: Vec<String>,
    },

    #[error("Unrecognised date '{0}'")]
    InvalidDate(String),

    // Backup
    #[error(transparent)]
    Backup(#[from] BackupError),

    // Storage
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Failed to prune table '{table}': {source}")]
    TableFailed {
        table: &'static str,
        #[source]
        source: DbError,
    },

    // Operator I/O
    #[error("Input closed before an answer was given")]
    InputClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PruneError {
    /// Returns true if the error was raised before any backup or mutation.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PruneError::DatabaseNotFound(_)
                | PruneError::NoDateBound
                | PruneError::InvertedRange { .. }
                | PruneError::UnknownAccount { .. }
                | PruneError::InvalidDate(_)
        )
    }
}
