//! Run configuration for both binaries.
//!
//! `PruneConfig` is the validated form of the command line. Everything that
//! can be checked without opening the database is checked here, so a bad
//! invocation exits before any file is touched.
//!
//! `WrapperConfig` is read from the environment by the analytics wrapper.

use std::path::{Path, PathBuf};

use crate::backup::BackupNumbering;
use crate::cli::Cli;
use crate::error::PruneError;
use crate::filter::{AccountScope, RetentionWindow};

#[derive(Debug, Clone)]
pub struct PruneConfig {
    pub db_path: PathBuf,
    pub account: AccountScope,
    pub window: RetentionWindow,
    pub backup_max_age_days: u32,
    pub numbering: BackupNumbering,
}

impl PruneConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, PruneError> {
        if !cli.db_path.is_file() {
            return Err(PruneError::DatabaseNotFound(cli.db_path));
        }
        let window = RetentionWindow::new(cli.before, cli.after)?;
        let numbering = if cli.no_reuse_backup_numbers {
            BackupNumbering::AfterHighest
        } else {
            BackupNumbering::SmallestUnused
        };

        Ok(Self {
            db_path: cli.db_path,
            account: AccountScope::parse(&cli.account),
            window,
            backup_max_age_days: cli.backup_max_age_days,
            numbering,
        })
    }

    /// Human summary of what the run deletes, e.g.
    /// `Delete all records for account 'x', before '2023-12-31'`.
    pub fn describe_query(&self) -> String {
        let mut parts = Vec::new();
        if let AccountScope::Only(account) = &self.account {
            parts.push(format!("for account '{}'", account));
        }
        if let Some(before) = self.window.before() {
            parts.push(format!("before '{}'", before));
        }
        if let Some(after) = self.window.after() {
            parts.push(format!("after '{}'", after));
        }
        format!("Delete all records {}", parts.join(", "))
    }
}

const DEFAULT_MB_DB_PATH: &str = "/data/metabase";
const DEFAULT_MB_JAR: &str = "/app/metabase.jar";
const DEFAULT_MB_RUN_COMMAND: &str = "/app/run_metabase.sh";

/// Paths for the analytics server wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperConfig {
    /// Directory holding the server's embedded H2 database (`MB_DB_FILE`).
    pub db_dir: PathBuf,
    /// SQL script to seed a freshly created database (`MB_DB_INIT_SQL_FILE`).
    pub init_sql_file: Option<PathBuf>,
    /// Where to export the database after the server exits (`MB_DB_SAVE_TO_SQL_FILE`).
    pub save_sql_file: Option<PathBuf>,
    pub jar: PathBuf,
    pub run_command: String,
}

impl WrapperConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let db_dir = non_empty("MB_DB_FILE").unwrap_or_else(|| DEFAULT_MB_DB_PATH.to_string());

        Self {
            db_dir: expand_home(&db_dir),
            init_sql_file: non_empty("MB_DB_INIT_SQL_FILE").map(PathBuf::from),
            save_sql_file: non_empty("MB_DB_SAVE_TO_SQL_FILE").map(PathBuf::from),
            jar: non_empty("MB_JAR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MB_JAR)),
            run_command: non_empty("MB_RUN_COMMAND")
                .unwrap_or_else(|| DEFAULT_MB_RUN_COMMAND.to_string()),
        }
    }

    /// The H2 database file inside `db_dir`, named after the directory.
    pub fn db_file(&self) -> PathBuf {
        match self.db_dir.file_name() {
            Some(name) => self.db_dir.join(name),
            None => self.db_dir.join("metabase"),
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(raw)
}
