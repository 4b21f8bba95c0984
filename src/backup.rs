//! Numbered database backups and the expired-backup sweep.
//!
//! Every run copies the database to `<db_path>.backup.<n>` before any row is
//! touched. The copy is a plain file operation, outside the SQLite
//! transaction. After the run, backups older than the retention period are
//! offered for removal; nothing here deletes without the caller asking.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use thiserror::Error;

/// How many days a backup is kept before the sweep offers to remove it.
pub const DEFAULT_BACKUP_MAX_AGE_DAYS: u32 = 30;

const BACKUP_INFIX: &str = ".backup.";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to create backup at '{}': {source}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to scan for backups in '{}': {source}", .dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove backup '{}': {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Backup source '{}' has no file name", .0.display())]
    InvalidSource(PathBuf),

    #[error("No backup number left after {highest} for '{}'", .source_path.display())]
    NumbersExhausted { source_path: PathBuf, highest: u32 },
}

/// How the next backup number is chosen.
///
/// Both policies yield 1, 2, 3, ... while backups are only ever added. They
/// diverge once an intermediate backup is removed out of band: the smallest
/// unused number fills the gap, after-highest never revisits it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackupNumbering {
    #[default]
    SmallestUnused,
    AfterHighest,
}

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub source_path: PathBuf,
    pub sequence_number: u32,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// `<source>.backup.<n>`
pub fn backup_path(source: &Path, sequence_number: u32) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(format!("{}{}", BACKUP_INFIX, sequence_number));
    PathBuf::from(name)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackupManager {
    numbering: BackupNumbering,
}

impl BackupManager {
    pub fn new(numbering: BackupNumbering) -> Self {
        Self { numbering }
    }

    /// Pick the number the next backup of `source` will get.
    pub fn next_sequence_number(&self, source: &Path) -> Result<u32, BackupError> {
        match self.numbering {
            BackupNumbering::SmallestUnused => {
                let mut n = 1;
                while backup_path(source, n).exists() {
                    n += 1;
                }
                Ok(n)
            }
            BackupNumbering::AfterHighest => {
                let highest = scan_backups(source)?
                    .iter()
                    .map(|b| b.sequence_number)
                    .max()
                    .unwrap_or(0);
                highest
                    .checked_add(1)
                    .ok_or_else(|| BackupError::NumbersExhausted {
                        source_path: source.to_path_buf(),
                        highest,
                    })
            }
        }
    }

    /// Copy `source` to its next numbered backup path.
    ///
    /// A failed copy removes whatever part of the target was written and
    /// returns the attempted path in the error.
    pub fn create_backup(&self, source: &Path) -> Result<BackupArtifact, BackupError> {
        let sequence_number = self.next_sequence_number(source)?;
        let path = backup_path(source, sequence_number);

        if let Err(source_err) = std::fs::copy(source, &path) {
            let _ = std::fs::remove_file(&path);
            return Err(BackupError::Copy {
                path,
                source: source_err,
            });
        }

        log::info!("Database backed up to {}", path.display());
        Ok(BackupArtifact {
            source_path: source.to_path_buf(),
            sequence_number,
            path,
            created_at: Utc::now(),
        })
    }
}

/// Directory holding `source`; a bare file name lives in the current directory.
fn source_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn backup_name_pattern(source: &Path) -> Result<Regex, BackupError> {
    let base = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BackupError::InvalidSource(source.to_path_buf()))?;
    let pattern = format!(r"^{}\.backup\.(\d+)$", regex::escape(base));
    // Escaped input always compiles
    Regex::new(&pattern).map_err(|_| BackupError::InvalidSource(source.to_path_buf()))
}

/// Every backup of `source` found next to it, in directory order.
///
/// Only regular files named `<basename>.backup.<digits>` count; backups of
/// other databases sharing the directory are ignored.
pub fn scan_backups(source: &Path) -> Result<Vec<BackupArtifact>, BackupError> {
    let dir = source_dir(source);
    let pattern = backup_name_pattern(source)?;

    let entries = std::fs::read_dir(&dir).map_err(|e| BackupError::Scan {
        dir: dir.clone(),
        source: e,
    })?;

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(sequence_number) = pattern
            .captures(name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };
        let mtime = match path.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => continue,
        };
        found.push(BackupArtifact {
            source_path: source.to_path_buf(),
            sequence_number,
            path,
            created_at: DateTime::<Utc>::from(mtime),
        });
    }
    Ok(found)
}

/// Backups of `source` whose modification time is older than `max_age_days`.
///
/// Returned in no particular order. Nothing is deleted.
pub fn find_expired_backups(
    source: &Path,
    max_age_days: u32,
) -> Result<Vec<BackupArtifact>, BackupError> {
    let cutoff = Utc::now() - Duration::days(i64::from(max_age_days));
    Ok(scan_backups(source)?
        .into_iter()
        .filter(|b| b.created_at < cutoff)
        .collect())
}

/// Remove a backup file. Already gone counts as removed.
pub fn delete_backup(artifact: &BackupArtifact) -> Result<(), BackupError> {
    match std::fs::remove_file(&artifact.path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BackupError::Remove {
            path: artifact.path.clone(),
            source: e,
        }),
    }
}
