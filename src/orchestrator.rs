//! One prune run, end to end.
//!
//! Order of work:
//! 1. open the database and check the account exists (input errors stop here,
//!    with the file untouched)
//! 2. copy the database to its next numbered backup (a failed copy stops here),
//!    then create any missing record tables
//! 3. walk the catalog: count, report, confirm, then recount and delete in a
//!    transaction of its own per table
//! 4. offer to remove backups past the retention period
//!
//! Commits are per table. A failure partway through leaves earlier tables'
//! deletions in place and later tables untouched; the backup from step 2 is
//! the recovery point.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::backup::{self, BackupArtifact, BackupManager};
use crate::catalog::{descriptors, EntityDescriptor};
use crate::config::PruneConfig;
use crate::confirm::{Confirmer, Decision};
use crate::db::{DbError, RecordsDb};
use crate::error::PruneError;
use crate::filter::{self, build_predicate, AccountScope, RetentionQuery, RetentionWindow};

const TABLE_SEPARATOR: &str = "====================================================";

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    pub table: &'static str,
    pub matched: i64,
    pub deleted: usize,
    pub decision: Decision,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub tables: Vec<TableOutcome>,
}

impl PruneReport {
    pub fn total_matched(&self) -> i64 {
        self.tables.iter().map(|t| t.matched).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.tables.iter().map(|t| t.deleted).sum()
    }
}

/// Result of the post-run backup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub expired: usize,
    pub removed: usize,
    pub failed: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub backup: BackupArtifact,
    pub report: PruneReport,
    pub sweep: SweepOutcome,
}

/// Refuse a scoped run for an account the balance table has never seen.
pub fn validate_account(db: &RecordsDb, account: &AccountScope) -> Result<(), PruneError> {
    let AccountScope::Only(name) = account else {
        return Ok(());
    };
    let existing = db.distinct_accounts()?;
    if existing.iter().any(|a| a == name) {
        Ok(())
    } else {
        Err(PruneError::UnknownAccount {
            account: name.clone(),
            existing,
        })
    }
}

/// Walks the catalog for one account scope and window.
pub struct Pruner<'a> {
    account: &'a AccountScope,
    window: RetentionWindow,
}

impl<'a> Pruner<'a> {
    pub fn new(account: &'a AccountScope, window: RetentionWindow) -> Self {
        Self { account, window }
    }

    /// One pass over every table in catalog order.
    ///
    /// Stops at the first table whose count or delete fails; tables before it
    /// stay committed.
    pub fn prune_all<R: BufRead, W: Write>(
        &self,
        db: &RecordsDb,
        confirmer: &mut Confirmer<R, W>,
    ) -> Result<PruneReport, PruneError> {
        let mut report = PruneReport::default();
        for descriptor in descriptors() {
            report.tables.push(self.prune_table(db, descriptor, confirmer)?);
        }
        log::info!(
            "Prune pass finished: {} of {} matching records deleted",
            report.total_deleted(),
            report.total_matched()
        );
        Ok(report)
    }

    fn prune_table<R: BufRead, W: Write>(
        &self,
        db: &RecordsDb,
        descriptor: &'static EntityDescriptor,
        confirmer: &mut Confirmer<R, W>,
    ) -> Result<TableOutcome, PruneError> {
        let table = descriptor.table;
        let failed = |source: DbError| PruneError::TableFailed { table, source };

        let query = RetentionQuery {
            descriptor,
            account: self.account,
            window: self.window,
        };
        let predicate = build_predicate(descriptor, &query);

        writeln!(confirmer.output(), "{}", TABLE_SEPARATOR)?;
        let matched = filter::count(db.conn_ref(), &predicate).map_err(failed)?;
        if matched == 0 {
            writeln!(confirmer.output(), "No records to delete from {}.", table)?;
        } else {
            writeln!(
                confirmer.output(),
                "Deleting {} records from table '{}'.",
                matched,
                table
            )?;
        }

        let decision = confirmer.decide(table, matched)?;
        if !decision.deletes() {
            return Ok(TableOutcome {
                table,
                matched,
                deleted: 0,
                decision,
            });
        }

        let deleted = db
            .with_transaction(|db| {
                let recount = filter::count(db.conn_ref(), &predicate)?;
                if recount != matched {
                    log::warn!(
                        "Row count for '{}' changed from {} to {} since it was reported",
                        table,
                        matched,
                        recount
                    );
                }
                filter::delete(db.conn_ref(), &predicate)
            })
            .map_err(failed)?;

        log::info!("Deleted {} records from '{}'", deleted, table);
        Ok(TableOutcome {
            table,
            matched,
            deleted,
            decision,
        })
    }
}

/// Offer to remove backups of `db_path` older than `max_age_days`.
///
/// A scan or removal failure is reported and the sweep carries on; only the
/// operator's input closing is an error.
pub fn sweep_backups<R: BufRead, W: Write>(
    db_path: &Path,
    max_age_days: u32,
    confirmer: &mut Confirmer<R, W>,
) -> Result<SweepOutcome, PruneError> {
    let mut outcome = SweepOutcome::default();

    let expired = match backup::find_expired_backups(db_path, max_age_days) {
        Ok(found) => found,
        Err(e) => {
            log::warn!("Backup sweep skipped: {}", e);
            writeln!(confirmer.output(), "Could not scan for old backups: {}", e)?;
            return Ok(outcome);
        }
    };
    outcome.expired = expired.len();
    if expired.is_empty() {
        return Ok(outcome);
    }

    if !confirmer.ask_yes_no("Old backups detected, delete them?")? {
        return Ok(outcome);
    }

    for artifact in &expired {
        match backup::delete_backup(artifact) {
            Ok(()) => {
                log::info!("Removed old backup {}", artifact.path.display());
                outcome.removed += 1;
            }
            Err(e) => {
                log::warn!("{}", e);
                writeln!(confirmer.output(), "{}", e)?;
                outcome.failed.push(artifact.path.clone());
            }
        }
    }
    Ok(outcome)
}

/// Run the whole tool against `config`, prompting on `input` and reporting to
/// `output`.
pub fn run<R: BufRead, W: Write>(
    config: &PruneConfig,
    input: R,
    output: W,
) -> Result<RunSummary, PruneError> {
    let db = RecordsDb::open_existing(&config.db_path)?;
    validate_account(&db, &config.account)?;

    let backup = BackupManager::new(config.numbering).create_backup(&config.db_path)?;
    db.apply_schema()?;

    let mut confirmer = Confirmer::new(input, output);
    writeln!(
        confirmer.output(),
        "Created backup of database file at '{}'",
        backup.path.display()
    )?;
    writeln!(confirmer.output(), "Given query: {}", config.describe_query())?;

    let report = Pruner::new(&config.account, config.window).prune_all(&db, &mut confirmer)?;
    confirmer.finish();
    drop(db);

    let sweep = sweep_backups(&config.db_path, config.backup_max_age_days, &mut confirmer)?;

    Ok(RunSummary {
        backup,
        report,
        sweep,
    })
}
