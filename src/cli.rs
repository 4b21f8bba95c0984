//! Command-line surface of `prune-records`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::backup::DEFAULT_BACKUP_MAX_AGE_DAYS;
use crate::util::parse_date;

#[derive(Parser, Debug)]
#[command(
    name = "prune-records",
    version,
    about = "Removes old records from DB",
    after_help = "If you get a readonly database error, try running with sudo"
)]
pub struct Cli {
    /// The path to the database file. Example: ./data/exchanges_db.sqlite
    #[arg(value_name = "DB_PATH")]
    pub db_path: PathBuf,

    /// The account to delete records for. Use 'all' to delete records from all accounts.
    #[arg(value_name = "ACCOUNT")]
    pub account: String,

    /// Deletes all records before this date.
    #[arg(short = 'b', long = "before_date", value_name = "BEFORE_DATE", value_parser = date_arg)]
    pub before: Option<NaiveDate>,

    /// Deletes all records after this date.
    #[arg(short = 'a', long = "after_date", value_name = "AFTER_DATE", value_parser = date_arg)]
    pub after: Option<NaiveDate>,

    /// Backups older than this many days are offered for removal after the run.
    #[arg(long, value_name = "DAYS", default_value_t = DEFAULT_BACKUP_MAX_AGE_DAYS)]
    pub backup_max_age_days: u32,

    /// Number new backups after the highest existing one instead of filling gaps.
    #[arg(long)]
    pub no_reuse_backup_numbers: bool,
}

fn date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_positionals_and_short_flags() {
        let cli = Cli::try_parse_from([
            "prune-records",
            "./data/exchanges_db.sqlite",
            "binance_01",
            "-b",
            "2023-12-31",
            "-a",
            "01/15/2023",
        ])
        .expect("parse");

        assert_eq!(cli.db_path, PathBuf::from("./data/exchanges_db.sqlite"));
        assert_eq!(cli.account, "binance_01");
        assert_eq!(cli.before, NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(cli.after, NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(cli.backup_max_age_days, 30);
        assert!(!cli.no_reuse_backup_numbers);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "prune-records",
            "db.sqlite",
            "all",
            "--after_date",
            "2024-02-01",
            "--backup-max-age-days",
            "7",
        ])
        .expect("parse");

        assert_eq!(cli.before, None);
        assert_eq!(cli.after, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(cli.backup_max_age_days, 7);
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let result = Cli::try_parse_from(["prune-records", "db.sqlite", "all", "-b", "someday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_account_is_rejected() {
        assert!(Cli::try_parse_from(["prune-records", "db.sqlite"]).is_err());
    }
}
