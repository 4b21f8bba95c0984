//! Row selection for a prune: which rows of a table fall outside the window.
//!
//! A predicate is built per table from the run's account scope and date
//! window, then used twice: once to count for the operator, and again inside
//! the delete transaction to recount and remove.

use chrono::NaiveDate;
use rusqlite::{params_from_iter, Connection};

use crate::catalog::{EntityDescriptor, TimeKind};
use crate::db::DbError;
use crate::error::PruneError;

/// Account sentinel meaning "every account".
pub const ALL_ACCOUNTS: &str = "all";

/// Which accounts a run touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountScope {
    All,
    Only(String),
}

impl AccountScope {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == ALL_ACCOUNTS {
            AccountScope::All
        } else {
            AccountScope::Only(trimmed.to_string())
        }
    }
}

/// Dates outside which records are deleted.
///
/// Records strictly before `before` and strictly after `after` qualify. At
/// least one bound is always set, and `after <= before` when both are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    before: Option<NaiveDate>,
    after: Option<NaiveDate>,
}

impl RetentionWindow {
    pub fn new(before: Option<NaiveDate>, after: Option<NaiveDate>) -> Result<Self, PruneError> {
        match (before, after) {
            (None, None) => Err(PruneError::NoDateBound),
            (Some(before), Some(after)) if after > before => {
                Err(PruneError::InvertedRange { after, before })
            }
            _ => Ok(Self { before, after }),
        }
    }

    pub fn before(&self) -> Option<NaiveDate> {
        self.before
    }

    pub fn after(&self) -> Option<NaiveDate> {
        self.after
    }
}

/// One table's slice of a run.
#[derive(Debug, Clone)]
pub struct RetentionQuery<'a> {
    pub descriptor: &'a EntityDescriptor,
    pub account: &'a AccountScope,
    pub window: RetentionWindow,
}

/// A parameterised `WHERE` clause against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    table: &'static str,
    clauses: Vec<String>,
    params: Vec<String>,
}

impl Predicate {
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn where_clause(&self) -> String {
        self.clauses.join(" AND ")
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    fn push(&mut self, clause: String, param: String) {
        self.clauses.push(clause);
        self.params.push(param);
    }
}

/// Render a bound the way the column stores its values.
///
/// A datetime bound is midnight at full precision, so a row stamped exactly
/// at midnight on the `after` date is not strictly after it.
fn sql_bound(date: NaiveDate, kind: TimeKind) -> String {
    match kind {
        TimeKind::Date => date.format("%Y-%m-%d").to_string(),
        TimeKind::DateTime => date.format("%Y-%m-%d 00:00:00.000000").to_string(),
    }
}

/// Compose, in order: `time < before`, `time > after`, `account = ?`.
///
/// The account clause is only added for a scoped run against a table that
/// has an account column.
pub fn build_predicate(descriptor: &EntityDescriptor, query: &RetentionQuery<'_>) -> Predicate {
    let mut predicate = Predicate {
        table: descriptor.table,
        clauses: Vec::new(),
        params: Vec::new(),
    };

    if let Some(before) = query.window.before() {
        predicate.push(
            format!("{} < ?", descriptor.time_column),
            sql_bound(before, descriptor.time_kind),
        );
    }
    if let Some(after) = query.window.after() {
        predicate.push(
            format!("{} > ?", descriptor.time_column),
            sql_bound(after, descriptor.time_kind),
        );
    }
    if let AccountScope::Only(account) = query.account {
        if descriptor.has_account_column {
            predicate.push("account = ?".to_string(), account.clone());
        }
    }

    predicate
}

/// Count matching rows. Read-only; safe to call any number of times.
pub fn count(conn: &Connection, predicate: &Predicate) -> Result<i64, DbError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        predicate.table,
        predicate.where_clause()
    );
    let n = conn.query_row(&sql, params_from_iter(predicate.params.iter()), |row| {
        row.get(0)
    })?;
    Ok(n)
}

/// Delete matching rows, returning how many went.
pub fn delete(conn: &Connection, predicate: &Predicate) -> Result<usize, DbError> {
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        predicate.table,
        predicate.where_clause()
    );
    let n = conn.execute(&sql, params_from_iter(predicate.params.iter()))?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{describe, Entity};
    use crate::db::RecordsDb;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed_orders(db: &RecordsDb) {
        db.conn_ref()
            .execute_batch(
                "INSERT INTO orders (registration_datetime, account, symbol) VALUES
                    ('2023-01-01 00:00:00.000000', 'x', 'BTCUSDT'),
                    ('2023-06-01 00:00:00.000000', 'x', 'BTCUSDT'),
                    ('2024-01-01 00:00:00.000000', 'x', 'BTCUSDT'),
                    ('2023-03-01 00:00:00.000000', 'y', 'ETHUSDT');",
            )
            .expect("seed orders");
    }

    fn count_orders(db: &RecordsDb, account: &AccountScope, window: RetentionWindow) -> i64 {
        let descriptor = describe(Entity::Orders);
        let query = RetentionQuery {
            descriptor,
            account,
            window,
        };
        count(db.conn_ref(), &build_predicate(descriptor, &query)).expect("count")
    }

    #[test]
    fn test_window_requires_a_bound() {
        assert!(matches!(
            RetentionWindow::new(None, None),
            Err(PruneError::NoDateBound)
        ));
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let err = RetentionWindow::new(Some(date("2023-01-01")), Some(date("2023-02-01")));
        assert!(matches!(err, Err(PruneError::InvertedRange { .. })));
    }

    #[test]
    fn test_window_accepts_equal_bounds() {
        let d = date("2023-01-01");
        assert!(RetentionWindow::new(Some(d), Some(d)).is_ok());
    }

    #[test]
    fn test_account_scope_parse() {
        assert_eq!(AccountScope::parse(" all "), AccountScope::All);
        assert_eq!(
            AccountScope::parse(" binance_01\n"),
            AccountScope::Only("binance_01".into())
        );
        assert_eq!(AccountScope::parse("ALL"), AccountScope::Only("ALL".into()));
    }

    #[test]
    fn test_predicate_clause_order() {
        let descriptor = describe(Entity::Trade);
        let account = AccountScope::Only("x".into());
        let window = RetentionWindow::new(Some(date("2023-12-31")), Some(date("2023-01-01"))).unwrap();
        let query = RetentionQuery {
            descriptor,
            account: &account,
            window,
        };

        let predicate = build_predicate(descriptor, &query);

        assert_eq!(predicate.table(), "trade");
        assert_eq!(predicate.where_clause(), "time < ? AND time > ? AND account = ?");
        assert_eq!(
            predicate.params(),
            ["2023-12-31 00:00:00.000000", "2023-01-01 00:00:00.000000", "x"]
        );
    }

    #[test]
    fn test_predicate_skips_account_for_accountless_table() {
        let descriptor = EntityDescriptor {
            has_account_column: false,
            ..*describe(Entity::CurrentPrice)
        };
        let account = AccountScope::Only("x".into());
        let window = RetentionWindow::new(Some(date("2023-12-31")), None).unwrap();
        let query = RetentionQuery {
            descriptor: &descriptor,
            account: &account,
            window,
        };

        let predicate = build_predicate(&descriptor, &query);
        assert_eq!(predicate.where_clause(), "registration_datetime < ?");
    }

    #[test]
    fn test_before_selects_older_rows_for_account() {
        let db = RecordsDb::open_in_memory().expect("open");
        seed_orders(&db);
        let window = RetentionWindow::new(Some(date("2023-12-31")), None).unwrap();

        assert_eq!(count_orders(&db, &AccountScope::Only("x".into()), window), 2);
        assert_eq!(count_orders(&db, &AccountScope::All, window), 3);
    }

    #[test]
    fn test_after_selects_newer_rows() {
        let db = RecordsDb::open_in_memory().expect("open");
        seed_orders(&db);
        let window = RetentionWindow::new(None, Some(date("2023-06-01"))).unwrap();

        assert_eq!(count_orders(&db, &AccountScope::Only("x".into()), window), 1);
    }

    #[test]
    fn test_midnight_on_after_date_is_kept() {
        let db = RecordsDb::open_in_memory().expect("open");
        db.conn_ref()
            .execute_batch(
                "INSERT INTO orders (registration_datetime, account, symbol) VALUES
                    ('2023-06-01 00:00:00.000000', 'x', 'BTCUSDT'),
                    ('2023-06-01 00:00:00', 'x', 'BTCUSDT'),
                    ('2023-06-01 00:00:00.000001', 'x', 'BTCUSDT'),
                    ('2023-06-01 12:30:00.000000', 'x', 'BTCUSDT');",
            )
            .expect("seed");
        let window = RetentionWindow::new(None, Some(date("2023-06-01"))).unwrap();

        // Only the two rows later than midnight are strictly after the date
        assert_eq!(count_orders(&db, &AccountScope::All, window), 2);
    }

    #[test]
    fn test_date_column_bound_has_no_time_part() {
        let descriptor = describe(Entity::DailyBalance);
        let account = AccountScope::All;
        let window = RetentionWindow::new(Some(date("2023-06-01")), Some(date("2023-01-01"))).unwrap();
        let query = RetentionQuery {
            descriptor,
            account: &account,
            window,
        };

        let predicate = build_predicate(descriptor, &query);
        assert_eq!(predicate.params(), ["2023-06-01", "2023-01-01"]);
    }

    #[test]
    fn test_both_bounds_intersect() {
        let db = RecordsDb::open_in_memory().expect("open");
        seed_orders(&db);
        let window =
            RetentionWindow::new(Some(date("2023-12-31")), Some(date("2023-02-01"))).unwrap();

        assert_eq!(count_orders(&db, &AccountScope::All, window), 2);
    }

    #[test]
    fn test_count_has_no_side_effects() {
        let db = RecordsDb::open_in_memory().expect("open");
        seed_orders(&db);
        let window = RetentionWindow::new(Some(date("2023-12-31")), None).unwrap();
        let account = AccountScope::All;

        let first = count_orders(&db, &account, window);
        let second = count_orders(&db, &account, window);
        assert_eq!(first, second);
    }

    #[test]
    fn test_delete_removes_exactly_the_counted_rows() {
        let db = RecordsDb::open_in_memory().expect("open");
        seed_orders(&db);
        let descriptor = describe(Entity::Orders);
        let account = AccountScope::Only("x".into());
        let window = RetentionWindow::new(Some(date("2023-12-31")), None).unwrap();
        let query = RetentionQuery {
            descriptor,
            account: &account,
            window,
        };
        let predicate = build_predicate(descriptor, &query);

        let counted = count(db.conn_ref(), &predicate).unwrap();
        let deleted = delete(db.conn_ref(), &predicate).unwrap();

        assert_eq!(counted, 2);
        assert_eq!(deleted, 2);
        assert_eq!(count(db.conn_ref(), &predicate).unwrap(), 0);
        let remaining: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 2);
    }

    #[test]
    fn test_day_column_compares_as_date() {
        let db = RecordsDb::open_in_memory().expect("open");
        db.conn_ref()
            .execute_batch(
                "INSERT INTO daily_balance (day, account) VALUES
                    ('2023-05-31', 'x'), ('2023-06-01', 'x'), ('2023-06-02', 'x');",
            )
            .unwrap();
        let descriptor = describe(Entity::DailyBalance);
        let account = AccountScope::All;
        let window = RetentionWindow::new(Some(date("2023-06-01")), None).unwrap();
        let query = RetentionQuery {
            descriptor,
            account: &account,
            window,
        };

        let n = count(db.conn_ref(), &build_predicate(descriptor, &query)).unwrap();
        assert_eq!(n, 1);
    }
}
