//! Retention tool for the exchange scraper database.
//!
//! Deletes records outside a date window, for one account or all of them,
//! after taking a numbered backup of the database file, then offers to
//! remove backups past their retention period.

pub mod backup;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod db;
pub mod error;
pub mod filter;
mod migrations;
pub mod orchestrator;
pub mod supervisor;
pub mod util;

pub use error::PruneError;
