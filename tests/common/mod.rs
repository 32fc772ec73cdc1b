// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};
use tally::application::{AppError, ErrorKind, LedgerService};
use tally::config::LedgerConfig;
use tally::domain::NewTransaction;
use tempfile::TempDir;

pub const ALICE: &str = "alice";
pub const ACCT1: &str = "acct1";

/// Config pointing at a fresh database inside `temp_dir`
pub fn test_config(temp_dir: &TempDir) -> LedgerConfig {
    LedgerConfig::new(temp_dir.path().join("test.db"))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&test_config(&temp_dir)).await?;
    Ok((service, temp_dir))
}

/// Same as [`test_service`] with a custom store timeout
pub async fn test_service_with_timeout(timeout: Duration) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir).with_store_timeout(timeout);
    let service = LedgerService::init(&config).await?;
    Ok((service, temp_dir))
}

/// A second, independent connection to the test database
pub async fn raw_connection(temp_dir: &TempDir) -> Result<SqliteConnection> {
    let conn = SqliteConnectOptions::new()
        .filename(temp_dir.path().join("test.db"))
        .connect()
        .await?;
    Ok(conn)
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Post a transaction and return the resulting balance
pub async fn post(
    service: &LedgerService,
    user: &str,
    account: &str,
    amount: i64,
    name: &str,
) -> Result<i64, AppError> {
    service
        .post_transaction(user, account, NewTransaction::new(amount, name))
        .await
        .map(|posted| posted.balance)
}

/// Test fixture: alice/acct1 after salary (+100.00) and rent (-30.00)
pub async fn alice_with_seventy(service: &LedgerService) -> Result<()> {
    post(service, ALICE, ACCT1, 10000, "salary").await?;
    post(service, ALICE, ACCT1, -3000, "rent").await?;
    Ok(())
}

pub fn assert_kind<T: std::fmt::Debug>(result: Result<T, AppError>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected {:?} error, got Ok({:?})", kind, value),
        Err(err) => assert_eq!(err.kind(), kind, "unexpected error: {}", err),
    }
}
