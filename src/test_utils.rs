//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    config::billing::BillingConfig,
    core::{
        member::{self, MemberDetails},
        month::MonthRef,
        transaction::{self, ExpenseKind},
    },
    entities::{MemberStatus, member as member_entity, transaction as transaction_entity},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool is pinned to a single connection: every new in-memory connection
/// would otherwise open its own empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Fixed instant used as "now" in tests (2024-03-15 12:00:00 UTC).
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

/// Default billing settings.
pub fn test_settings() -> BillingConfig {
    BillingConfig::default()
}

/// Parses a `YYYY-MM` key.
pub fn month(key: &str) -> MonthRef {
    key.parse().unwrap()
}

/// Builds a calendar date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Member details with no phone.
pub fn details(name: &str, monthly_fee: f64, due_day: Option<&str>) -> MemberDetails {
    MemberDetails {
        name: name.to_string(),
        phone: None,
        monthly_fee,
        due_day: due_day.map(ToString::to_string),
    }
}

/// Creates an active member.
pub async fn create_test_member(
    db: &DatabaseConnection,
    name: &str,
    monthly_fee: f64,
    due_day: Option<&str>,
) -> Result<member_entity::Model> {
    member::create_member(
        db,
        details(name, monthly_fee, due_day),
        MemberStatus::Active,
        test_now(),
    )
    .await
}

/// Creates a pending expense, fixed when recurring and variable otherwise.
pub async fn create_test_expense(
    db: &DatabaseConnection,
    month_ref: &str,
    description: &str,
    amount: f64,
    due_date: NaiveDate,
    is_recurring: bool,
) -> Result<transaction_entity::Model> {
    let kind = if is_recurring {
        ExpenseKind::Fixed
    } else {
        ExpenseKind::Variable
    };

    transaction::create_expense(
        db,
        month(month_ref),
        kind,
        description.to_string(),
        amount,
        due_date,
        is_recurring,
        test_now(),
    )
    .await
}
