//! Database configuration module.
//!
//! This module handles the store connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs without hand-written SQL.

use crate::entities::{ClassEnrollment, Member, SystemState, Transaction};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/studio_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or
/// returns the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the store named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates every table the ledger uses, skipping tables that already exist.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut member_table = schema.create_table_from_entity(Member);
    let mut transaction_table = schema.create_table_from_entity(Transaction);
    let mut enrollment_table = schema.create_table_from_entity(ClassEnrollment);
    let mut system_state_table = schema.create_table_from_entity(SystemState);

    for table in [
        &mut member_table,
        &mut transaction_table,
        &mut enrollment_table,
        &mut system_state_table,
    ] {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    info!("Ledger tables ready");
    Ok(())
}
