//! Schema versioning for the `SQLite` store.
//!
//! The base tables are created idempotently on every open; anything that
//! changes an existing database is a numbered step in [`MIGRATIONS`], applied
//! once in its own transaction and recorded in the `metadata` table.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// One forward-only schema change.
#[derive(Debug)]
struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

/// Steps in ascending version order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "trackers, contacts and location history",
        sql: "",
    },
];

/// Schema version a fully migrated database reports.
pub const CURRENT_VERSION: i32 = 1;

/// Create the base schema and apply any pending migrations.
///
/// # Errors
///
/// Returns an error if a statement fails, or if the database was written by a
/// newer version of crowdwatch.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported \
                 version {CURRENT_VERSION}"
            ),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > version) {
        apply(conn, migration)?;
    }
    Ok(())
}

/// Read the recorded schema version; 0 for a database that has none.
fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    if !migration.sql.trim().is_empty() {
        tx.execute_batch(migration.sql)
            .map_err(|e| Error::DatabaseMigration {
                message: format!("step {} failed: {e}", migration.version),
            })?;
    }
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, migration.version.to_string()),
    )?;
    tx.commit()?;

    info!(
        "Applied schema migration {}: {}",
        migration.version, migration.description
    );
    Ok(())
}
