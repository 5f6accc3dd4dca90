//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::info;

use crate::error::StreamError;

diesel::table! {
    activities (id) {
        id -> Text,
        payload -> Binary,
    }
}

diesel::table! {
    stream_entries (stream_id, activity_id) {
        stream_id -> Text,
        activity_id -> Text,
        score -> BigInt,
    }
}

diesel::table! {
    schema_version (version) {
        version -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(activities, stream_entries);

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), StreamError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.batch_execute(STREAM_SCHEMA)
            .map_err(|e| StreamError::BackendUnavailable(format!("Failed to create tables: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, StreamError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY NOT NULL)")
        .map_err(|e| StreamError::BackendUnavailable(format!("Failed to create schema_version table: {}", e)))?;

    let version = schema_version::table
        .select(schema_version::version)
        .first::<i32>(conn)
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), StreamError> {
    diesel::delete(schema_version::table).execute(conn)?;
    diesel::insert_into(schema_version::table)
        .values(schema_version::version.eq(version))
        .execute(conn)?;
    Ok(())
}

/// Activity records and per-stream ordered membership
const STREAM_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY NOT NULL,
    payload BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS stream_entries (
    stream_id TEXT NOT NULL,
    activity_id TEXT NOT NULL,
    score INTEGER NOT NULL,
    PRIMARY KEY (stream_id, activity_id)
);

CREATE INDEX IF NOT EXISTS idx_stream_entries_score
    ON stream_entries(stream_id, score, activity_id);
"#;
