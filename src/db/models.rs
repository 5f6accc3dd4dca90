//! Diesel model definitions for the activity table
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)

use diesel::prelude::*;

use super::schema::activities;

/// Stored activity payload
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = activities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActivityRow {
    pub id: String,
    pub payload: Vec<u8>,
}

/// Activity payload for INSERT OR REPLACE
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = activities)]
pub struct NewActivity<'a> {
    pub id: &'a str,
    pub payload: &'a [u8],
}

