//! SQLite backend using Diesel with r2d2 connection pooling
//!
//! Activity payloads live in `activities`, stream membership in
//! `stream_entries` keyed by `(stream_id, activity_id)` so re-adding an id
//! refreshes its score in place. Range reads join each entry to its payload
//! in a single statement; bulk payload lookups run in chunks inside one
//! transaction.

use std::collections::HashMap;
use std::path::Path;

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::Sqlite;
use tracing::debug;

use super::StreamBackend;
use crate::db::models::{ActivityRow, NewActivity};
use crate::db::schema::{self, activities, stream_entries};
use crate::db::{self as pool, DbPool, PoolSettings, PooledConn};
use crate::error::StreamError;
use crate::index::{FetchedEntry, RangeQuery};

/// Activity stream backend over a pooled SQLite database
pub struct SqliteBackend {
    pool: DbPool,
}

impl SqliteBackend {
    /// Wrap an existing pool and make sure the schema exists
    pub fn new(pool: DbPool) -> Result<Self, StreamError> {
        {
            let mut conn = pool.get()?;
            schema::init_schema(&mut conn)?;
        }
        Ok(Self { pool })
    }

    /// Open (or create) a database file with its own pool
    pub fn open(path: &Path, settings: &PoolSettings) -> Result<Self, StreamError> {
        Self::new(pool::open_pool(path, settings)?)
    }

    /// Private in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StreamError> {
        Self::new(pool::open_in_memory_pool()?)
    }

    /// The pool this backend draws connections from
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConn, StreamError> {
        Ok(self.pool.get()?)
    }
}

/// Ids bound per `IN (...)` payload lookup, well under SQLite's host
/// parameter limit
const FETCH_CHUNK_SIZE: usize = 500;

/// Apply a range's bound and ordering to a boxed `stream_entries` query
macro_rules! order_by_range {
    ($query:expr, $range:expr) => {
        match *$range {
            RangeQuery::Latest { .. } => $query.order((
                stream_entries::score.desc(),
                stream_entries::activity_id.desc(),
            )),
            RangeQuery::AtOrBelow { max, .. } => $query
                .filter(stream_entries::score.le(max))
                .order((stream_entries::score.desc(), stream_entries::activity_id.desc())),
            RangeQuery::AtOrAbove { min, .. } => $query
                .filter(stream_entries::score.ge(min))
                .order((stream_entries::score.asc(), stream_entries::activity_id.asc())),
        }
    };
}

fn sql_limit(range: &RangeQuery) -> i64 {
    range.limit().map(|l| l as i64).unwrap_or(i64::MAX)
}

/// Member ids of a stream for `range`, in the range's order
fn select_range(
    conn: &mut SqliteConnection,
    stream_id: &str,
    range: &RangeQuery,
) -> Result<Vec<String>, StreamError> {
    let query: stream_entries::BoxedQuery<'_, Sqlite, Text> = stream_entries::table
        .filter(stream_entries::stream_id.eq(stream_id))
        .select(stream_entries::activity_id)
        .into_boxed();

    let ids = order_by_range!(query, range)
        .limit(sql_limit(range))
        .offset(range.offset() as i64)
        .load::<String>(conn)?;

    Ok(ids)
}

/// Member ids of a stream for `range` joined with their payloads, in one
/// statement so the page size is not bounded by bind parameters
fn select_range_with_payloads(
    conn: &mut SqliteConnection,
    stream_id: &str,
    range: &RangeQuery,
) -> Result<Vec<FetchedEntry>, StreamError> {
    let query = stream_entries::table
        .left_join(activities::table.on(activities::id.eq(stream_entries::activity_id)))
        .filter(stream_entries::stream_id.eq(stream_id))
        .select((stream_entries::activity_id, activities::payload.nullable()))
        .into_boxed();

    let rows = order_by_range!(query, range)
        .limit(sql_limit(range))
        .offset(range.offset() as i64)
        .load::<(String, Option<Vec<u8>>)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(activity_id, payload)| FetchedEntry { activity_id, payload })
        .collect())
}

/// Payloads for `ids`, preserving the order of `ids`
fn select_payloads(
    conn: &mut SqliteConnection,
    ids: &[String],
    chunk_size: usize,
) -> Result<Vec<FetchedEntry>, StreamError> {
    let mut payloads: HashMap<String, Vec<u8>> = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(chunk_size.max(1)) {
        let rows: Vec<ActivityRow> = activities::table
            .filter(activities::id.eq_any(chunk))
            .select(ActivityRow::as_select())
            .load(conn)?;
        payloads.extend(rows.into_iter().map(|row| (row.id, row.payload)));
    }

    Ok(ids
        .iter()
        .map(|id| FetchedEntry {
            activity_id: id.clone(),
            payload: payloads.get(id).cloned(),
        })
        .collect())
}

impl StreamBackend for SqliteBackend {
    fn fetch(&self, id: &str) -> Result<Option<Vec<u8>>, StreamError> {
        let mut conn = self.conn()?;
        let payload = activities::table
            .find(id)
            .select(activities::payload)
            .first::<Vec<u8>>(&mut conn)
            .optional()?;
        Ok(payload)
    }

    fn fetch_many(&self, ids: &[String]) -> Result<Vec<FetchedEntry>, StreamError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        conn.transaction::<_, StreamError, _>(|conn| select_payloads(conn, ids, FETCH_CHUNK_SIZE))
    }

    fn contains(&self, id: &str) -> Result<bool, StreamError> {
        let mut conn = self.conn()?;
        let exists = diesel::select(diesel::dsl::exists(activities::table.find(id)))
            .get_result::<bool>(&mut conn)?;
        Ok(exists)
    }

    fn put(&self, id: &str, payload: &[u8]) -> Result<(), StreamError> {
        let mut conn = self.conn()?;
        diesel::replace_into(activities::table)
            .values(&NewActivity { id, payload })
            .execute(&mut conn)?;
        debug!(activity_id = id, bytes = payload.len(), "Stored activity payload");
        Ok(())
    }

    fn upsert_entry(&self, stream_id: &str, activity_id: &str, score: i64) -> Result<(), StreamError> {
        let mut conn = self.conn()?;

        // Upsert using raw SQL so the conflict target is explicit
        diesel::sql_query(
            r#"
            INSERT INTO stream_entries (stream_id, activity_id, score)
            VALUES (?, ?, ?)
            ON CONFLICT(stream_id, activity_id) DO UPDATE SET
                score = excluded.score
            "#,
        )
        .bind::<Text, _>(stream_id)
        .bind::<Text, _>(activity_id)
        .bind::<BigInt, _>(score)
        .execute(&mut conn)?;

        Ok(())
    }

    fn trim(&self, stream_id: &str, keep: usize) -> Result<usize, StreamError> {
        let mut conn = self.conn()?;

        let removed = diesel::sql_query(
            r#"
            DELETE FROM stream_entries
            WHERE stream_id = ?
              AND activity_id NOT IN (
                  SELECT activity_id FROM stream_entries
                  WHERE stream_id = ?
                  ORDER BY score DESC, activity_id DESC
                  LIMIT ?
              )
            "#,
        )
        .bind::<Text, _>(stream_id)
        .bind::<Text, _>(stream_id)
        .bind::<BigInt, _>(keep as i64)
        .execute(&mut conn)?;

        if removed > 0 {
            debug!(stream_id, removed, keep, "Trimmed stream");
        }
        Ok(removed)
    }

    fn range_ids(&self, stream_id: &str, range: &RangeQuery) -> Result<Vec<String>, StreamError> {
        let mut conn = self.conn()?;
        select_range(&mut conn, stream_id, range)
    }

    fn range_and_fetch(&self, stream_id: &str, range: &RangeQuery) -> Result<Vec<FetchedEntry>, StreamError> {
        let mut conn = self.conn()?;
        select_range_with_payloads(&mut conn, stream_id, range)
    }

    fn stream_len(&self, stream_id: &str) -> Result<usize, StreamError> {
        let mut conn = self.conn()?;
        let count: i64 = stream_entries::table
            .filter(stream_entries::stream_id.eq(stream_id))
            .count()
            .get_result(&mut conn)?;
        Ok(count as usize)
    }
}
