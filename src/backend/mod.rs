//! Storage backends for activity streams
//!
//! A backend provides two things: a key/value space of activity payloads
//! keyed by activity id, and one ordered index per stream mapping activity
//! id to score. Membership is unique per `(stream, activity id)`; adding an
//! id that is already present replaces its score.
//!
//! ## Backends
//!
//! - [`SqliteBackend`] - Diesel over an r2d2 pool, the shipped backend
//! - [`MemoryBackend`] - single-lock in-process maps, for tests and embedding

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::error::StreamError;
use crate::index::{FetchedEntry, RangeQuery};

/// Capability set of an activity stream backend
pub trait StreamBackend: Send + Sync {
    /// Payload stored under `id`, if any
    fn fetch(&self, id: &str) -> Result<Option<Vec<u8>>, StreamError>;

    /// Payloads for all `ids` in one round trip, in input order
    fn fetch_many(&self, ids: &[String]) -> Result<Vec<FetchedEntry>, StreamError>;

    /// Whether a payload is stored under `id`
    fn contains(&self, id: &str) -> Result<bool, StreamError>;

    /// Store `payload` under `id`, replacing any previous value
    fn put(&self, id: &str, payload: &[u8]) -> Result<(), StreamError>;

    /// Insert `activity_id` into the stream's index or refresh its score
    fn upsert_entry(&self, stream_id: &str, activity_id: &str, score: i64) -> Result<(), StreamError>;

    /// Keep the `keep` highest-score entries of a stream, drop the rest.
    /// Returns the number of entries removed.
    fn trim(&self, stream_id: &str, keep: usize) -> Result<usize, StreamError>;

    /// Member ids of a stream matching `range`, in the range's order
    fn range_ids(&self, stream_id: &str, range: &RangeQuery) -> Result<Vec<String>, StreamError>;

    /// Resolve `range` to member ids and their payloads as one atomic
    /// operation: no id resolved by the range step can disappear before
    /// its payload is read. Results are in the range's order.
    fn range_and_fetch(&self, stream_id: &str, range: &RangeQuery) -> Result<Vec<FetchedEntry>, StreamError>;

    /// Number of entries in a stream (0 for unknown streams)
    fn stream_len(&self, stream_id: &str) -> Result<usize, StreamError>;
}
