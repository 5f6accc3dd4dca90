//! Activity Stream - bounded activity feeds with cursor pagination
//!
//! Immutable activity records are stored once and referenced from any
//! number of named streams (a user's feed, a group's timeline). Each
//! stream is an ordered index of activity ids scored by publish time,
//! bounded to a maximum size, and read page by page in either time
//! direction with opaque continuation tokens.
//!
//! ## Architecture
//!
//! | Module        | Role                                                 |
//! |---------------|------------------------------------------------------|
//! | `activity`    | Activity model, score, payload encoding              |
//! | `store`       | Upsert/lookup of activities by id                    |
//! | `index`       | Range shapes for page requests                       |
//! | `pagination`  | Continuation tokens                                  |
//! | `stream`      | Publish-and-index with trimming, paged reads         |
//! | `backend`     | Storage trait with SQLite and in-memory backends     |
//! | `db`          | SQLite pool, schema and row models                   |
//!
//! ## Example
//!
//! ```no_run
//! use activity_stream::{ActivityStream, Activity, Direction, SqliteBackend};
//!
//! # fn main() -> Result<(), activity_stream::StreamError> {
//! let backend = SqliteBackend::open_in_memory()?;
//! let streams = ActivityStream::new(backend);
//!
//! streams.publish(Activity::new("a1", "JOIN"), &["feed:alice", "group:rust"])?;
//!
//! let page = streams.get_page("feed:alice", 20, 0, Direction::After)?;
//! if let Some(next) = &page.tokens.next {
//!     let _older = streams.follow("feed:alice", next)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod pagination;
pub mod store;
pub mod stream;

// Re-exports
pub use activity::{make_timestamp, Activity, BaseObject, Image, ObjectType};
pub use backend::{MemoryBackend, SqliteBackend, StreamBackend};
pub use config::Config;
pub use error::StreamError;
pub use index::{Direction, RangeQuery};
pub use pagination::{make_tokens, Page, PageToken, PageTokens};
pub use store::{ActivityStore, BulkGet};
pub use stream::{ActivityStream, DEFAULT_MAX_STREAM_SIZE};
