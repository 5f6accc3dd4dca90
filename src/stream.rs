//! Activity streams: publish-and-index plus paged reads
//!
//! [`ActivityStream`] ties the activity store, the per-stream ordered
//! index and the pagination tokens together over one backend.
//!
//! ## Writes
//!
//! Publishing an activity stores it if it is not stored yet, then for each
//! target stream upserts `(id, score)` and trims the stream to the
//! configured maximum. Streams are written independently: a failure on one
//! does not stop the others.
//!
//! ## Reads
//!
//! Pages are newest-first. See [`crate::index`] for the range semantics.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::activity::Activity;
use crate::backend::StreamBackend;
use crate::config::Config;
use crate::error::StreamError;
use crate::index::{into_newest_first, Direction, RangeQuery};
use crate::pagination::{make_tokens, Page, PageToken};
use crate::store::{decode_entry, ActivityStore, BulkGet};

/// Number of entries a stream keeps by default
pub const DEFAULT_MAX_STREAM_SIZE: i64 = 50;

/// Bounded activity streams over a backend
pub struct ActivityStream<B: StreamBackend> {
    backend: Arc<B>,
    store: ActivityStore<B>,
    /// Entries to keep per stream; `<= 0` disables trimming
    max_stream_size: AtomicI64,
}

impl<B: StreamBackend> ActivityStream<B> {
    pub fn new(backend: B) -> Self {
        Self::with_max_stream_size(backend, DEFAULT_MAX_STREAM_SIZE)
    }

    pub fn with_max_stream_size(backend: B, max_stream_size: i64) -> Self {
        let backend = Arc::new(backend);
        Self {
            store: ActivityStore::new(Arc::clone(&backend)),
            backend,
            max_stream_size: AtomicI64::new(max_stream_size),
        }
    }

    /// Build from configuration (max stream size)
    pub fn from_config(backend: B, config: &Config) -> Self {
        info!(max_stream_size = config.max_stream_size, "Activity stream ready");
        Self::with_max_stream_size(backend, config.max_stream_size)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &ActivityStore<B> {
        &self.store
    }

    /// Set how many entries a stream keeps. `n <= 0` disables trimming.
    ///
    /// Existing streams are cut down only when they are next written to.
    pub fn set_max_stream_size(&self, n: i64) {
        self.max_stream_size.store(n, Ordering::Relaxed);
        debug!(max_stream_size = n, "Max stream size changed");
    }

    /// Entries kept per stream, `None` when unbounded
    pub fn max_stream_size(&self) -> Option<usize> {
        let n = self.max_stream_size.load(Ordering::Relaxed);
        (n > 0).then_some(n as usize)
    }

    // =========================================================================
    // Activity Store
    // =========================================================================

    pub fn get(&self, id: &str) -> Result<Activity, StreamError> {
        self.store.get(id)
    }

    pub fn bulk_get(&self, ids: &[String]) -> Result<BulkGet, StreamError> {
        self.store.bulk_get(ids)
    }

    pub fn store_activity(&self, activity: Activity) -> Result<Activity, StreamError> {
        self.store.store(activity)
    }

    // =========================================================================
    // Stream Writer
    // =========================================================================

    /// Add an activity to one or more streams, storing it first if needed.
    ///
    /// Returns one error per failed stream, or the sole error of the
    /// initial store step. An empty result means every stream was written.
    pub fn add_to_streams(&self, mut activity: Activity, stream_ids: &[&str]) -> Vec<StreamError> {
        // Same score for the stored record and every stream entry
        let score = activity.ensure_published();

        match self.store.exists(&activity.id) {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.store.store(activity.clone()) {
                    warn!(activity_id = %activity.id, error = %e, "Failed to store activity");
                    return vec![e];
                }
            }
            Err(e) => {
                warn!(activity_id = %activity.id, error = %e, "Failed to check activity");
                return vec![e];
            }
        }

        let bound = self.max_stream_size();
        let mut errors = Vec::new();
        for stream_id in stream_ids {
            if let Err(e) = self.index_into(stream_id, &activity.id, score, bound) {
                warn!(stream_id, activity_id = %activity.id, error = %e, "Failed to index activity");
                errors.push(StreamError::for_stream(*stream_id, e));
            }
        }

        debug!(
            activity_id = %activity.id,
            score,
            streams = stream_ids.len(),
            failed = errors.len(),
            "Published activity"
        );
        errors
    }

    /// Like [`add_to_streams`](Self::add_to_streams), folding per-stream
    /// failures into `PartialFailure`
    pub fn publish(&self, activity: Activity, stream_ids: &[&str]) -> Result<(), StreamError> {
        let mut errors = self.add_to_streams(activity, stream_ids);
        match errors.len() {
            0 => Ok(()),
            1 if !matches!(errors[0], StreamError::Stream { .. }) => Err(errors.remove(0)),
            _ => Err(StreamError::PartialFailure(errors)),
        }
    }

    fn index_into(
        &self,
        stream_id: &str,
        activity_id: &str,
        score: i64,
        bound: Option<usize>,
    ) -> Result<(), StreamError> {
        self.backend.upsert_entry(stream_id, activity_id, score)?;
        if let Some(keep) = bound {
            self.backend.trim(stream_id, keep)?;
        }
        Ok(())
    }

    // =========================================================================
    // Stream Reads
    // =========================================================================

    /// Activity ids of a page, newest first
    pub fn query(
        &self,
        stream_id: &str,
        limit: usize,
        pivot: i64,
        direction: Direction,
    ) -> Result<Vec<String>, StreamError> {
        let range = RangeQuery::for_page(limit, pivot, direction);
        let ids = self.backend.range_ids(stream_id, &range)?;
        Ok(into_newest_first(&range, ids))
    }

    /// Activities of a page, newest first. Entries whose record is missing
    /// or cannot be decoded are left out of the page.
    pub fn get_stream(
        &self,
        stream_id: &str,
        limit: usize,
        pivot: i64,
        direction: Direction,
    ) -> Result<Vec<Activity>, StreamError> {
        let range = RangeQuery::for_page(limit, pivot, direction);
        let entries = self.backend.range_and_fetch(stream_id, &range)?;

        let mut activities = Vec::with_capacity(entries.len());
        for entry in into_newest_first(&range, entries) {
            match decode_entry(&entry) {
                Ok(activity) => activities.push(activity),
                Err(e) => {
                    warn!(stream_id, activity_id = %entry.activity_id, error = %e, "Skipping stream entry");
                }
            }
        }

        debug!(stream_id, ?range, returned = activities.len(), "Read stream page");
        Ok(activities)
    }

    /// A page with its continuation tokens
    pub fn get_page(
        &self,
        stream_id: &str,
        limit: usize,
        pivot: i64,
        direction: Direction,
    ) -> Result<Page, StreamError> {
        let activities = self.get_stream(stream_id, limit, pivot, direction)?;
        let tokens = make_tokens(limit, direction, &activities);
        Ok(Page { activities, tokens })
    }

    /// Follow a continuation token
    pub fn follow(&self, stream_id: &str, token: &PageToken) -> Result<Page, StreamError> {
        self.get_page(stream_id, token.size, token.pivot, token.direction)
    }

    /// Number of entries currently indexed in a stream
    pub fn stream_len(&self, stream_id: &str) -> Result<usize, StreamError> {
        self.backend.stream_len(stream_id)
    }
}
