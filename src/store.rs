//! Activity store
//!
//! Upsert and lookup of activity records by id on top of a backend's
//! key/value space. Storing is idempotent and last-write-wins.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::activity::Activity;
use crate::backend::StreamBackend;
use crate::error::StreamError;
use crate::index::FetchedEntry;

/// Result of a bulk lookup
#[derive(Debug, Default)]
pub struct BulkGet {
    /// Activities that resolved, in request order
    pub activities: Vec<Activity>,
    /// Ids that did not resolve and why
    pub failures: Vec<(String, StreamError)>,
}

impl BulkGet {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// All activities, or `PartialFailure` if any id failed
    pub fn into_result(self) -> Result<Vec<Activity>, StreamError> {
        if self.failures.is_empty() {
            Ok(self.activities)
        } else {
            Err(StreamError::PartialFailure(
                self.failures.into_iter().map(|(_, e)| e).collect(),
            ))
        }
    }
}

/// Decode a fetched entry, mapping a missing payload to `NotFound`
pub(crate) fn decode_entry(entry: &FetchedEntry) -> Result<Activity, StreamError> {
    match &entry.payload {
        Some(payload) => Activity::decode(payload),
        None => Err(StreamError::NotFound(entry.activity_id.clone())),
    }
}

/// Activity records keyed by id
pub struct ActivityStore<B: StreamBackend> {
    backend: Arc<B>,
}

impl<B: StreamBackend> Clone for ActivityStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: StreamBackend> ActivityStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Get a single activity by id
    pub fn get(&self, id: &str) -> Result<Activity, StreamError> {
        match self.backend.fetch(id)? {
            Some(payload) => Activity::decode(&payload),
            None => Err(StreamError::NotFound(id.to_string())),
        }
    }

    /// Get several activities in one round trip. Missing or undecodable
    /// records are reported per id without affecting the others.
    pub fn bulk_get(&self, ids: &[String]) -> Result<BulkGet, StreamError> {
        let mut result = BulkGet::default();
        for entry in self.backend.fetch_many(ids)? {
            match decode_entry(&entry) {
                Ok(activity) => result.activities.push(activity),
                Err(e) => {
                    debug!(activity_id = %entry.activity_id, error = %e, "Bulk get miss");
                    result.failures.push((entry.activity_id, e));
                }
            }
        }
        Ok(result)
    }

    /// Whether an activity is stored under `id`
    pub fn exists(&self, id: &str) -> Result<bool, StreamError> {
        self.backend.contains(id)
    }

    /// Store an activity, replacing any previous record with the same id.
    /// An unset `published` is set to now. Returns the record as stored.
    pub fn store(&self, mut activity: Activity) -> Result<Activity, StreamError> {
        if activity.id.is_empty() {
            warn!("Rejected activity with empty id");
            return Err(StreamError::Malformed("activity has an empty id".to_string()));
        }
        activity.ensure_published();

        let payload = activity.encode()?;
        self.backend.put(&activity.id, &payload)?;

        debug!(activity_id = %activity.id, score = activity.score(), "Stored activity");
        Ok(activity)
    }
}
