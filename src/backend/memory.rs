//! In-process backend
//!
//! Records and stream indexes live behind a single `RwLock`, so a range
//! resolution and its payload reads see one consistent state.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::StreamBackend;
use crate::error::StreamError;
use crate::index::{FetchedEntry, RangeQuery};

#[derive(Debug, Default)]
struct StreamSet {
    /// `(score, activity id)`, iterated in reverse for newest-first
    ordered: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
}

impl StreamSet {
    fn upsert(&mut self, activity_id: &str, score: i64) {
        if let Some(previous) = self.scores.insert(activity_id.to_string(), score) {
            self.ordered.remove(&(previous, activity_id.to_string()));
        }
        self.ordered.insert((score, activity_id.to_string()));
    }

    fn trim(&mut self, keep: usize) -> usize {
        let excess = self.ordered.len().saturating_sub(keep);
        for _ in 0..excess {
            if let Some((_, id)) = self.ordered.pop_first() {
                self.scores.remove(&id);
            }
        }
        excess
    }

    fn range(&self, range: &RangeQuery) -> Vec<String> {
        if range.is_ascending() {
            collect_range(range, self.ordered.iter())
        } else {
            collect_range(range, self.ordered.iter().rev())
        }
    }
}

/// Entries outside the bound come first in the shape's order, so skipping
/// them leaves exactly the admitted run
fn collect_range<'a>(
    range: &RangeQuery,
    entries: impl Iterator<Item = &'a (i64, String)>,
) -> Vec<String> {
    range.window(
        entries
            .skip_while(|(score, _)| !range.admits(*score))
            .map(|(_, id)| id.clone()),
    )
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<String, Vec<u8>>,
    streams: HashMap<String, StreamSet>,
}

impl MemoryState {
    fn fetched(&self, id: String) -> FetchedEntry {
        let payload = self.records.get(&id).cloned();
        FetchedEntry {
            activity_id: id,
            payload,
        }
    }
}

/// In-memory activity stream backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StreamError> {
        self.state
            .read()
            .map_err(|e| StreamError::BackendUnavailable(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StreamError> {
        self.state
            .write()
            .map_err(|e| StreamError::BackendUnavailable(format!("Lock poisoned: {}", e)))
    }
}

impl StreamBackend for MemoryBackend {
    fn fetch(&self, id: &str) -> Result<Option<Vec<u8>>, StreamError> {
        Ok(self.read()?.records.get(id).cloned())
    }

    fn fetch_many(&self, ids: &[String]) -> Result<Vec<FetchedEntry>, StreamError> {
        let state = self.read()?;
        Ok(ids.iter().map(|id| state.fetched(id.clone())).collect())
    }

    fn contains(&self, id: &str) -> Result<bool, StreamError> {
        Ok(self.read()?.records.contains_key(id))
    }

    fn put(&self, id: &str, payload: &[u8]) -> Result<(), StreamError> {
        self.write()?.records.insert(id.to_string(), payload.to_vec());
        Ok(())
    }

    fn upsert_entry(&self, stream_id: &str, activity_id: &str, score: i64) -> Result<(), StreamError> {
        self.write()?
            .streams
            .entry(stream_id.to_string())
            .or_default()
            .upsert(activity_id, score);
        Ok(())
    }

    fn trim(&self, stream_id: &str, keep: usize) -> Result<usize, StreamError> {
        let removed = match self.write()?.streams.get_mut(stream_id) {
            Some(set) => set.trim(keep),
            None => 0,
        };
        if removed > 0 {
            debug!(stream_id, removed, "Trimmed stream");
        }
        Ok(removed)
    }

    fn range_ids(&self, stream_id: &str, range: &RangeQuery) -> Result<Vec<String>, StreamError> {
        Ok(self
            .read()?
            .streams
            .get(stream_id)
            .map(|set| set.range(range))
            .unwrap_or_default())
    }

    fn range_and_fetch(&self, stream_id: &str, range: &RangeQuery) -> Result<Vec<FetchedEntry>, StreamError> {
        let state = self.read()?;
        let ids = match state.streams.get(stream_id) {
            Some(set) => set.range(range),
            None => return Ok(Vec::new()),
        };
        Ok(ids.into_iter().map(|id| state.fetched(id)).collect())
    }

    fn stream_len(&self, stream_id: &str) -> Result<usize, StreamError> {
        Ok(self
            .read()?
            .streams
            .get(stream_id)
            .map(|set| set.ordered.len())
            .unwrap_or(0))
    }
}
