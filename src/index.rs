//! Stream index range semantics
//!
//! A stream is an ordered index of `(activity id, score)` pairs. Pages are
//! read newest-first. A page request `(limit, pivot, direction)` maps onto
//! one of three range shapes the backend executes:
//!
//! | Request              | Shape                                    |
//! |----------------------|------------------------------------------|
//! | `pivot == 0`         | `Latest`: top `limit` by score, desc     |
//! | `After` the pivot    | `AtOrBelow`: score <= pivot, desc, skip 1 |
//! | `Before` the pivot   | `AtOrAbove`: score >= pivot, asc, skip 1  |
//!
//! The skipped entry is the pivot's own record at the boundary. Backends
//! return `AtOrAbove` results oldest-first; [`into_newest_first`] reverses
//! them so every page has the same orientation.

use serde::{Deserialize, Serialize};

/// Direction a page continues in relative to its pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Continue towards older entries
    After,
    /// Continue towards newer entries
    Before,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::After => write!(f, "after"),
            Direction::Before => write!(f, "before"),
        }
    }
}

/// Entries skipped at the pivot boundary
pub const PIVOT_OFFSET: usize = 1;

/// Range shapes the backing ordered index must support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeQuery {
    /// Highest scores first
    Latest { limit: Option<usize> },
    /// Scores `<= max`, highest first, skipping `offset` entries
    AtOrBelow {
        max: i64,
        offset: usize,
        limit: Option<usize>,
    },
    /// Scores `>= min`, lowest first, skipping `offset` entries
    AtOrAbove {
        min: i64,
        offset: usize,
        limit: Option<usize>,
    },
}

impl RangeQuery {
    /// Build the range for a page request. `limit == 0` reads without a limit.
    pub fn for_page(limit: usize, pivot: i64, direction: Direction) -> Self {
        let limit = (limit > 0).then_some(limit);
        if pivot == 0 {
            return RangeQuery::Latest { limit };
        }
        match direction {
            Direction::After => RangeQuery::AtOrBelow {
                max: pivot,
                offset: PIVOT_OFFSET,
                limit,
            },
            Direction::Before => RangeQuery::AtOrAbove {
                min: pivot,
                offset: PIVOT_OFFSET,
                limit,
            },
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match *self {
            RangeQuery::Latest { limit }
            | RangeQuery::AtOrBelow { limit, .. }
            | RangeQuery::AtOrAbove { limit, .. } => limit,
        }
    }

    pub fn offset(&self) -> usize {
        match *self {
            RangeQuery::Latest { .. } => 0,
            RangeQuery::AtOrBelow { offset, .. } | RangeQuery::AtOrAbove { offset, .. } => offset,
        }
    }

    /// Whether the backend returns this shape lowest score first
    pub fn is_ascending(&self) -> bool {
        matches!(self, RangeQuery::AtOrAbove { .. })
    }

    /// Whether an entry's score falls inside the range bound
    pub fn admits(&self, score: i64) -> bool {
        match *self {
            RangeQuery::Latest { .. } => true,
            RangeQuery::AtOrBelow { max, .. } => score <= max,
            RangeQuery::AtOrAbove { min, .. } => score >= min,
        }
    }

    /// Apply offset and limit to entries already in the shape's order
    pub fn window<T>(&self, ordered: impl Iterator<Item = T>) -> Vec<T> {
        let skipped = ordered.skip(self.offset());
        match self.limit() {
            Some(limit) => skipped.take(limit).collect(),
            None => skipped.collect(),
        }
    }
}

/// Orient backend results newest-first
pub fn into_newest_first<T>(range: &RangeQuery, mut results: Vec<T>) -> Vec<T> {
    if range.is_ascending() {
        results.reverse();
    }
    results
}

/// One member of a stream's ordered index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub activity_id: String,
    pub score: i64,
}

/// Result of a range resolution: the member and its payload, if any
#[derive(Debug, Clone)]
pub struct FetchedEntry {
    pub activity_id: String,
    pub payload: Option<Vec<u8>>,
}
