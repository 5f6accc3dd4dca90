//! Pagination tokens
//!
//! A page of a stream is resumed with an opaque query string carrying the
//! page size and a pivot score:
//!
//! ```text
//! size=20&before=1421679584123   newer entries than the pivot
//! size=20&after=1421679584000    older entries than the pivot
//! ```
//!
//! Tokens are not stable identities: replaying one later can return a
//! different page if activities were added in between.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::activity::Activity;
use crate::error::StreamError;
use crate::index::Direction;

/// Continuation point of a stream read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken {
    pub size: usize,
    pub pivot: i64,
    pub direction: Direction,
}

impl PageToken {
    pub fn before(size: usize, pivot: i64) -> Self {
        Self {
            size,
            pivot,
            direction: Direction::Before,
        }
    }

    pub fn after(size: usize, pivot: i64) -> Self {
        Self {
            size,
            pivot,
            direction: Direction::After,
        }
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "size={}&{}={}", self.size, self.direction, self.pivot)
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    size: usize,
    #[serde(default)]
    before: Option<i64>,
    #[serde(default)]
    after: Option<i64>,
}

impl FromStr for PageToken {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let query: TokenQuery = serde_urlencoded::from_str(s.trim_start_matches('?'))
            .map_err(|e| StreamError::Malformed(format!("Invalid page token {:?}: {}", s, e)))?;

        match (query.before, query.after) {
            (Some(pivot), None) => Ok(PageToken::before(query.size, pivot)),
            (None, Some(pivot)) => Ok(PageToken::after(query.size, pivot)),
            _ => Err(StreamError::Malformed(format!(
                "Page token {:?} needs exactly one of before/after",
                s
            ))),
        }
    }
}

impl Serialize for PageToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Tokens for the pages around a fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageTokens {
    /// Newer entries, pivoting on the newest result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageToken>,
    /// Older entries, pivoting on the oldest result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageToken>,
}

/// Build tokens from a newest-first page and the direction it was read in
///
/// A page read `After` a pivot always has newer entries behind it; a page
/// read `Before` a pivot always has older ones. A full page may have more
/// in both directions.
pub fn make_tokens(page_size: usize, direction: Direction, results: &[Activity]) -> PageTokens {
    let (newest, oldest) = match (results.first(), results.last()) {
        (Some(newest), Some(oldest)) => (newest, oldest),
        _ => return PageTokens::default(),
    };
    let full = results.len() >= page_size;

    PageTokens {
        prev: (direction == Direction::After || full)
            .then(|| PageToken::before(page_size, newest.score())),
        next: (direction == Direction::Before || full)
            .then(|| PageToken::after(page_size, oldest.score())),
    }
}

/// A page of a stream with its continuation tokens
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub activities: Vec<Activity>,
    #[serde(flatten)]
    pub tokens: PageTokens,
}
