//! Error types for activity-stream

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed: {0}")]
    Malformed(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Partial failure: {} of the batch failed", .0.len())]
    PartialFailure(Vec<StreamError>),

    #[error("Stream {stream_id} failed: {source}")]
    Stream {
        stream_id: String,
        #[source]
        source: Box<StreamError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// True for the "key absent" sentinel, so callers can tell empty from broken
    pub fn is_not_found(&self) -> bool {
        matches!(self, StreamError::NotFound(_))
    }

    /// Wrap an error raised while writing to one stream of a batch
    pub fn for_stream(stream_id: impl Into<String>, source: StreamError) -> Self {
        StreamError::Stream {
            stream_id: stream_id.into(),
            source: Box::new(source),
        }
    }
}

/// Lookups that may miss use `.optional()` and report `NotFound` with their
/// key, so any query error reaching this conversion is a backend failure
impl From<diesel::result::Error> for StreamError {
    fn from(e: diesel::result::Error) -> Self {
        StreamError::BackendUnavailable(format!("Query failed: {}", e))
    }
}

impl From<diesel::r2d2::PoolError> for StreamError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        StreamError::BackendUnavailable(format!("Failed to get connection: {}", e))
    }
}
