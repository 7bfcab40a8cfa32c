//! Record and error types for the backend data service.

use futures_util::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

/// A single structured result row.
pub type Record = Value;

/// Errors that can occur while talking to the data service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataStoreError {
    /// Connection or transport level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Query did not complete before the deadline.
    #[error("query timeout after {0} seconds")]
    Timeout(u64),

    /// Service answered with an error.
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Client disabled or already shut down.
    #[error("data service not available: {0}")]
    NotAvailable(String),
}

impl DataStoreError {
    /// Failure code carried on the bus when a query fails.
    pub fn failure_code(&self) -> u16 {
        match self {
            DataStoreError::Timeout(_) => 504,
            DataStoreError::Service { status, .. } if (400..=599).contains(status) => *status,
            DataStoreError::NotAvailable(_) => 503,
            _ => 502,
        }
    }
}

/// Result type for data service operations.
pub type DataStoreResult<T> = Result<T, DataStoreError>;

/// Lazy, forward-only sequence of records produced by one query.
///
/// Not restartable: consuming it drains it, and re-reading requires a new query.
pub struct RecordStream {
    inner: BoxStream<'static, DataStoreResult<Record>>,
}

impl RecordStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DataStoreResult<Record>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Stream over already decoded rows.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self::new(stream::iter(records.into_iter().map(Ok)))
    }

    pub fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// Drain the stream, stopping at the first error.
    pub async fn collect_all(self) -> DataStoreResult<Vec<Record>> {
        self.inner.try_collect().await
    }
}

impl Stream for RecordStream {
    type Item = DataStoreResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream").finish_non_exhaustive()
    }
}
