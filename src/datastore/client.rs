//! HTTP query client for the backend data service.
//!
//! # Responsibilities
//! - Submit query statements over the service's HTTP query endpoint
//! - Enforce a deadline on every call, body included
//! - Hand rows out as the response body streams in
//! - Translate service errors into `DataStoreError`
//! - Refuse work once shut down

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::config::DataStoreConfig;
use crate::datastore::decode::ResultsDecoder;
use crate::datastore::types::{DataStoreError, DataStoreResult, Record, RecordStream};
use crate::datastore::DataStore;

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<QueryErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct QueryErrorEntry {
    #[serde(default)]
    msg: String,
}

/// Query client speaking form-encoded `statement=` requests with basic auth.
pub struct HttpQueryClient {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    username: String,
    password: String,
    timeout_secs: u64,
    closed: AtomicBool,
}

impl HttpQueryClient {
    pub fn new(config: &DataStoreConfig) -> DataStoreResult<Self> {
        let endpoint: reqwest::Url = config.endpoint.parse().map_err(|e| {
            DataStoreError::Transport(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataStoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout_secs: config.timeout_secs,
            closed: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn execute(&self, statement: &str) -> DataStoreResult<RecordStream> {
        let request = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("statement", statement)])
            .send();

        let deadline = Instant::now() + Duration::from_secs(self.timeout_secs);
        let response = timeout_at(deadline, request)
            .await
            .map_err(|_| DataStoreError::Timeout(self.timeout_secs))?
            .map_err(|e| DataStoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = timeout_at(deadline, response.text())
                .await
                .map_err(|_| DataStoreError::Timeout(self.timeout_secs))?
                .map_err(|e| DataStoreError::Transport(e.to_string()))?;
            let message = match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(body) => body
                    .errors
                    .into_iter()
                    .next()
                    .map(|e| e.msg)
                    .unwrap_or_else(|| status.to_string()),
                Err(_) => text,
            };
            return Err(DataStoreError::Service {
                status: status.as_u16(),
                message,
            });
        }

        Ok(stream_results(
            response.bytes_stream().boxed(),
            deadline,
            self.timeout_secs,
        ))
    }
}

struct ResultsBody {
    chunks: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: ResultsDecoder,
    pending: VecDeque<Record>,
    deadline: Instant,
    timeout_secs: u64,
    finished: bool,
}

/// Rows decoded from the body as chunks arrive. The query deadline also
/// bounds reading the body.
fn stream_results(
    chunks: BoxStream<'static, reqwest::Result<Bytes>>,
    deadline: Instant,
    timeout_secs: u64,
) -> RecordStream {
    let body = ResultsBody {
        chunks,
        decoder: ResultsDecoder::new(),
        pending: VecDeque::new(),
        deadline,
        timeout_secs,
        finished: false,
    };
    RecordStream::new(stream::try_unfold(body, |mut body| async move {
        loop {
            if let Some(record) = body.pending.pop_front() {
                return Ok::<_, DataStoreError>(Some((record, body)));
            }
            if body.finished || body.decoder.is_done() {
                return Ok(None);
            }
            let chunk = timeout_at(body.deadline, body.chunks.next())
                .await
                .map_err(|_| DataStoreError::Timeout(body.timeout_secs))?;
            match chunk {
                Some(Ok(bytes)) => body.pending.extend(body.decoder.push(&bytes)?),
                Some(Err(e)) => return Err(DataStoreError::Transport(e.to_string())),
                None => {
                    body.decoder.finish()?;
                    body.finished = true;
                }
            }
        }
    }))
}

#[async_trait]
impl DataStore for HttpQueryClient {
    async fn query(&self, statement: &str) -> DataStoreResult<RecordStream> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DataStoreError::NotAvailable("client shut down".into()));
        }
        let records = self.execute(statement).await?;
        tracing::debug!("Query accepted, streaming results");
        Ok(records)
    }

    async fn ping(&self) -> DataStoreResult<()> {
        self.query("SELECT RAW 1").await?.collect_all().await.map(|_| ())
    }

    async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(endpoint = %self.endpoint, "Data service client closed");
        }
    }
}
