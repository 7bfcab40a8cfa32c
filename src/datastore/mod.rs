//! Backend data service subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     DataStoreConfig → connect() → ping (logged, never fatal)
//!     → Arc<dyn DataStore> shared process-wide
//!
//! Per query (via the query relay):
//!     statement → DataStore::query → RecordStream (lazy, single pass)
//!
//! Shutdown:
//!     server drained → DataStore::shutdown → later queries fail NotAvailable
//! ```
//!
//! # Design Decisions
//! - One client per process, never rebuilt per request
//! - Statements are forwarded verbatim; callers are trusted components
//! - Every call carries a deadline

pub mod client;
mod decode;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::DataStoreConfig;

pub use client::HttpQueryClient;
pub use types::{DataStoreError, DataStoreResult, Record, RecordStream};

/// Query interface of the backend data service.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Run a statement and return its rows as a lazy stream.
    async fn query(&self, statement: &str) -> DataStoreResult<RecordStream>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> DataStoreResult<()>;

    /// Release the connection. Idempotent.
    async fn shutdown(&self);
}

/// Stand-in used when the data service is disabled in configuration.
#[derive(Debug, Default)]
pub struct DisabledDataStore;

#[async_trait]
impl DataStore for DisabledDataStore {
    async fn query(&self, _statement: &str) -> DataStoreResult<RecordStream> {
        Err(DataStoreError::NotAvailable("data service disabled".into()))
    }

    async fn ping(&self) -> DataStoreResult<()> {
        Err(DataStoreError::NotAvailable("data service disabled".into()))
    }

    async fn shutdown(&self) {}
}

/// Build the process-wide data service client.
///
/// A failed ping is logged and tolerated so the gateway can start before the
/// data service does.
pub async fn connect(config: &DataStoreConfig) -> DataStoreResult<Arc<dyn DataStore>> {
    if !config.enabled {
        tracing::info!("Data service disabled");
        return Ok(Arc::new(DisabledDataStore));
    }

    let client = HttpQueryClient::new(config)?;
    match client.ping().await {
        Ok(()) => tracing::info!(endpoint = %client.endpoint(), "Data service client initialized"),
        Err(e) => tracing::warn!(
            endpoint = %client.endpoint(),
            error = %e,
            "Data service client initialized but ping failed"
        ),
    }
    Ok(Arc::new(client))
}
