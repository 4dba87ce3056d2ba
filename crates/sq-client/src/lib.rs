//! sq-client: The execution client boundary of the remote event query service.
//!
//! The runner only sees [`ExecutionClient`]; [`http::HttpExecutionClient`] is
//! the production implementation.

pub mod http;
pub mod wire;

use async_trait::async_trait;
use thiserror::Error;

pub use http::{ClientConfig, HttpExecutionClient};
pub use wire::{Column, QueryKind, QueryStatus, ResultId, ResultPage, RowValues, SubmitParams};

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("remote service error: {0}")]
    Remote(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Submit/poll/fetch/close primitives. Implementations must be safe to share
/// between concurrently running workers.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Start a query; returns the opaque result identifier.
    async fn submit(&self, kind: QueryKind, params: &SubmitParams) -> ClientResult<ResultId>;

    async fn poll_status(&self, result_id: &ResultId) -> ClientResult<QueryStatus>;

    async fn fetch_rows(
        &self,
        result_id: &ResultId,
        start_pos: u32,
        num_rows: u32,
    ) -> ClientResult<ResultPage>;

    /// Release the remote result.
    async fn close(&self, result_id: &ResultId) -> ClientResult<()>;
}
