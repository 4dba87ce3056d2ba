//! sq-core: Shared types for the event query decomposition client.
//!
//! This crate has zero internal crate dependencies and defines the
//! canonical types used by the client, the runner and the CLI.

pub mod catalog;
pub mod filter;
pub mod query;
pub mod request;
pub mod row;
pub mod trace;
pub mod window;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid filter value kind: {kind}")]
    InvalidFilterValue { kind: String },
    #[error("invalid filter operator: {0}")]
    InvalidOperator(String),
    #[error("unsupported time range: {0}")]
    UnsupportedRange(String),
}

impl CoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
