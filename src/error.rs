//! Error types.

use std::sync::Arc;

use thiserror::Error;

use crate::value::Value;

/// Failure carried by a rejected [`Deferred`](crate::Deferred) and by the error
/// resumption channel of a coroutine.
///
/// Cloneable so that one settlement can reach every registered continuation.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A coroutine yielded a value of no recognized shape.
    #[error("invalid yieldable: {value}")]
    InvalidYieldable {
        /// String form of the offending value.
        value: String,
    },

    /// Rejection with an arbitrary value as its reason.
    #[error("rejected: {0}")]
    Rejected(Value),

    /// Plain failure message.
    #[error("{0}")]
    Message(String),

    /// Foreign error.
    #[error(transparent)]
    Source(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn invalid_yieldable(value: &Value) -> Self {
        Error::InvalidYieldable {
            value: value.to_string(),
        }
    }

    /// Wrap a foreign error.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Source(Arc::new(error))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    pub fn is_invalid_yieldable(&self) -> bool {
        matches!(self, Error::InvalidYieldable { .. })
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::message(message)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message(message)
    }
}

impl From<Value> for Error {
    fn from(reason: Value) -> Self {
        Error::Rejected(reason)
    }
}

/// Compares by variant and payload; foreign errors compare by identity.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::InvalidYieldable { value: a }, Error::InvalidYieldable { value: b }) => a == b,
            (Error::Rejected(a), Error::Rejected(b)) => a == b,
            (Error::Message(a), Error::Message(b)) => a == b,
            (Error::Source(a), Error::Source(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}
