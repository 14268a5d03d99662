//! Error types for the store.

use thiserror::Error;

use crate::reactive::NotAnObject;

/// Failure of a mutation body, synchronous or deferred.
///
/// The interceptor never rewrites these: what the body returns is what the
/// caller sees.
#[derive(Debug, Error)]
pub enum MutationError {
    /// A plain message.
    #[error("{0}")]
    Message(String),

    /// An error raised by application code.
    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// The runtime shut down before the deferred mutation settled.
    #[error("deferred mutation was cancelled before it settled")]
    Cancelled,
}

impl MutationError {
    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an application error.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Box::new(err))
    }
}

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no mutation named `{0}`")]
    UnknownMutation(String),

    #[error("mutation `{name}` failed")]
    Mutation {
        name: String,
        #[source]
        source: MutationError,
    },

    #[error("invalid store settings")]
    Settings(#[from] serde_json::Error),

    #[error(transparent)]
    State(#[from] NotAnObject),
}
