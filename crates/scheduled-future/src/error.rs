//! Failure type carried by settled tasks.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

/// Result of a settled task: the value (which may be absent) or the failure.
pub type TaskResult<V> = Result<Option<V>, TaskError>;

/// The single failure slot of an [`AsyncTask`](crate::AsyncTask).
///
/// Producer failures and `then_apply` transform failures are not told apart once
/// captured. The type is cheap to clone so every listener gets its own copy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// Wraps an arbitrary underlying error.
    #[error("{0}")]
    Failed(Arc<dyn StdError + Send + Sync + 'static>),

    #[error("{0}")]
    Message(String),

    /// The producer or transform panicked; holds the panic message when it was a string.
    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Wrap any error type.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        TaskError::Failed(Arc::new(error))
    }

    /// Create a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Message(message.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TaskError::Panicked(message)
    }

    /// Borrow the wrapped error as `E`, if this is a [`TaskError::Failed`] of that type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            TaskError::Failed(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::new(err)
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        TaskError::Message(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        TaskError::Message(message.to_string())
    }
}
