//! Error type shared by channels, subjects, subscriptions and operators.
//!
//! [`StreamError`] covers three situations:
//!
//! - [`StreamError::Closed`]: a value was pushed into a stream that already completed or failed.
//! - [`StreamError::Upstream`]: a failure raised by user code (a transform, a predicate,
//!   a generator) or by an upstream stream, carried verbatim to every subscriber.
//! - [`StreamError::Cancelled`]: the consumer went away. Drivers use it to unwind;
//!   subscribers never observe it, it turns into ordinary completion.
//!
//! The error is [`Clone`] because a single failure is delivered to every subscription
//! of a subject. `as_label` provides the stable `label` field of log records.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Shared, type-erased cause of an upstream failure.
pub type BoxError = Arc<dyn StdError + Send + Sync + 'static>;

/// # Errors produced by streams and operators.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The stream already reached its terminal state; no further values are accepted.
    #[error("stream closed")]
    Closed,

    /// A failure raised by user code or by an upstream stream.
    #[error("upstream failure: {0}")]
    Upstream(BoxError),

    /// The consumer of the stream is gone.
    #[error("cancelled by consumer")]
    Cancelled,
}

impl StreamError {
    /// Wraps an arbitrary error as an upstream failure.
    ///
    /// # Example
    /// ```
    /// use streamvisor::StreamError;
    ///
    /// let err = StreamError::upstream(std::io::Error::other("disk on fire"));
    /// assert_eq!(err.as_label(), "stream_upstream");
    /// assert_eq!(err.to_string(), "upstream failure: disk on fire");
    /// ```
    pub fn upstream<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        StreamError::Upstream(Arc::new(err))
    }

    /// Builds an upstream failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        StreamError::Upstream(Arc::new(Message(message.into())))
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use streamvisor::StreamError;
    ///
    /// assert_eq!(StreamError::Closed.as_label(), "stream_closed");
    /// assert_eq!(StreamError::Cancelled.as_label(), "stream_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Closed => "stream_closed",
            StreamError::Upstream(_) => "stream_upstream",
            StreamError::Cancelled => "stream_cancelled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StreamError::Closed => "push after completion".to_string(),
            StreamError::Upstream(cause) => format!("upstream: {cause}"),
            StreamError::Cancelled => "consumer gone".to_string(),
        }
    }

    /// Indicates whether the error only signals that the consumer went away.
    ///
    /// Cancellation is never reported as a stream failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }

    /// Returns the original cause of an upstream failure.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            StreamError::Upstream(cause) => Some(cause.as_ref()),
            _ => None,
        }
    }
}

/// Plain-text cause used by [`StreamError::msg`] and for caught panics.
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Converts a caught panic payload into an upstream failure.
pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> StreamError {
    let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    };
    StreamError::msg(format!("panicked: {info}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(StreamError::Closed.as_label(), "stream_closed");
        assert_eq!(StreamError::msg("x").as_label(), "stream_upstream");
        assert_eq!(StreamError::Cancelled.as_label(), "stream_cancelled");
    }

    #[test]
    fn test_upstream_cause_is_carried_verbatim() {
        let err = StreamError::upstream(std::io::Error::other("boom"));
        let cloned = err.clone();
        assert_eq!(cloned.cause().map(|c| c.to_string()), Some("boom".to_string()));
        assert!(!cloned.is_cancellation());
        assert!(StreamError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_panic_payloads() {
        let err = from_panic(Box::new("static str"));
        assert_eq!(err.to_string(), "upstream failure: panicked: static str");

        let err = from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "upstream failure: panicked: owned");

        let err = from_panic(Box::new(42u8));
        assert_eq!(err.to_string(), "upstream failure: panicked: unknown panic");
    }
}
