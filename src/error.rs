//! Error types used by the bus and its handlers.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`]: synchronous dispatch failures, returned from
//!   [`Bus::trigger`](crate::Bus::trigger) and [`Scope::trigger`](crate::Scope::trigger).
//! - [`HandlerError`]: failures of a single pending handler reply, observed per entry
//!   by the drain loop.
//!
//! Both types provide [`as_label`](BusError::as_label) for logging.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by dispatch.
///
/// These unwind the triggering call exactly like a raised error: a cycle detected
/// inside a sub-trigger surfaces through the enclosing handler's `?`, and from there
/// through [`Bus::trigger`](crate::Bus::trigger).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The event already appears in its own ancestor chain.
    #[error("circular dispatch of event '{event}' (path: {})", path.join(" -> "))]
    Circular {
        /// The event that re-entered its ancestor chain.
        event: String,
        /// Ancestor chain, root first, ending with the re-entered event.
        path: Vec<String>,
    },

    /// Nesting exceeded [`BusConfig::max_depth`](crate::BusConfig::max_depth).
    #[error("event '{event}' at depth {depth} exceeds max depth {limit}")]
    DepthExceeded {
        /// The event whose invocation was rejected.
        event: String,
        /// Depth the invocation would have had (root = 1).
        depth: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The dispatch was cancelled before this sub-trigger ran.
    #[error("dispatch cancelled before event '{event}'")]
    Cancelled {
        /// The event that was not dispatched.
        event: String,
    },

    /// `trigger` was called outside of a tokio runtime, so the drain loop cannot start.
    #[error("no tokio runtime available to drain pending replies")]
    NoRuntime,

    /// The drain loop terminated abnormally.
    #[error("drain loop aborted: {reason}")]
    Drain {
        /// Join failure description.
        reason: String,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use callstack_bus::BusError;
    ///
    /// let err = BusError::Cancelled { event: "ping".into() };
    /// assert_eq!(err.as_label(), "bus_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Circular { .. } => "bus_circular",
            BusError::DepthExceeded { .. } => "bus_depth_exceeded",
            BusError::Cancelled { .. } => "bus_cancelled",
            BusError::NoRuntime => "bus_no_runtime",
            BusError::Drain { .. } => "bus_drain",
        }
    }

    /// Returns the event name this error refers to, if any.
    pub fn event(&self) -> Option<&str> {
        match self {
            BusError::Circular { event, .. }
            | BusError::DepthExceeded { event, .. }
            | BusError::Cancelled { event } => Some(event),
            BusError::NoRuntime | BusError::Drain { .. } => None,
        }
    }
}

/// # Errors produced by a pending handler reply.
///
/// Isolated per entry: a failure is reported to observers of that entry's task and
/// never stops the drain of later entries.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler's work failed.
    #[error("handler failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The reply did not settle within [`BusConfig::settle_timeout`](crate::BusConfig::settle_timeout).
    #[error("reply did not settle within {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The dispatch was cancelled before the reply settled.
    #[error("dispatch cancelled")]
    Cancelled,

    /// The reply panicked while being polled.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },

    /// A sub-trigger issued from the async body failed.
    #[error(transparent)]
    Dispatch(#[from] BusError),
}

impl HandlerError {
    /// Convenience constructor for [`HandlerError::Failed`].
    pub fn failed(error: impl Into<String>) -> Self {
        HandlerError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use callstack_bus::HandlerError;
    ///
    /// assert_eq!(HandlerError::failed("boom").as_label(), "handler_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Failed { .. } => "handler_failed",
            HandlerError::Timeout { .. } => "handler_timeout",
            HandlerError::Cancelled => "handler_cancelled",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Dispatch(_) => "handler_dispatch",
        }
    }
}
