//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings shared by every dispatch of a [`Bus`](crate::Bus).
//!
//! ## Sentinel values
//! - `max_depth = 0` → unlimited nesting (only the cycle detector bounds recursion)
//! - `settle_timeout = 0s` → pending replies may take as long as they need

use std::time::Duration;

/// Configuration for a [`Bus`](crate::Bus).
///
/// ## Field semantics
/// - `max_depth`: deepest allowed call-stack entry, root = 1 (`0` = unlimited)
/// - `settle_timeout`: per-reply settle limit in the drain loop (`0s` = none)
///
/// ## Notes
/// Fields are public. Prefer the accessors to avoid repeating sentinel checks.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Maximum nesting depth of sub-triggers.
    ///
    /// An invocation that would create an entry deeper than this fails with
    /// [`BusError::DepthExceeded`](crate::BusError::DepthExceeded).
    pub max_depth: usize,

    /// Maximum time the drain loop waits for one pending reply.
    ///
    /// A reply that exceeds it is dropped and reported as
    /// [`HandlerError::Timeout`](crate::HandlerError::Timeout).
    pub settle_timeout: Duration,
}

impl BusConfig {
    /// Returns the depth limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn depth_limit(&self) -> Option<usize> {
        if self.max_depth == 0 {
            None
        } else {
            Some(self.max_depth)
        }
    }

    /// Returns the settle timeout as an `Option` (`None` = wait forever).
    #[inline]
    pub fn settle_limit(&self) -> Option<Duration> {
        if self.settle_timeout == Duration::ZERO {
            None
        } else {
            Some(self.settle_timeout)
        }
    }
}

impl Default for BusConfig {
    /// Unlimited depth, no settle timeout.
    fn default() -> Self {
        Self {
            max_depth: 0,
            settle_timeout: Duration::ZERO,
        }
    }
}
