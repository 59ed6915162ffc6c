//! Injectable time source.
//!
//! Token freshness and assertion lifetimes are decided against a [`Clock`]
//! rather than the ambient system time, so expiry-boundary behavior is
//! testable with a controlled clock.

use std::fmt::Debug;

use time::OffsetDateTime;

/// Source of the current time.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// [`Clock`] backed by the system clock. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
