//! Time source for token creation and expiry checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{GrantKitError, GrantKitResult};

/// Source of the current unix time in seconds.
pub trait Clock: Send + Sync {
    /// Returns the current unix timestamp in seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the time cannot be determined.
    fn now(&self) -> GrantKitResult<u64>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> GrantKitResult<u64> {
        let duration = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|err| {
            GrantKitError::Internal(format!("system time before unix epoch: {err}"))
        })?;
        Ok(duration.as_secs())
    }
}

/// Manually driven clock, for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub const fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Sets the clock to `now`.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> GrantKitResult<u64> {
        Ok(self.now.load(Ordering::SeqCst))
    }
}
