use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Abstracts the wall clock so T1/T2/T3 (and any other timer) can be driven
/// by tests deterministically.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually-advanced clock for unit tests: timer expiry, retry budgets,
/// and the APRS HMAC minute window (in the `station-aprs` crate) are all
/// tested against this rather than real time.
#[derive(Debug)]
pub struct ManualTimeProvider {
    instant: RwLock<Instant>,
}

impl ManualTimeProvider {
    pub fn new(start: Instant) -> Self {
        Self {
            instant: RwLock::new(start),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.instant.write().unwrap() += duration;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> Instant {
        *self.instant.read().unwrap()
    }
}
