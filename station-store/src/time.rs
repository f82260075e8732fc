use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstracts "now" so dedup windows and flush throttling can be driven by
/// a fake clock in tests instead of wall time.
pub trait TimeProvider: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clone shares the same underlying counter (via `Arc`), so a single clock
/// can be handed to several components that each own their own `T` and
/// still observe one consistent, independently-advanceable time.
#[derive(Clone)]
pub struct ManualTimeProvider {
    now_ms: Arc<AtomicU64>,
}

impl ManualTimeProvider {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, delta: u64) {
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
