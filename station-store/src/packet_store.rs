use crate::error::StoreResult;
use crate::time::{SystemTimeProvider, TimeProvider};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const RING_CAPACITY: usize = 2000;
const FLUSH_INTERVAL_MS: u64 = 60_000;

/// One observed TNC fragment, the unit recorded in the packet ring and the
/// on-disk capture log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub timestamp_ms: u64,
    pub incoming: bool,
    pub channel_id: String,
    pub radio_id: String,
    pub channel_name: String,
    pub data_hex: String,
    pub encoding: String,
    pub frame_type: String,
    pub corrections: u32,
    pub radio_mac: String,
}

impl PacketRecord {
    /// `"timestamp,incoming,TncFrag4,channelId,radioId,channelName,dataHex,encoding,frameType,corrections,radioMac"`
    fn to_line(&self) -> String {
        format!(
            "{},{},TncFrag4,{},{},{},{},{},{},{},{}",
            self.timestamp_ms,
            self.incoming,
            self.channel_id,
            self.radio_id,
            self.channel_name,
            self.data_hex,
            self.encoding,
            self.frame_type,
            self.corrections,
            self.radio_mac,
        )
    }
}

struct Inner {
    ring: VecDeque<PacketRecord>,
    pending: Vec<PacketRecord>,
    last_flush_ms: u64,
    file: Option<File>,
}

/// In-memory ring of the most recent fragments plus a debounced append-only
/// log on disk, grounded on the same "buffer, flush no more than once per
/// interval" shape used for capacity-constrained persistence elsewhere in
/// this workspace.
pub struct PacketStore<T: TimeProvider = SystemTimeProvider> {
    time: T,
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl PacketStore<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_time_provider(SystemTimeProvider)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let store = Self::new();
        store.attach_file(path)?;
        Ok(store)
    }
}

impl Default for PacketStore<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> PacketStore<T> {
    pub fn with_time_provider(time: T) -> Self {
        Self {
            time,
            path: None,
            inner: Mutex::new(Inner {
                ring: VecDeque::with_capacity(RING_CAPACITY),
                pending: Vec::new(),
                last_flush_ms: 0,
                file: None,
            }),
        }
    }

    fn attach_file<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut inner = self.inner.lock();
        inner.file = Some(file);
        Ok(())
    }

    /// Records a fragment into the ring (evicting the oldest past 2000) and
    /// queues it for the disk log, flushing immediately only if the
    /// throttle interval has elapsed.
    pub fn record(&self, record: PacketRecord) -> StoreResult<()> {
        let now = self.time.now_ms();
        let mut inner = self.inner.lock();
        if inner.ring.len() >= RING_CAPACITY {
            inner.ring.pop_front();
        }
        inner.ring.push_back(record.clone());
        inner.pending.push(record);
        if now.saturating_sub(inner.last_flush_ms) >= FLUSH_INTERVAL_MS {
            Self::flush_locked(&mut inner, now)?;
        }
        Ok(())
    }

    /// Forces a flush regardless of the throttle interval; call at process
    /// shutdown so buffered records are never silently lost.
    pub fn flush(&self) -> StoreResult<()> {
        let now = self.time.now_ms();
        let mut inner = self.inner.lock();
        Self::flush_locked(&mut inner, now)
    }

    fn flush_locked(inner: &mut Inner, now: u64) -> StoreResult<()> {
        if inner.pending.is_empty() {
            inner.last_flush_ms = now;
            return Ok(());
        }
        if let Some(file) = inner.file.as_mut() {
            for record in inner.pending.drain(..) {
                writeln!(file, "{}", record.to_line())?;
            }
            file.flush()?;
        } else {
            inner.pending.clear();
        }
        inner.last_flush_ms = now;
        Ok(())
    }

    pub fn recent(&self, limit: usize) -> Vec<PacketRecord> {
        let inner = self.inner.lock();
        inner
            .ring
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
