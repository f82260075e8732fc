//! Frame deduplication, the in-memory/disk packet ring, and the
//! rusqlite-backed key-value store shared by the BBS, APRS, and WinLink
//! components.

mod dedup;
mod error;
mod packet_store;
mod schema;
mod storage;
pub mod time;

pub use dedup::{FrameDeduplicator, SharedDeduplicator};
pub use error::{StoreError, StoreResult};
pub use packet_store::{PacketRecord, PacketStore};
pub use storage::Storage;
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
