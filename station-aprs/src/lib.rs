//! APRS packet classification, content and sequence dedup, time-windowed
//! HMAC message authentication, and ack-driven retry for outgoing
//! authenticated messages. `AprsHandler` wires these primitives into the
//! message flow for traffic addressed to this station.

mod auth;
mod classify;
mod dedup;
mod handler;
mod log;
mod message;
mod retry;

pub use auth::{compute_token, current_minute, verify_token, SecretKey};
pub use classify::{classify, parse_message, PacketKind, ParsedMessage};
pub use dedup::{ContentDedup, SeqCache};
pub use handler::{AprsHandler, PeerAuth, APRS_PID};
pub use log::{AprsLog, Direction, MessageLogEntry};
pub use message::{build_ack, build_message};
pub use retry::{RetryQueue, MAX_RETRIES, RETRY_INTERVAL_MS};
