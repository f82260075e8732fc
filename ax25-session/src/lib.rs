//! AX.25 v2.2 connection-oriented session engine for one peer on one
//! channel: windowing, poll/final handshakes, SREJ/REJ recovery, and
//! T1/T2/T3 timers. This is the black-box "session module" the BBS, APRS,
//! and WinLink layers build on.

mod error;
mod session;
mod stats;
mod time;

pub use error::SessionError;
pub use session::{Session, SessionEvent, State, DEFAULT_MAX_PAYLOAD, DEFAULT_MAX_RETRIES};
pub use stats::SessionStats;
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
