//! Session-registry arbitration, SSID-based packet routing, and the
//! top-level `Station` that wires the BBS, Echo, WinLink, and APRS layers
//! onto one radio transport and callsign.

mod config;
mod registry;
mod router;
mod station;

pub use config::{AuthEntry, Config, ConfigError};
pub use registry::{ServerKind, SessionRegistry};
pub use router::{is_aprs_frame, route, RouteTarget};
pub use station::{DispatchOutcome, OutboundSink, Station};
