/// Device identity half of a topic key. `AllDevices` is the wildcard that
/// matches a dispatch to any device id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceSelector {
    Device(i64),
    AllDevices,
}

/// Name half of a topic key. `Any` is the wildcard `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameSelector {
    Name(String),
    Any,
}

/// Concrete identity of a dispatched value: always a specific device and
/// name, never a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub device_id: i64,
    pub name: String,
}

impl Topic {
    pub fn new(device_id: i64, name: impl Into<String>) -> Self {
        Self {
            device_id,
            name: name.into(),
        }
    }
}

/// Names broker traffic carries system-wide; not an exhaustive enum since
/// user/application topics are arbitrary strings, but these are recognized
/// by convention for cross-component wiring.
pub mod well_known {
    pub const DATA_FRAME: &str = "DataFrame";
    pub const UNIQUE_DATA_FRAME: &str = "UniqueDataFrame";
    pub const PACKET_STORE_READY: &str = "PacketStoreReady";
    pub const REQUEST_PACKET_LIST: &str = "RequestPacketList";
    pub const PACKET_LIST: &str = "PacketList";
    pub const APRS_FRAME: &str = "AprsFrame";
    pub const APRS_STORE_READY: &str = "AprsStoreReady";
    pub const SEND_APRS_MESSAGE: &str = "SendAprsMessage";
    pub const WINLINK_STATUS: &str = "WinlinkStatus";
    pub const WINLINK_LOG: &str = "WinlinkLog";
    pub const WINLINK_LOG_ENTRY: &str = "WinlinkLogEntry";
    pub const MQTT_PREFIX: &str = "mqtt:";
}

/// The device id broker values are persisted under.
pub const PERSISTED_DEVICE_ID: i64 = 0;

pub(crate) fn selector_matches_device(selector: &DeviceSelector, device_id: i64) -> bool {
    match selector {
        DeviceSelector::AllDevices => true,
        DeviceSelector::Device(d) => *d == device_id,
    }
}

pub(crate) fn selector_matches_name(selector: &NameSelector, name: &str) -> bool {
    match selector {
        NameSelector::Any => true,
        NameSelector::Name(n) => n == name,
    }
}
