//! Process-wide publish/subscribe bus keyed on `(deviceId, name)`, with
//! wildcard subscriptions and throttled persistence of device-0 values.

mod broker;
mod client;
mod topic;

pub use broker::Broker;
pub use client::BrokerClient;
pub use topic::{well_known, DeviceSelector, NameSelector, Topic, PERSISTED_DEVICE_ID};
