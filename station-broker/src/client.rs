use crate::broker::Broker;
use crate::topic::{DeviceSelector, NameSelector, Topic};
use parking_lot::Mutex;
use serde_json::Value;
use station_store::TimeProvider;
use std::sync::Arc;

/// An owned subscription. Dropping it unregisters the callback from the
/// broker.
struct SubscriptionHandle<T: TimeProvider + 'static> {
    broker: Arc<Broker<T>>,
    id: u64,
}

impl<T: TimeProvider> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.id);
    }
}

/// Groups subscriptions under one lifetime. Built for a single logical
/// consumer (a BBS session, an APRS handler, a UI panel); dropping the
/// client tears down every subscription it created.
pub struct BrokerClient<T: TimeProvider + 'static = station_store::SystemTimeProvider> {
    broker: Arc<Broker<T>>,
    subscriptions: Mutex<Vec<SubscriptionHandle<T>>>,
}

impl<T: TimeProvider> BrokerClient<T> {
    pub fn new(broker: Arc<Broker<T>>) -> Self {
        Self {
            broker,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatch(&self, device_id: i64, name: &str, value: Value, store: bool) {
        self.broker.dispatch(device_id, name, value, store);
    }

    pub fn get_value(&self, device_id: i64, name: &str) -> Option<Value> {
        self.broker.get_value(device_id, name)
    }

    /// Subscribes to one exact `(device_id, name)` topic.
    pub fn subscribe<F>(&self, device_id: i64, name: &str, callback: F)
    where
        F: Fn(&Topic, &Value) + Send + Sync + 'static,
    {
        self.push_subscription(DeviceSelector::Device(device_id), NameSelector::Name(name.to_string()), callback)
    }

    /// Subscribes to `name` across every device id.
    pub fn subscribe_all_devices<F>(&self, name: &str, callback: F)
    where
        F: Fn(&Topic, &Value) + Send + Sync + 'static,
    {
        self.push_subscription(DeviceSelector::AllDevices, NameSelector::Name(name.to_string()), callback)
    }

    /// Subscribes to every name published by one device.
    pub fn subscribe_all_names<F>(&self, device_id: i64, callback: F)
    where
        F: Fn(&Topic, &Value) + Send + Sync + 'static,
    {
        self.push_subscription(DeviceSelector::Device(device_id), NameSelector::Any, callback)
    }

    fn push_subscription<F>(&self, device: DeviceSelector, name: NameSelector, callback: F)
    where
        F: Fn(&Topic, &Value) + Send + Sync + 'static,
    {
        let id = self.broker.subscribe_raw(device, name, Arc::new(callback));
        self.subscriptions.lock().push(SubscriptionHandle {
            broker: self.broker.clone(),
            id,
        });
    }

    /// Number of subscriptions currently owned by this client.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}
