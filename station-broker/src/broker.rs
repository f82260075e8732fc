use crate::topic::{selector_matches_device, selector_matches_name, DeviceSelector, NameSelector, Topic, PERSISTED_DEVICE_ID};
use parking_lot::Mutex;
use serde_json::Value;
use station_store::{SystemTimeProvider, TimeProvider};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const PERSIST_DEBOUNCE_MS: u64 = 60_000;

type Callback = Arc<dyn Fn(&Topic, &Value) + Send + Sync>;

struct Subscription {
    device: DeviceSelector,
    name: NameSelector,
    callback: Callback,
}

struct PersistState {
    path: PathBuf,
    last_flush_ms: u64,
}

/// Process-wide topic bus. `dispatch` stores the value and notifies every
/// matching subscription; device 0 is additionally persisted to a JSON
/// side-file no more often than once per debounce interval.
pub struct Broker<T: TimeProvider = SystemTimeProvider> {
    time: T,
    values: Mutex<HashMap<Topic, Value>>,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
    next_id: AtomicU64,
    persist: Mutex<Option<PersistState>>,
}

impl Broker<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_time_provider(SystemTimeProvider)
    }
}

impl Default for Broker<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> Broker<T> {
    pub fn with_time_provider(time: T) -> Self {
        Self {
            time,
            values: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            persist: Mutex::new(None),
        }
    }

    /// Enables device-0 persistence to the given JSON file. Any values
    /// already on disk are loaded immediately.
    pub fn with_persistence(self: Arc<Self>, path: PathBuf) -> Arc<Self> {
        if let Ok(bytes) = fs::read(&path) {
            if let Ok(map) = serde_json::from_slice::<HashMap<String, Value>>(&bytes) {
                let mut values = self.values.lock();
                for (name, value) in map {
                    values.insert(Topic::new(PERSISTED_DEVICE_ID, name), value);
                }
            }
        }
        *self.persist.lock() = Some(PersistState {
            path,
            last_flush_ms: 0,
        });
        self
    }

    /// Stores `value` under `(device_id, name)` and notifies every
    /// subscription whose selectors match.
    pub fn dispatch(&self, device_id: i64, name: &str, value: Value, store: bool) {
        let topic = Topic::new(device_id, name.to_string());
        if store {
            self.values.lock().insert(topic.clone(), value.clone());
            if device_id == PERSISTED_DEVICE_ID {
                self.maybe_persist();
            }
        }
        let subs: Vec<Callback> = {
            let subs = self.subscriptions.lock();
            subs.values()
                .filter(|s| {
                    selector_matches_device(&s.device, device_id) && selector_matches_name(&s.name, name)
                })
                .map(|s| s.callback.clone())
                .collect()
        };
        for callback in subs {
            callback(&topic, &value);
        }
    }

    fn maybe_persist(&self) {
        let now = self.time.now_ms();
        let mut guard = self.persist.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        if now.saturating_sub(state.last_flush_ms) < PERSIST_DEBOUNCE_MS && state.last_flush_ms != 0 {
            return;
        }
        let snapshot: HashMap<String, Value> = self
            .values
            .lock()
            .iter()
            .filter(|(topic, _)| topic.device_id == PERSISTED_DEVICE_ID)
            .map(|(topic, value)| (topic.name.clone(), value.clone()))
            .collect();
        if let Ok(json) = serde_json::to_vec_pretty(&snapshot) {
            let _ = fs::write(&state.path, json);
        }
        state.last_flush_ms = now;
    }

    /// Forces the debounced persistence write regardless of the interval.
    pub fn flush_persisted(&self) {
        if let Some(state) = self.persist.lock().as_mut() {
            state.last_flush_ms = 0;
        }
        self.maybe_persist();
    }

    pub fn get_value(&self, device_id: i64, name: &str) -> Option<Value> {
        self.values
            .lock()
            .get(&Topic::new(device_id, name.to_string()))
            .cloned()
    }

    pub(crate) fn subscribe_raw(&self, device: DeviceSelector, name: NameSelector, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().insert(
            id,
            Subscription {
                device,
                name,
                callback,
            },
        );
        id
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        self.subscriptions.lock().remove(&id);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BrokerClient;
    use station_store::ManualTimeProvider;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn wildcard_device_subscription_sees_every_device() {
        let broker = Arc::new(Broker::new());
        let client = BrokerClient::new(broker.clone());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        client.subscribe_all_devices("Status", move |_, _| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        broker.dispatch(1, "Status", Value::from("a"), true);
        broker.dispatch(2, "Status", Value::from("b"), true);
        broker.dispatch(1, "OtherTopic", Value::from("c"), true);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disposing_client_removes_its_subscriptions() {
        let broker = Arc::new(Broker::new());
        {
            let client = BrokerClient::new(broker.clone());
            client.subscribe(1, "Foo", |_, _| {});
            assert_eq!(broker.subscription_count(), 1);
        }
        assert_eq!(broker.subscription_count(), 0);
    }

    #[test]
    fn device_zero_persists_with_debounce() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.json");
        let time = ManualTimeProvider::new(0);
        let broker = Arc::new(Broker::with_time_provider(time)).with_persistence(path.clone());
        broker.dispatch(0, "owner", Value::from("KK7VZT"), true);
        assert!(!path.exists(), "first write should wait for the debounce");
        broker.flush_persisted();
        assert!(path.exists());
        let contents: HashMap<String, Value> =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(contents.get("owner").unwrap(), "KK7VZT");
    }

    #[test]
    fn get_value_resolves_from_memory() {
        let broker = Broker::new();
        broker.dispatch(3, "Name", Value::from(42), true);
        assert_eq!(broker.get_value(3, "Name"), Some(Value::from(42)));
        assert_eq!(broker.get_value(3, "Missing"), None);
    }
}
