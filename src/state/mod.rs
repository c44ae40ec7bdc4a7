use std::sync::Arc;

use tracing::warn;

use crate::error::{PluginError, StoreError};
use crate::host::KeyValueStore;

/// The click count, mirrored to the host store under a fixed (namespace, key).
pub struct DurableCounter {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    key: String,
    value: u64,
}

impl DurableCounter {
    /// Load the stored count. A corrupt value is logged and treated as 0.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        let key = key.into();
        let value = match load(store.as_ref(), &namespace, &key) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "resetting counter to 0");
                0
            }
        };
        Self { store, namespace, key, value }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Add one and write the new value through to the store.
    ///
    /// At `u64::MAX` nothing changes and `CounterOverflow` is returned. On a
    /// `Store` error the in-memory value has still advanced; the error only
    /// reports that the store is now behind.
    pub fn increment(&mut self) -> Result<u64, PluginError> {
        let Some(next) = self.value.checked_add(1) else {
            return Err(PluginError::CounterOverflow {
                namespace: self.namespace.clone(),
                key: self.key.clone(),
                value: self.value,
            });
        };
        self.value = next;
        let raw = serde_json::to_string(&self.value).map_err(StoreError::from)?;
        self.store.set_item(&self.namespace, &self.key, &raw)?;
        Ok(self.value)
    }
}

/// Read the count stored under `namespace`/`key`. Absent or empty means 0;
/// anything else must be a non-negative integer.
pub fn load(store: &dyn KeyValueStore, namespace: &str, key: &str) -> Result<u64, PluginError> {
    let Some(raw) = store.get_item(namespace, key) else {
        return Ok(0);
    };
    if raw.is_empty() {
        return Ok(0);
    }
    serde_json::from_str(&raw).map_err(|source| PluginError::CorruptState {
        namespace: namespace.to_string(),
        key: key.to_string(),
        raw,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryStore;

    fn store_with(raw: Option<&str>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        if let Some(raw) = raw {
            store.set_item("example", "count", raw).unwrap();
        }
        store
    }

    #[test]
    fn absent_value_loads_as_zero() {
        let store = store_with(None);
        assert_eq!(load(store.as_ref(), "example", "count").unwrap(), 0);
        assert_eq!(DurableCounter::open(store, "example", "count").value(), 0);
    }

    #[test]
    fn stored_value_is_parsed() {
        let store = store_with(Some("41"));
        assert_eq!(DurableCounter::open(store, "example", "count").value(), 41);
    }

    #[test]
    fn corrupt_value_falls_back_to_zero() {
        for raw in ["not a number", "-3", "1.5", "{\"count\":1}", " ", "\n\t"] {
            let store = store_with(Some(raw));
            let err = load(store.as_ref(), "example", "count").unwrap_err();
            assert!(matches!(err, PluginError::CorruptState { .. }), "{raw}");
            assert_eq!(DurableCounter::open(store, "example", "count").value(), 0);
        }
    }

    #[test]
    fn open_twice_sees_same_value() {
        let store = store_with(Some("7"));
        let a = DurableCounter::open(store.clone(), "example", "count");
        let b = DurableCounter::open(store, "example", "count");
        assert_eq!(a.value(), b.value());
    }

    #[test]
    fn every_increment_is_persisted() {
        let store = store_with(None);
        let mut counter = DurableCounter::open(store.clone(), "example", "count");

        for expected in 1..=5u64 {
            assert_eq!(counter.increment().unwrap(), expected);
            assert_eq!(store.get_item("example", "count"), Some(expected.to_string()));
        }
        assert_eq!(counter.value(), 5);
    }

    #[test]
    fn failed_write_still_advances_memory() {
        struct ReadOnly;
        impl KeyValueStore for ReadOnly {
            fn get_item(&self, _: &str, _: &str) -> Option<String> {
                Some("2".into())
            }
            fn set_item(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
                Err(StoreError::Write {
                    path: "ro.json".into(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                })
            }
        }

        let mut counter = DurableCounter::open(Arc::new(ReadOnly), "example", "count");
        let err = counter.increment().unwrap_err();
        assert!(matches!(err, PluginError::Store(StoreError::Write { .. })), "{err}");
        assert_eq!(counter.value(), 3);
    }

    #[test]
    fn empty_value_loads_as_zero() {
        let store = store_with(Some(""));
        assert_eq!(load(store.as_ref(), "example", "count").unwrap(), 0);
    }

    #[test]
    fn increment_at_max_is_refused() {
        let max = u64::MAX.to_string();
        let store = store_with(Some(&max));
        let mut counter = DurableCounter::open(store.clone(), "example", "count");
        assert_eq!(counter.value(), u64::MAX);

        let err = counter.increment().unwrap_err();
        assert!(matches!(err, PluginError::CounterOverflow { value: u64::MAX, .. }), "{err}");
        assert_eq!(counter.value(), u64::MAX);
        assert_eq!(store.get_item("example", "count"), Some(max));
    }
}
