use std::fmt;

use serde_json::Value;

/// Opaque address of a page endpoint (the page's content id).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(String);

impl SubscriberHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read a handle from a register payload. Content ids arrive as numbers
    /// from real tabs and as strings from everything else; both are accepted.
    /// Strings are kept byte for byte.
    pub fn from_payload(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of one registration. Stays valid while other entries come and go,
/// so a delivery round run outside the registry can prune exactly what failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryId(u64);

/// Pages that asked to be told about count changes, in registration order.
///
/// Registration never deduplicates. A handle leaves the registry only when a
/// delivery to it fails during a broadcast round.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    entries: Vec<(EntryId, SubscriberHandle)>,
    next_id: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: SubscriberHandle) {
        self.next_id += 1;
        self.entries.push((EntryId(self.next_id), handle));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = &SubscriberHandle> + '_ {
        self.entries.iter().map(|(_, h)| h)
    }

    /// Copy of the current entries, in registration order.
    pub fn snapshot(&self) -> Vec<(EntryId, SubscriberHandle)> {
        self.entries.clone()
    }

    /// Drop the given entries. Ids no longer present are ignored.
    pub fn remove(&mut self, ids: &[EntryId]) {
        self.entries.retain(|(id, _)| !ids.contains(id));
    }

    /// Offer `value` to every handle once, in registration order.
    ///
    /// `send` reports whether the destination still exists. Handles it
    /// rejects are dropped and returned so the caller can log them; every
    /// handle left afterwards got this round's value.
    pub fn broadcast<F>(&mut self, value: u64, mut send: F) -> Vec<SubscriberHandle>
    where
        F: FnMut(&SubscriberHandle, u64) -> bool,
    {
        let mut dead_ids = Vec::new();
        let mut dead = Vec::new();

        for (id, handle) in self.snapshot() {
            if !send(&handle, value) {
                dead_ids.push(id);
                dead.push(handle);
            }
        }

        self.remove(&dead_ids);
        dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(id: &str) -> SubscriberHandle {
        SubscriberHandle::new(id)
    }

    #[test]
    fn register_keeps_duplicates() {
        let mut reg = SubscriberRegistry::new();
        reg.register(h("a1"));
        reg.register(h("a1"));
        assert_eq!(reg.len(), 2);

        let mut seen = Vec::new();
        reg.broadcast(3, |handle, v| {
            seen.push((handle.clone(), v));
            true
        });
        assert_eq!(seen, vec![(h("a1"), 3), (h("a1"), 3)]);
    }

    #[test]
    fn broadcast_visits_in_registration_order() {
        let mut reg = SubscriberRegistry::new();
        for id in ["a", "b", "c"] {
            reg.register(h(id));
        }

        let mut order = Vec::new();
        let dead = reg.broadcast(7, |handle, v| {
            assert_eq!(v, 7);
            order.push(handle.as_str().to_string());
            true
        });

        assert!(dead.is_empty());
        assert_eq!(order, ["a", "b", "c"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn failed_deliveries_are_pruned_without_skipping() {
        let mut reg = SubscriberRegistry::new();
        for id in ["a", "b", "c", "d"] {
            reg.register(h(id));
        }

        // Adjacent failures are where splice-style pruning skips elements.
        let mut visited = 0;
        let dead = reg.broadcast(1, |handle, _| {
            visited += 1;
            !matches!(handle.as_str(), "b" | "c")
        });

        assert_eq!(visited, 4);
        assert_eq!(dead, vec![h("b"), h("c")]);
        assert_eq!(reg.handles().cloned().collect::<Vec<_>>(), vec![h("a"), h("d")]);
    }

    #[test]
    fn pruned_handle_is_not_offered_next_round() {
        let mut reg = SubscriberRegistry::new();
        reg.register(h("a1"));
        reg.register(h("b1"));

        reg.broadcast(1, |handle, _| handle.as_str() != "a1");
        assert_eq!(reg.len(), 1);

        let mut next = Vec::new();
        reg.broadcast(2, |handle, _| {
            next.push(handle.clone());
            true
        });
        assert_eq!(next, vec![h("b1")]);
    }

    #[test]
    fn remove_by_id_spares_later_duplicates() {
        let mut reg = SubscriberRegistry::new();
        reg.register(h("a"));
        let round = reg.snapshot();

        // Same handle registered again after the round was taken.
        reg.register(h("a"));
        reg.remove(&[round[0].0]);

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.snapshot()[0].1, h("a"));
        assert_ne!(reg.snapshot()[0].0, round[0].0);
    }

    #[test]
    fn handle_from_payload() {
        assert_eq!(SubscriberHandle::from_payload(&Value::from(42)), Some(h("42")));
        assert_eq!(SubscriberHandle::from_payload(&Value::from(" b1 ")), Some(h(" b1 ")));
        assert_eq!(SubscriberHandle::from_payload(&Value::from("")), None);
        assert_eq!(SubscriberHandle::from_payload(&Value::Null), None);
    }
}
