use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::PluginError;
use crate::host::{Ipc, KeyValueStore, ListenerId};
use crate::registry::{SubscriberHandle, SubscriberRegistry};
use crate::state::DurableCounter;
use crate::sync::lock;
use crate::topics::{COUNT_UPDATED, REGISTER_PAGE, UPDATE};

/// Background half of the plugin: owns the count and the pages listening to it.
///
/// Constructed when the plugin is enabled and held by it until
/// [`shutdown`](Self::shutdown). The increment, its write-through and every
/// registration happen under one lock, so a register reply never observes a
/// half-finished increment. Deliveries run after that lock is released.
pub struct BackgroundCoordinator {
    shared: Arc<Shared>,
    ipc: Arc<dyn Ipc>,
    subscriptions: Vec<ListenerId>,
}

struct Shared {
    active: AtomicBool,
    state: Mutex<State>,
}

struct State {
    counter: DurableCounter,
    registry: SubscriberRegistry,
}

impl BackgroundCoordinator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ipc: Arc<dyn Ipc>,
        namespace: &str,
        counter_key: &str,
    ) -> Self {
        let shared = Arc::new(Shared {
            active: AtomicBool::new(true),
            state: Mutex::new(State {
                counter: DurableCounter::open(store, namespace, counter_key),
                registry: SubscriberRegistry::new(),
            }),
        });

        // Handlers hold the bus weakly; the bus owns them.
        let on_update = {
            let shared = Arc::clone(&shared);
            let bus = Arc::downgrade(&ipc);
            ipc.on(UPDATE, Box::new(move |_: &Value| shared.on_update(&bus)))
        };
        let on_register = {
            let shared = Arc::clone(&shared);
            ipc.handle(
                REGISTER_PAGE,
                Box::new(move |payload: &Value| shared.on_register(payload)),
            )
        };

        Self {
            shared,
            ipc,
            subscriptions: vec![on_update, on_register],
        }
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        lock(&self.shared.state).counter.value()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.state).registry.len()
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Stop handling events and drop both channel subscriptions.
    /// Events that still reach a handler afterwards are discarded.
    pub fn shutdown(&mut self) {
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }
        for id in self.subscriptions.drain(..) {
            self.ipc.remove(id);
        }
        info!("example-plugin: background stopped");
    }
}

impl Drop for BackgroundCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn on_update(&self, bus: &Weak<dyn Ipc>) {
        let (value, round) = {
            let mut state = lock(&self.state);
            if !self.active.load(Ordering::SeqCst) {
                debug!(channel = UPDATE, "dropping event after shutdown");
                return;
            }

            let value = match state.counter.increment() {
                Ok(v) => v,
                Err(e @ PluginError::CounterOverflow { .. }) => {
                    error!(error = %e, "not broadcasting");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "failed to persist count");
                    state.counter.value()
                }
            };
            (value, state.registry.snapshot())
        };

        let Some(ipc) = bus.upgrade() else {
            return;
        };

        // A page may call back into the register handler from send_to.
        let mut dead = Vec::new();
        for (id, handle) in round {
            if !ipc.send_to(&handle, COUNT_UPDATED, Value::from(value)) {
                dead.push((id, handle));
            }
        }
        if dead.is_empty() {
            return;
        }

        let ids: Vec<_> = dead.iter().map(|(id, _)| *id).collect();
        lock(&self.state).registry.remove(&ids);
        for (_, h) in dead {
            info!(reason = %PluginError::DeadSubscriber(h), "example-plugin: removing listener");
        }
    }

    fn on_register(&self, payload: &Value) -> Value {
        let mut state = lock(&self.state);
        if !self.active.load(Ordering::SeqCst) {
            debug!(channel = REGISTER_PAGE, "dropping event after shutdown");
            return Value::Null;
        }

        match SubscriberHandle::from_payload(payload) {
            Some(handle) => {
                info!("example-plugin: adding listener {handle}");
                state.registry.register(handle);
            }
            None => warn!(%payload, "register payload is not a content id"),
        }
        Value::from(state.counter.value())
    }
}
