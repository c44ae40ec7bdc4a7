//! In-process host: storage, IPC router, registries and preloader context.
//!
//! Used by the `plugin` binary and the tests. Pages are modelled as channel
//! endpoints; dropping a page's receiver is the same as closing its tab.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};

use super::{
    Handler, Ipc, KeyValueStore, Listener, ListenerId, PageMessage, PageRegistry,
    PreloaderContext, PreloaderRegistry, PreloaderSpec, RegistrationId,
};
use crate::bridge::ExposedObject;
use crate::error::{PluginError, StoreError};
use crate::registry::SubscriberHandle;
use crate::sync::lock;

// ── Storage ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, namespace: &str, key: &str) -> Option<String> {
        lock(&self.items)
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    fn set_item(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.items).insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}

// ── IPC ─────────────────────────────────────────────────────────────────────

type SharedListener = Arc<dyn Fn(&Value) + Send + Sync>;
type SharedHandler = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

#[derive(Default)]
struct Router {
    next_id: u64,
    listeners: Vec<(ListenerId, String, SharedListener)>,
    handlers: HashMap<String, (ListenerId, SharedHandler)>,
    pages: HashMap<SubscriberHandle, Sender<PageMessage>>,
}

impl Router {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

/// Synchronous IPC router. Listeners and handlers run on the caller's thread
/// with the router unlocked, so they may call back into it.
#[derive(Default)]
pub struct LocalIpc {
    router: Mutex<Router>,
}

impl LocalIpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an endpoint for a page. Messages sent to `handle` arrive on the
    /// returned receiver until it is dropped or [`detach_page`](Self::detach_page) is called.
    pub fn attach_page(&self, handle: SubscriberHandle) -> Receiver<PageMessage> {
        let (tx, rx) = mpsc::channel();
        lock(&self.router).pages.insert(handle, tx);
        rx
    }

    pub fn detach_page(&self, handle: &SubscriberHandle) {
        lock(&self.router).pages.remove(handle);
    }

    /// Number of live subscriptions (listeners plus handlers) on `channel`.
    pub fn subscription_count(&self, channel: &str) -> usize {
        let router = lock(&self.router);
        let listeners = router.listeners.iter().filter(|(_, c, _)| c == channel).count();
        listeners + usize::from(router.handlers.contains_key(channel))
    }
}

impl Ipc for LocalIpc {
    fn on(&self, channel: &str, listener: Listener) -> ListenerId {
        let mut router = lock(&self.router);
        let id = router.next_id();
        router
            .listeners
            .push((id, channel.to_string(), Arc::from(listener)));
        id
    }

    fn handle(&self, channel: &str, handler: Handler) -> ListenerId {
        let mut router = lock(&self.router);
        let id = router.next_id();
        if router
            .handlers
            .insert(channel.to_string(), (id, Arc::from(handler)))
            .is_some()
        {
            warn!(channel, "replacing existing handler");
        }
        id
    }

    fn remove(&self, id: ListenerId) {
        let mut router = lock(&self.router);
        router.listeners.retain(|(lid, _, _)| *lid != id);
        router.handlers.retain(|_, (hid, _)| *hid != id);
    }

    fn send(&self, channel: &str, payload: Value) {
        let targets: Vec<SharedListener> = lock(&self.router)
            .listeners
            .iter()
            .filter(|(_, c, _)| c == channel)
            .map(|(_, _, l)| Arc::clone(l))
            .collect();

        if targets.is_empty() {
            debug!(channel, "no listeners");
        }
        for listener in targets {
            listener(&payload);
        }
    }

    fn invoke(&self, channel: &str, payload: Value) -> Result<Value, PluginError> {
        let handler = lock(&self.router)
            .handlers
            .get(channel)
            .map(|(_, h)| Arc::clone(h))
            .ok_or_else(|| PluginError::NoHandler(channel.to_string()))?;
        Ok(handler(&payload))
    }

    fn send_to(&self, target: &SubscriberHandle, channel: &str, payload: Value) -> bool {
        let mut router = lock(&self.router);
        let Some(tx) = router.pages.get(target) else {
            return false;
        };
        let msg = PageMessage { channel: channel.to_string(), payload };
        if tx.send(msg).is_err() {
            router.pages.remove(target);
            return false;
        }
        true
    }
}

// ── Registries ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct Registered {
    next_id: u64,
    preloaders: Vec<(RegistrationId, PreloaderSpec)>,
    pages: Vec<(RegistrationId, String, PathBuf)>,
}

impl Registered {
    fn next_id(&mut self) -> RegistrationId {
        self.next_id += 1;
        RegistrationId(self.next_id)
    }
}

/// Preloader and page registries backed by plain vectors.
#[derive(Default)]
pub struct LocalRegistries {
    inner: Mutex<Registered>,
}

impl LocalRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloaders whose URL patterns match `url`, in registration order.
    pub fn preloaders_for(&self, url: &str) -> Vec<PreloaderSpec> {
        lock(&self.inner)
            .preloaders
            .iter()
            .filter(|(_, spec)| spec.matches(url))
            .map(|(_, spec)| spec.clone())
            .collect()
    }

    pub fn page_names(&self) -> Vec<String> {
        lock(&self.inner)
            .pages
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }
}

impl PreloaderRegistry for LocalRegistries {
    fn add(&self, spec: PreloaderSpec) -> RegistrationId {
        let mut inner = lock(&self.inner);
        let id = inner.next_id();
        inner.preloaders.push((id, spec));
        id
    }

    fn remove(&self, id: RegistrationId) {
        lock(&self.inner).preloaders.retain(|(rid, _)| *rid != id);
    }
}

impl PageRegistry for LocalRegistries {
    fn add(&self, name: &str, dir: PathBuf) -> RegistrationId {
        let mut inner = lock(&self.inner);
        let id = inner.next_id();
        inner.pages.push((id, name.to_string(), dir));
        id
    }

    fn remove(&self, id: RegistrationId) {
        lock(&self.inner).pages.retain(|(rid, _, _)| *rid != id);
    }
}

// ── Preloader context ───────────────────────────────────────────────────────

/// One page load as seen from the preloader's isolated world.
pub struct LocalPreloaderContext {
    url: String,
    ipc: Arc<dyn Ipc>,
    globals: HashMap<String, ExposedObject>,
    executed: Vec<String>,
}

impl LocalPreloaderContext {
    pub fn new(ipc: Arc<dyn Ipc>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ipc,
            globals: HashMap::new(),
            executed: Vec::new(),
        }
    }

    /// What the page's own scripts can see.
    pub fn main_world(&self) -> MainWorld<'_> {
        MainWorld { globals: &self.globals }
    }

    /// Scripts injected so far, in execution order.
    pub fn executed_code(&self) -> &[String] {
        &self.executed
    }
}

impl PreloaderContext for LocalPreloaderContext {
    fn url(&self) -> &str {
        &self.url
    }

    fn ipc(&self) -> Arc<dyn Ipc> {
        Arc::clone(&self.ipc)
    }

    fn expose_in_main_world(&mut self, object: ExposedObject) -> Result<(), PluginError> {
        if self.globals.contains_key(object.name()) {
            return Err(PluginError::AlreadyExposed(object.name().to_string()));
        }
        self.globals.insert(object.name().to_string(), object);
        Ok(())
    }

    fn execute_code(&mut self, code: String) {
        self.executed.push(code);
    }
}

/// The page's unprivileged globals. Only exposed objects are reachable.
pub struct MainWorld<'a> {
    globals: &'a HashMap<String, ExposedObject>,
}

impl MainWorld<'_> {
    pub fn get(&self, object: &str) -> Option<&ExposedObject> {
        self.globals.get(object)
    }

    /// `window[object][method]()` from page script.
    pub fn call(&self, object: &str, method: &str) -> Result<(), PluginError> {
        match self.globals.get(object) {
            Some(obj) => obj.call(method),
            None => Err(PluginError::NotExposed {
                object: object.to_string(),
                method: method.to_string(),
            }),
        }
    }
}
