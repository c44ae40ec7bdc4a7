//! Interfaces of the host application this plugin runs inside.
//!
//! The host owns IPC, storage and the preloader/page registries. The plugin
//! only ever talks to them through these traits; [`local`] and
//! [`file_store`] provide in-process implementations.

pub mod file_store;
pub mod local;

use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::bridge::ExposedObject;
use crate::error::{PluginError, StoreError};
use crate::registry::SubscriberHandle;

pub use file_store::JsonFileStore;
pub use local::{LocalIpc, LocalPreloaderContext, LocalRegistries, MemoryStore};

/// Persistent string storage addressed by (namespace, key).
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, namespace: &str, key: &str) -> Option<String>;
    fn set_item(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError>;
}

pub type Listener = Box<dyn Fn(&Value) + Send + Sync>;
pub type Handler = Box<dyn Fn(&Value) -> Value + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Message delivered to a page endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct PageMessage {
    pub channel: String,
    pub payload: Value,
}

/// The host's message bus between pages and the background process.
pub trait Ipc: Send + Sync {
    /// Subscribe to a one-way channel.
    fn on(&self, channel: &str, listener: Listener) -> ListenerId;

    /// Answer request/response calls on `channel`. One handler per channel.
    fn handle(&self, channel: &str, handler: Handler) -> ListenerId;

    /// Drop a subscription made with [`on`](Self::on) or [`handle`](Self::handle).
    fn remove(&self, id: ListenerId);

    /// Fire-and-forget toward the background.
    fn send(&self, channel: &str, payload: Value);

    /// Request/response toward the background.
    fn invoke(&self, channel: &str, payload: Value) -> Result<Value, PluginError>;

    /// Deliver to one page. `false` means the page no longer exists.
    fn send_to(&self, target: &SubscriberHandle, channel: &str, payload: Value) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

/// Content script registration handed to the host's preloader registry.
#[derive(Clone, Debug)]
pub struct PreloaderSpec {
    pub url_patterns: Vec<Regex>,
    pub plugin_path: PathBuf,
    pub entry: &'static str,
    pub preloader_version: u32,
}

impl PreloaderSpec {
    pub fn matches(&self, url: &str) -> bool {
        self.url_patterns.iter().any(|re| re.is_match(url))
    }
}

pub trait PreloaderRegistry: Send + Sync {
    fn add(&self, spec: PreloaderSpec) -> RegistrationId;
    fn remove(&self, id: RegistrationId);
}

pub trait PageRegistry: Send + Sync {
    /// Serve the files under `dir` at `<scheme>://<name>`.
    fn add(&self, name: &str, dir: PathBuf) -> RegistrationId;
    fn remove(&self, id: RegistrationId);
}

/// The isolated world a preloader runs in for a single page load.
pub trait PreloaderContext {
    fn url(&self) -> &str;
    fn ipc(&self) -> Arc<dyn Ipc>;

    /// Make `object` reachable from the page's own scripts.
    fn expose_in_main_world(&mut self, object: ExposedObject) -> Result<(), PluginError>;

    /// Run `code` in the page's main world.
    fn execute_code(&mut self, code: String);
}

/// Everything the host hands a plugin when it is loaded.
#[derive(Clone)]
pub struct Host {
    pub store: Arc<dyn KeyValueStore>,
    pub ipc: Arc<dyn Ipc>,
    pub preloaders: Arc<dyn PreloaderRegistry>,
    pub pages: Arc<dyn PageRegistry>,
}
