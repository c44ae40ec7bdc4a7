//! Example preloader plugin.
//!
//! A background coordinator keeps a persisted click counter and pushes every
//! change to the pages that registered for it. A preloader bridge exposes a
//! single `sendUpdate` capability into matching pages and injects a button
//! that calls it.

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod logging;
pub mod page;
pub mod plugin;
pub mod registry;
pub mod state;
mod sync;
pub mod topics;

pub use config::PluginConfig;
pub use coordinator::BackgroundCoordinator;
pub use error::{PluginError, StoreError};
pub use plugin::ExamplePlugin;
pub use registry::{SubscriberHandle, SubscriberRegistry};
pub use state::DurableCounter;

pub const PLUGIN_ID: &str = "io.jancy.example-preloader";
