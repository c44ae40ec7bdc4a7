//! Lifecycle glue between the host and the plugin's parts.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::bridge::CapabilityBridge;
use crate::config::PluginConfig;
use crate::coordinator::BackgroundCoordinator;
use crate::error::PluginError;
use crate::host::{Host, PreloaderContext, RegistrationId};

/// What the plugin tells the host registry about itself. Serializes to the
/// registry's field names (`registryVersion`, `enabled`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginProps {
    pub registry_version: u32,
    /// Enabled the first time the host loads it.
    pub enabled: bool,
}

/// Holds everything created while enabled so that disabling can undo it.
struct Enabled {
    background: BackgroundCoordinator,
    preloader_id: RegistrationId,
    page_id: RegistrationId,
}

pub struct ExamplePlugin {
    config: PluginConfig,
    enabled: Option<Enabled>,
}

impl ExamplePlugin {
    pub const PROPS: PluginProps = PluginProps { registry_version: 1, enabled: true };

    pub fn new(config: PluginConfig) -> Self {
        Self { config, enabled: None }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.is_some()
    }

    pub fn background(&self) -> Option<&BackgroundCoordinator> {
        self.enabled.as_ref().map(|e| &e.background)
    }

    /// Called once when the host loads the plugin.
    pub fn on_init(&mut self, host: &Host, enabled: bool) -> Result<(), PluginError> {
        if enabled {
            self.on_enabled(host)?;
        }
        Ok(())
    }

    /// Start the background and register the preloader and the page.
    pub fn on_enabled(&mut self, host: &Host) -> Result<(), PluginError> {
        if self.enabled.is_some() {
            return Err(PluginError::AlreadyEnabled);
        }

        // Compile patterns first so a bad config leaves nothing half-registered.
        let preloader = self.config.preloader()?;

        let background = BackgroundCoordinator::new(
            Arc::clone(&host.store),
            Arc::clone(&host.ipc),
            &self.config.namespace,
            &self.config.counter_key,
        );
        let preloader_id = host.preloaders.add(preloader);
        let page_id = host
            .pages
            .add(&self.config.page_name, self.config.page_dir.clone());

        info!(
            count = background.count(),
            page = %self.config.page_name,
            "example-plugin: enabled"
        );
        self.enabled = Some(Enabled { background, preloader_id, page_id });
        Ok(())
    }

    /// Unregister everything and stop the background.
    pub fn on_disabled(&mut self, host: &Host) {
        let Some(mut e) = self.enabled.take() else {
            debug!("example-plugin: disable while not enabled");
            return;
        };
        host.preloaders.remove(e.preloader_id);
        host.pages.remove(e.page_id);
        e.background.shutdown();
        info!("example-plugin: disabled");
    }

    /// Preloader entry point, run by the host in each matching page's
    /// isolated world before the page loads.
    pub fn run_preloader(ctx: &mut dyn PreloaderContext) -> Result<(), PluginError> {
        CapabilityBridge::run(ctx)
    }
}
