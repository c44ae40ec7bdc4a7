//! The plugin's own page, served at `<scheme>://example`.
//!
//! On load it registers its content id with the background and shows the
//! returned count; after that it only follows `example-count-updated`.

use std::sync::mpsc::Receiver;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PluginError;
use crate::host::{Ipc, PageMessage};
use crate::registry::SubscriberHandle;
use crate::topics::{COUNT_UPDATED, REGISTER_PAGE};

/// Ids the host reports for a tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabInfo {
    pub tab_id: String,
    pub tab_content_id: SubscriberHandle,
}

pub struct CounterPage {
    tab: TabInfo,
    inbox: Receiver<PageMessage>,
    click_count: Option<u64>,
}

impl CounterPage {
    pub fn new(tab: TabInfo, inbox: Receiver<PageMessage>) -> Self {
        Self { tab, inbox, click_count: None }
    }

    pub fn tab(&self) -> &TabInfo {
        &self.tab
    }

    /// Register for updates and seed the display with the current count.
    pub fn mount(&mut self, ipc: &dyn Ipc) -> Result<Option<u64>, PluginError> {
        let payload = Value::from(self.tab.tab_content_id.as_str());
        let reply = ipc.invoke(REGISTER_PAGE, payload)?;
        self.show(&reply);
        Ok(self.click_count)
    }

    /// Apply every pending count update. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.inbox.try_recv() {
            if msg.channel != COUNT_UPDATED {
                debug!(channel = %msg.channel, "ignoring message");
                continue;
            }
            if self.show(&msg.payload) {
                applied += 1;
            }
        }
        applied
    }

    /// Value currently rendered in `.click-count`, if any arrived yet.
    pub fn click_count(&self) -> Option<u64> {
        self.click_count
    }

    fn show(&mut self, v: &Value) -> bool {
        match v.as_u64() {
            Some(n) => {
                self.click_count = Some(n);
                true
            }
            None => {
                warn!(payload = %v, "count is not a non-negative integer");
                false
            }
        }
    }
}
