use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use example_preloader::host::{Host, JsonFileStore, LocalIpc, LocalPreloaderContext, LocalRegistries};
use example_preloader::page::{CounterPage, TabInfo};
use example_preloader::topics::{EXPOSED_OBJECT, SEND_UPDATE};
use example_preloader::{ExamplePlugin, PLUGIN_ID, PluginConfig, SubscriberHandle, logging};
use serde_json::{Map, Value};
use tracing::info;

/// Drives the plugin against the in-process host: opens the plugin page,
/// loads a matching tab, clicks the injected button `clicks` times and
/// prints what the page shows.
///
/// Usage: `plugin [store.json] [clicks] [preferences-json]`
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let store_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("example-store.json"));
    let clicks: u32 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("clicks must be a number, got {s:?}"))?,
        None => 1,
    };
    let prefs: Map<String, Value> = match args.next() {
        Some(s) => serde_json::from_str(&s).context("preferences must be a JSON object")?,
        None => Map::new(),
    };

    let config = PluginConfig::from_preferences(&prefs);
    logging::init(&config.log_filter);
    let props = serde_json::to_string(&ExamplePlugin::PROPS).context("encoding plugin props")?;
    info!(plugin = PLUGIN_ID, %props, "Starting example preloader plugin");

    let store = Arc::new(
        JsonFileStore::open(&store_path)
            .with_context(|| format!("opening store {}", store_path.display()))?,
    );
    let ipc = Arc::new(LocalIpc::new());
    let registries = Arc::new(LocalRegistries::new());
    let host = Host {
        store,
        ipc: ipc.clone(),
        preloaders: registries.clone(),
        pages: registries.clone(),
    };

    let mut plugin = ExamplePlugin::new(config);
    plugin.on_init(&host, ExamplePlugin::PROPS.enabled)?;

    let handle = SubscriberHandle::new("1");
    let inbox = ipc.attach_page(handle.clone());
    let mut page = CounterPage::new(TabInfo { tab_id: "tab-1".into(), tab_content_id: handle }, inbox);
    let initial = page.mount(ipc.as_ref())?;
    info!(count = ?initial, "page mounted");

    let url = "https://www.stubhub.com/event/1";
    for _spec in registries.preloaders_for(url) {
        let mut ctx = LocalPreloaderContext::new(ipc.clone(), url);
        ExamplePlugin::run_preloader(&mut ctx)?;
        for _ in 0..clicks {
            ctx.main_world().call(EXPOSED_OBJECT, SEND_UPDATE)?;
        }
    }

    page.pump();
    match page.click_count() {
        Some(n) => println!("{n}"),
        None => println!("-"),
    }

    plugin.on_disabled(&host);
    Ok(())
}
