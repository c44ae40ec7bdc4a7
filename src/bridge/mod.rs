//! Preloader side: the capability surface handed to untrusted pages.

pub mod inject;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::PluginError;
use crate::host::PreloaderContext;
use crate::topics::{EXPOSED_OBJECT, SEND_UPDATE, UPDATE};

/// A zero-argument function page script may call.
pub type Capability = Arc<dyn Fn() + Send + Sync>;

/// A named set of capabilities, frozen once built.
///
/// There is no way to add, replace or remove a method after construction,
/// and nothing but the listed closures is reachable through it.
#[derive(Clone)]
pub struct ExposedObject {
    name: String,
    methods: Arc<BTreeMap<&'static str, Capability>>,
}

impl ExposedObject {
    pub fn new<I>(name: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Capability)>,
    {
        Self {
            name: name.into(),
            methods: Arc::new(methods.into_iter().collect()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    pub fn call(&self, method: &str) -> Result<(), PluginError> {
        let f = self
            .methods
            .get(method)
            .ok_or_else(|| PluginError::NotExposed {
                object: self.name.clone(),
                method: method.to_string(),
            })?;
        f();
        Ok(())
    }
}

impl fmt::Debug for ExposedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposedObject")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Install `methods` under `name` in the main world of `ctx`.
pub fn grant<I>(ctx: &mut dyn PreloaderContext, name: &str, methods: I) -> Result<(), PluginError>
where
    I: IntoIterator<Item = (&'static str, Capability)>,
{
    ctx.expose_in_main_world(ExposedObject::new(name, methods))
}

/// Runs once per matching page load.
pub struct CapabilityBridge;

impl CapabilityBridge {
    /// Expose `exampleAPI.sendUpdate` and inject the button that calls it.
    pub fn run(ctx: &mut dyn PreloaderContext) -> Result<(), PluginError> {
        let ipc = ctx.ipc();
        let send_update: Capability = Arc::new(move || ipc.send(UPDATE, Value::Null));

        grant(ctx, EXPOSED_OBJECT, [(SEND_UPDATE, send_update)])?;
        ctx.execute_code(inject::script(EXPOSED_OBJECT, SEND_UPDATE));

        debug!(url = ctx.url(), "bridge installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::host::{Ipc, LocalIpc, LocalPreloaderContext};

    fn count_updates(ipc: &LocalIpc) -> Arc<Mutex<u32>> {
        let hits = Arc::new(Mutex::new(0));
        let hits2 = Arc::clone(&hits);
        ipc.on(UPDATE, Box::new(move |_: &Value| *hits2.lock().unwrap() += 1));
        hits
    }

    #[test]
    fn exposes_only_send_update() {
        let ipc = Arc::new(LocalIpc::new());
        let mut ctx = LocalPreloaderContext::new(ipc.clone(), "https://www.stubhub.com/");
        CapabilityBridge::run(&mut ctx).unwrap();

        let world = ctx.main_world();
        let api = world.get(EXPOSED_OBJECT).unwrap();
        assert_eq!(api.method_names().collect::<Vec<_>>(), vec![SEND_UPDATE]);
        assert!(world.get("jancyAPI").is_none());
    }

    #[test]
    fn send_update_is_one_way_message() {
        let ipc = Arc::new(LocalIpc::new());
        let hits = count_updates(&ipc);
        let mut ctx = LocalPreloaderContext::new(ipc.clone(), "https://www.stubhub.com/");
        CapabilityBridge::run(&mut ctx).unwrap();

        ctx.main_world().call(EXPOSED_OBJECT, SEND_UPDATE).unwrap();
        ctx.main_world().call(EXPOSED_OBJECT, SEND_UPDATE).unwrap();
        assert_eq!(*hits.lock().unwrap(), 2);
    }

    #[test]
    fn unknown_methods_are_unreachable() {
        let ipc = Arc::new(LocalIpc::new());
        let mut ctx = LocalPreloaderContext::new(ipc, "https://www.stubhub.com/");
        CapabilityBridge::run(&mut ctx).unwrap();

        let err = ctx.main_world().call(EXPOSED_OBJECT, "setItem").unwrap_err();
        assert!(matches!(err, PluginError::NotExposed { method, .. } if method == "setItem"));
        assert!(ctx.main_world().call("storeRegistry", "getItem").is_err());
    }

    #[test]
    fn injects_script_once() {
        let ipc = Arc::new(LocalIpc::new());
        let mut ctx = LocalPreloaderContext::new(ipc, "https://www.stubhub.com/");
        CapabilityBridge::run(&mut ctx).unwrap();

        assert_eq!(ctx.executed_code().len(), 1);
        assert!(ctx.executed_code()[0].contains("window.exampleAPI.sendUpdate()"));
    }

    #[test]
    fn second_run_in_same_context_is_rejected() {
        let ipc = Arc::new(LocalIpc::new());
        let mut ctx = LocalPreloaderContext::new(ipc, "https://www.stubhub.com/");
        CapabilityBridge::run(&mut ctx).unwrap();

        let err = CapabilityBridge::run(&mut ctx).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyExposed(name) if name == EXPOSED_OBJECT));
        assert_eq!(ctx.executed_code().len(), 1);
    }
}
