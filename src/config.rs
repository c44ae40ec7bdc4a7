use std::path::PathBuf;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::PluginError;
use crate::host::PreloaderSpec;
use crate::topics::{COUNT_KEY, NAMESPACE};

/// Name of the preloader entry point the host calls for matching pages.
pub const PRELOADER_ENTRY: &str = "preloader";
pub const PRELOADER_VERSION: u32 = 1;

pub const DEFAULT_URL_PATTERN: &str = r"^.*stubhub\.com.*$";

#[derive(Clone, Debug, PartialEq)]
pub struct PluginConfig {
    /// Store namespace for the counter.
    pub namespace: String,
    pub counter_key: String,
    /// Served at `<scheme>://<page_name>`.
    pub page_name: String,
    pub page_dir: PathBuf,
    pub plugin_path: PathBuf,
    pub url_patterns: Vec<String>,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            namespace: NAMESPACE.to_string(),
            counter_key: COUNT_KEY.to_string(),
            page_name: NAMESPACE.to_string(),
            page_dir: PathBuf::from("page"),
            plugin_path: PathBuf::from("."),
            url_patterns: vec![DEFAULT_URL_PATTERN.to_string()],
            log_filter: "info".to_string(),
        }
    }
}

impl PluginConfig {
    /// Apply host preferences on top of the defaults. Missing, empty or
    /// wrongly typed fields keep their default.
    pub fn from_preferences(v: &Map<String, Value>) -> Self {
        let mut c = Self::default();
        if let Some(s) = get_str(v, "namespace") {
            c.namespace = s.to_string();
        }
        if let Some(s) = get_str(v, "counterKey") {
            c.counter_key = s.to_string();
        }
        if let Some(s) = get_str(v, "pageName") {
            c.page_name = s.to_string();
        }
        if let Some(s) = get_str(v, "pageDir") {
            c.page_dir = PathBuf::from(s);
        }
        if let Some(s) = get_str(v, "pluginPath") {
            c.plugin_path = PathBuf::from(s);
        }
        if let Some(p) = get_str_list(v, "urlPatterns") {
            c.url_patterns = p;
        }
        if let Some(s) = get_str(v, "logFilter") {
            c.log_filter = s.to_string();
        }
        c
    }

    /// Compile the URL patterns into a preloader registration.
    pub fn preloader(&self) -> Result<PreloaderSpec, PluginError> {
        let url_patterns = self
            .url_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| PluginError::Pattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PreloaderSpec {
            url_patterns,
            plugin_path: self.plugin_path.clone(),
            entry: PRELOADER_ENTRY,
            preloader_version: PRELOADER_VERSION,
        })
    }
}

fn get_str<'a>(v: &'a Map<String, Value>, k: &str) -> Option<&'a str> {
    v.get(k)?.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn get_str_list(v: &Map<String, Value>, k: &str) -> Option<Vec<String>> {
    match v.get(k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        Some(Value::Array(items)) => {
            let out: Vec<String> = items
                .iter()
                .filter_map(|i| i.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            (!out.is_empty()).then_some(out)
        }
        _ => None,
    }
}
