use std::path::PathBuf;

use thiserror::Error;

use crate::registry::SubscriberHandle;

/// Failures of a durable store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PluginError {
    /// The persisted counter could not be parsed. Callers fall back to 0.
    #[error("stored value {raw:?} under {namespace}/{key} is not a counter: {source}")]
    CorruptState {
        namespace: String,
        key: String,
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// The counter is at its largest value and cannot advance.
    #[error("counter {namespace}/{key} is at {value} and cannot advance")]
    CounterOverflow {
        namespace: String,
        key: String,
        value: u64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A broadcast target no longer exists. Only ever logged.
    #[error("subscriber {0} is gone")]
    DeadSubscriber(SubscriberHandle),

    #[error("invalid url pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no handler registered for channel '{0}'")]
    NoHandler(String),

    #[error("'{0}' is already exposed in the main world")]
    AlreadyExposed(String),

    #[error("'{object}.{method}' is not exposed in the main world")]
    NotExposed { object: String, method: String },

    #[error("plugin is already enabled")]
    AlreadyEnabled,
}
