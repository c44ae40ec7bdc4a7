//! Durable store backed by a single JSON file.
//!
//! Layout: `{ "<namespace>": { "<key>": "<value>" } }`. The whole file is
//! rewritten on every `set_item`, via a temp file and rename.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::KeyValueStore;
use crate::error::StoreError;
use crate::sync::lock;

type Namespaces = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<Namespaces>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => Namespaces::new(),
            Ok(s) => serde_json::from_str(&s).map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Namespaces::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self { path, data: Mutex::new(data) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &Namespaces) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        let write_err = |source| StoreError::Write { path: self.path.clone(), source };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        fs::write(&tmp, body).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_item(&self, namespace: &str, key: &str) -> Option<String> {
        lock(&self.data).get(namespace)?.get(key).cloned()
    }

    fn set_item(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = lock(&self.data);
        data.entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.flush(&data)
    }
}
