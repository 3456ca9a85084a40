use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use parkscript_core::ScriptValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Version written into storage files.
pub const STORAGE_FORMAT_VERSION: u32 = 1;

/// Flat key-value store addressed by dotted keys such as `benches.colour`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigStore {
    values: BTreeMap<String, ScriptValue>,
}

impl ConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        self.values.get(key)
    }

    /// Value stored under `key`, or `default` when absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: ScriptValue) -> ScriptValue {
        self.values.get(key).cloned().unwrap_or(default)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ScriptValue>) {
        let _ = self.values.insert(key.into(), value.into());
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<ScriptValue> {
        self.values.remove(key)
    }

    /// Reports whether a value is stored under `key`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Every entry below `namespace`, keyed without the `namespace.` prefix.
    ///
    /// An empty namespace returns the whole store.
    #[must_use]
    pub fn get_all(&self, namespace: &str) -> BTreeMap<String, ScriptValue> {
        if namespace.is_empty() {
            return self.values.clone();
        }
        let prefix = format!("{namespace}.");
        self.values
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key[prefix.len()..].to_owned(), value.clone()))
            .collect()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    #[serde(default)]
    configuration: ConfigStore,
    #[serde(default)]
    shared: ConfigStore,
    #[serde(default)]
    plugins: BTreeMap<String, ConfigStore>,
}

/// The user configuration, storage shared by all plugins, and each plugin's
/// private storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigStores {
    configuration: ConfigStore,
    shared: ConfigStore,
    plugins: BTreeMap<String, ConfigStore>,
}

impl ConfigStores {
    /// Creates empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// User configuration.
    #[must_use]
    pub fn configuration(&self) -> &ConfigStore {
        &self.configuration
    }

    /// Mutable user configuration.
    pub fn configuration_mut(&mut self) -> &mut ConfigStore {
        &mut self.configuration
    }

    /// Storage visible to every plugin.
    #[must_use]
    pub fn shared(&self) -> &ConfigStore {
        &self.shared
    }

    /// Mutable storage visible to every plugin.
    pub fn shared_mut(&mut self) -> &mut ConfigStore {
        &mut self.shared
    }

    /// Private storage of the named plugin, if it has stored anything.
    #[must_use]
    pub fn plugin(&self, name: &str) -> Option<&ConfigStore> {
        self.plugins.get(name)
    }

    /// Private storage of the named plugin, created on first use.
    pub fn plugin_mut(&mut self, name: &str) -> &mut ConfigStore {
        self.plugins.entry(name.to_owned()).or_default()
    }

    /// Reads stores from `path`. A missing file yields empty stores.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(target: "plugins", path = %path.display(), "no storage file, starting empty");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read plugin storage at {}", path.display()))?;
        let file: StorageFile = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse plugin storage at {}", path.display()))?;
        if file.version != STORAGE_FORMAT_VERSION {
            bail!(
                "unsupported plugin storage version {}; expected {}",
                file.version,
                STORAGE_FORMAT_VERSION
            );
        }
        Ok(Self {
            configuration: file.configuration,
            shared: file.shared,
            plugins: file.plugins,
        })
    }

    /// Writes every store to `path`, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = StorageFile {
            version: STORAGE_FORMAT_VERSION,
            configuration: self.configuration.clone(),
            shared: self.shared.clone(),
            plugins: self.plugins.clone(),
        };
        let contents =
            serde_json::to_string_pretty(&file).context("failed to serialize plugin storage")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write plugin storage at {}", path.display()))?;
        debug!(target: "plugins", path = %path.display(), "plugin storage saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_all_strips_the_namespace() {
        let mut store = ConfigStore::new();
        store.set("benches.colour", 3);
        store.set("benches.style.name", "wooden");
        store.set("benchesextra", true);
        store.set("lamps.colour", 1);

        let benches = store.get_all("benches");
        assert_eq!(benches.len(), 2);
        assert_eq!(benches["colour"], ScriptValue::Int(3));
        assert_eq!(benches["style.name"], ScriptValue::from("wooden"));
        assert_eq!(store.get_all("").len(), 4);
        assert!(store.get_all("fountains").is_empty());
    }

    #[test]
    fn get_or_falls_back_only_when_missing() {
        let mut store = ConfigStore::new();
        store.set("speed", 0);
        assert_eq!(
            store.get_or("speed", ScriptValue::Int(9)),
            ScriptValue::Int(0)
        );
        assert_eq!(
            store.get_or("missing", ScriptValue::Bool(true)),
            ScriptValue::Bool(true)
        );
        assert!(store.has("speed"));
        assert_eq!(store.remove("speed"), Some(ScriptValue::Int(0)));
        assert!(!store.has("speed"));
    }

    #[test]
    fn non_finite_floats_survive_save_and_load() {
        let dir = std::env::temp_dir().join(format!(
            "parkscript-float-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos())
                .unwrap_or_default()
        ));
        let path = dir.join("storage.json");

        let mut stores = ConfigStores::new();
        stores.shared_mut().set("ratio", f64::NAN);
        stores.shared_mut().set("ceiling", f64::INFINITY);
        stores.plugin_mut("ledger").set("floor", f64::NEG_INFINITY);
        stores.plugin_mut("ledger").set("rate", 0.25);
        stores.save(&path).expect("saves");

        let loaded = ConfigStores::load(&path).expect("loads");
        let _ = fs::remove_dir_all(&dir);
        assert!(matches!(
            loaded.shared().get("ratio"),
            Some(ScriptValue::Float(value)) if value.is_nan()
        ));
        assert_eq!(
            loaded.shared().get("ceiling"),
            Some(&ScriptValue::Float(f64::INFINITY))
        );
        let ledger = loaded.plugin("ledger").expect("ledger storage");
        assert_eq!(
            ledger.get("floor"),
            Some(&ScriptValue::Float(f64::NEG_INFINITY))
        );
        assert_eq!(ledger.get("rate"), Some(&ScriptValue::Float(0.25)));
    }
}
