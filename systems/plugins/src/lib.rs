#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Plugin registration bookkeeping and configuration storage.

mod config;

use std::collections::BTreeMap;

use parkscript_core::{NetworkMode, PluginId, PluginType, ScriptError, API_VERSION};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use config::{ConfigStore, ConfigStores, STORAGE_FORMAT_VERSION};

/// Descriptive metadata a plugin registers when it loads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginMetadata {
    /// Unique name of the plugin.
    pub name: String,
    /// Version string chosen by the author.
    pub version: String,
    /// One or more authors.
    pub authors: Vec<String>,
    /// Where the plugin runs in a networked game.
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    /// Oldest host API version the plugin works with.
    #[serde(default)]
    pub min_api_version: Option<u32>,
    /// Licence identifier.
    #[serde(default)]
    pub licence: String,
}

impl PluginMetadata {
    /// Creates metadata with a single author.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        author: impl Into<String>,
        plugin_type: PluginType,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            authors: vec![author.into()],
            plugin_type,
            min_api_version: None,
            licence: String::new(),
        }
    }

    /// Requires at least `version` of the host API.
    #[must_use]
    pub fn with_min_api_version(mut self, version: u32) -> Self {
        self.min_api_version = Some(version);
        self
    }

    /// Checks the metadata against what this host supports.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.name.trim().is_empty() {
            return Err(ScriptError::InvalidArguments(
                "plugin name must not be empty".to_owned(),
            ));
        }
        if self.authors.is_empty() {
            return Err(ScriptError::InvalidArguments(format!(
                "plugin '{}' must list at least one author",
                self.name
            )));
        }
        match self.min_api_version {
            Some(required) if required > API_VERSION => Err(ScriptError::UnsupportedApiVersion {
                required,
                provided: API_VERSION,
            }),
            _ => Ok(()),
        }
    }

    /// Reports whether the plugin runs in a session of the given mode.
    ///
    /// Clients of a networked game only run remote plugins.
    #[must_use]
    pub fn runs_in(&self, mode: NetworkMode) -> bool {
        mode != NetworkMode::Client || self.plugin_type == PluginType::Remote
    }
}

/// One-shot slot a plugin fills while it loads.
///
/// `M` is the entry point the host runs after a successful load.
#[derive(Debug)]
pub struct Registration<M> {
    registered: Option<(PluginMetadata, M)>,
}

impl<M> Default for Registration<M> {
    fn default() -> Self {
        Self { registered: None }
    }
}

impl<M> Registration<M> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the plugin's metadata and entry point. Only the first call of a
    /// load succeeds.
    pub fn register(&mut self, metadata: PluginMetadata, main: M) -> Result<(), ScriptError> {
        if let Some((existing, _)) = &self.registered {
            return Err(ScriptError::AlreadyRegistered(existing.name.clone()));
        }
        metadata.validate()?;
        self.registered = Some((metadata, main));
        Ok(())
    }

    /// Reports whether `register` succeeded.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered.is_some()
    }

    /// Ends the load, yielding what was registered.
    pub fn finish(self) -> Result<(PluginMetadata, M), ScriptError> {
        self.registered.ok_or(ScriptError::NotRegistered)
    }
}

/// Loaded plugins by identifier.
#[derive(Debug, Default)]
pub struct PluginTable {
    next_id: u32,
    plugins: BTreeMap<PluginId, PluginMetadata>,
}

impl PluginTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin. Names must be unique among loaded plugins.
    pub fn insert(&mut self, metadata: PluginMetadata) -> Result<PluginId, ScriptError> {
        if self.by_name(&metadata.name).is_some() {
            return Err(ScriptError::AlreadyRegistered(metadata.name));
        }
        let id = PluginId::new(self.next_id);
        self.next_id += 1;
        info!(
            target: "plugins",
            plugin = id.get(),
            name = %metadata.name,
            version = %metadata.version,
            "plugin loaded"
        );
        let _ = self.plugins.insert(id, metadata);
        Ok(id)
    }

    /// Removes a plugin and returns its metadata.
    pub fn remove(&mut self, id: PluginId) -> Result<PluginMetadata, ScriptError> {
        let metadata = self
            .plugins
            .remove(&id)
            .ok_or_else(|| ScriptError::not_found(parkscript_core::EntityKind::Plugin, id.get()))?;
        info!(target: "plugins", plugin = id.get(), name = %metadata.name, "plugin unloaded");
        Ok(metadata)
    }

    /// Looks up a loaded plugin.
    #[must_use]
    pub fn get(&self, id: PluginId) -> Option<&PluginMetadata> {
        self.plugins.get(&id)
    }

    /// Finds a loaded plugin by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<PluginId> {
        self.plugins
            .iter()
            .find(|(_, metadata)| metadata.name == name)
            .map(|(id, _)| *id)
    }

    /// Loaded plugins in load order.
    pub fn iter(&self) -> impl Iterator<Item = (PluginId, &PluginMetadata)> {
        self.plugins.iter().map(|(id, metadata)| (*id, metadata))
    }

    /// Number of loaded plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Reports whether no plugin is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_plugins_skip_clients() {
        let local = PluginMetadata::new("tools", "1.0", "ann", PluginType::Local);
        let remote = PluginMetadata::new("rules", "1.0", "ann", PluginType::Remote);
        assert!(local.runs_in(NetworkMode::None));
        assert!(local.runs_in(NetworkMode::Server));
        assert!(!local.runs_in(NetworkMode::Client));
        assert!(remote.runs_in(NetworkMode::Client));
    }

    #[test]
    fn metadata_parses_from_script_json() {
        let metadata: PluginMetadata = serde_json::from_str(
            r#"{"name":"benches","version":"0.3","authors":["ann","bo"],"type":"remote","minApiVersion":1}"#,
        )
        .expect("valid metadata");
        assert_eq!(metadata.plugin_type, PluginType::Remote);
        assert_eq!(metadata.min_api_version, Some(1));
        assert!(metadata.validate().is_ok());
    }

    #[test]
    fn table_ids_are_not_reused() {
        let mut table = PluginTable::new();
        let first = table
            .insert(PluginMetadata::new("a", "1", "x", PluginType::Local))
            .expect("fresh");
        let _ = table.remove(first).expect("loaded");
        let second = table
            .insert(PluginMetadata::new("a", "1", "x", PluginType::Local))
            .expect("name free again");
        assert_ne!(first, second);
        assert!(table.remove(first).is_err());
    }
}
