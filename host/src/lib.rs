#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Script host session: owns the world and every scripting subsystem, loads
//! plugins and drives the simulation tick.

mod config;
mod context;
mod network;

use std::{
    cell::RefCell,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

use anyhow::{anyhow, Context, Result};
use parkscript_core::{
    Command, Event, GroupId, HookEvent, NetworkMode, PlayerId, PluginId, ScriptError,
};
use parkscript_system_actions::ActionRegistry;
use parkscript_system_dispatcher::{Dispatcher, Endpoint, Shared};
use parkscript_system_permissions::{PermissionModel, ADMIN_GROUP};
use parkscript_system_plugins::{ConfigStores, PluginMetadata, PluginTable, Registration};
use parkscript_world::{apply, World};
use tracing::{debug, info, warn};

pub use config::HostConfig;
pub use context::{RideHandle, ScriptContext, StorageHandle, ThingHandle};
pub use network::NetworkHandle;

/// Player the host's own scripts act as in single-player and on a server.
pub const HOST_PLAYER: PlayerId = PlayerId::new(0);

/// Entry point a plugin registers; runs once after the plugin is accepted.
pub type PluginMain = Box<dyn FnOnce(&ScriptContext) -> anyhow::Result<()>>;

/// Role of the host in its session.
#[derive(Debug)]
pub enum Session {
    /// No network.
    SinglePlayer,
    /// Authoritative server accepting clients.
    Server,
    /// Client connected to a server through the endpoint.
    Client(Endpoint),
}

/// Owner of one scripting session.
pub struct ScriptHost {
    config: HostConfig,
    shared: Shared,
    dispatcher: Dispatcher,
    plugins: RefCell<PluginTable>,
    storage: Rc<RefCell<ConfigStores>>,
}

impl ScriptHost {
    /// Builds the world, permissions, action registry, event hub, dispatcher
    /// and plugin stores, in that order.
    pub fn new(config: HostConfig, session: Session) -> Result<Self> {
        config.validate()?;
        let world = World::with_config(config.world_config());
        let mut permissions = PermissionModel::new();
        permissions
            .set_default_group(GroupId::new(config.default_group))
            .context("configured default group does not exist")?;
        if !matches!(session, Session::Client(_)) {
            permissions.add_player_to_group(HOST_PLAYER, config.player_name.clone(), ADMIN_GROUP)?;
        }
        let registry = ActionRegistry::with_builtins();
        let shared = Shared::new(world, permissions, registry);

        let dispatcher = match session {
            Session::SinglePlayer => Dispatcher::local(shared.clone(), HOST_PLAYER),
            Session::Server => {
                Dispatcher::server(shared.clone(), HOST_PLAYER, config.server.clone())
            }
            Session::Client(endpoint) => Dispatcher::client(
                shared.clone(),
                endpoint,
                &config.player_name,
                config.action_timeout_ticks,
            ),
        };

        let storage = match &config.storage_path {
            Some(path) => ConfigStores::load(path)?,
            None => ConfigStores::new(),
        };
        info!(target: "host", mode = dispatcher.mode().as_str(), "script host ready");

        Ok(Self {
            config,
            shared,
            dispatcher,
            plugins: RefCell::new(PluginTable::new()),
            storage: Rc::new(RefCell::new(storage)),
        })
    }

    /// Settings the host was built with.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Subsystems shared by the host and its plugins.
    #[must_use]
    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    /// The host's dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Network mode of the session.
    #[must_use]
    pub fn mode(&self) -> NetworkMode {
        self.dispatcher.mode()
    }

    /// Context for host-side code that is not a plugin.
    #[must_use]
    pub fn context(&self) -> ScriptContext {
        self.context_for(None)
    }

    fn context_for(&self, plugin: Option<(PluginId, String)>) -> ScriptContext {
        ScriptContext::new(
            self.shared.clone(),
            self.dispatcher.clone(),
            self.storage.clone(),
            plugin,
        )
    }

    /// Attaches a client connection. Server sessions only.
    pub fn accept(&self, endpoint: Endpoint) -> Result<(), ScriptError> {
        self.dispatcher.accept(endpoint)
    }

    /// Loads a plugin.
    ///
    /// `source` must call [`Registration::register`] exactly once. Returns
    /// `None` when the plugin does not run in this session, which is the case
    /// for local plugins on a client. A failing entry point unloads the plugin
    /// again.
    pub fn load_plugin<F>(&self, source: F) -> Result<Option<PluginId>>
    where
        F: FnOnce(&mut Registration<PluginMain>) -> anyhow::Result<()>,
    {
        let mut registration = Registration::new();
        source(&mut registration).context("plugin failed while loading")?;
        let (metadata, main) = registration.finish()?;
        if !metadata.runs_in(self.mode()) {
            info!(
                target: "host",
                name = %metadata.name,
                mode = self.mode().as_str(),
                "plugin does not run in this session"
            );
            return Ok(None);
        }

        let name = metadata.name.clone();
        let id = self.plugins.borrow_mut().insert(metadata)?;
        let context = self.context_for(Some((id, name.clone())));
        let failure = match catch_unwind(AssertUnwindSafe(|| main(&context))) {
            Ok(Ok(())) => return Ok(Some(id)),
            Ok(Err(error)) => error,
            Err(_) => anyhow!("entry point panicked"),
        };
        warn!(target: "host", plugin = id.get(), name = %name, error = ?failure, "plugin failed to start");
        let _ = self.unload_plugin(id);
        Err(failure.context(format!("plugin '{name}' failed to start")))
    }

    /// Unloads a plugin, disposing its hook subscriptions, dropping its pending
    /// requests and removing its game actions.
    pub fn unload_plugin(&self, plugin: PluginId) -> Result<PluginMetadata, ScriptError> {
        let mut registry = self
            .shared
            .registry
            .try_borrow_mut()
            .map_err(|_| ScriptError::NestedAction)?;
        let metadata = self.plugins.borrow_mut().remove(plugin)?;
        let actions = registry.unregister_plugin(plugin);
        drop(registry);
        let hooks = self.shared.hub.dispose_plugin(plugin);
        let requests = self.dispatcher.discard_plugin(plugin);
        debug!(
            target: "host",
            plugin = plugin.get(),
            actions = actions.len(),
            hooks,
            requests,
            "plugin resources released"
        );
        Ok(metadata)
    }

    /// Loaded plugins in load order.
    #[must_use]
    pub fn plugins(&self) -> Vec<(PluginId, PluginMetadata)> {
        self.plugins
            .borrow()
            .iter()
            .map(|(id, metadata)| (id, metadata.clone()))
            .collect()
    }

    /// Advances the simulation by one tick and returns the new tick count.
    ///
    /// The world clock advances first, then network traffic is processed,
    /// then `interval.tick` and `interval.day` fire, and finally ready action
    /// results are delivered.
    pub fn tick(&self) -> u64 {
        let mut events = Vec::new();
        apply(&mut self.shared.world.borrow_mut(), Command::Tick, &mut events);

        let mut now = 0;
        let mut hooks = Vec::new();
        for event in events {
            match event {
                Event::TickAdvanced { tick } => {
                    now = tick;
                    hooks.push(HookEvent::Tick);
                }
                Event::DayElapsed { day } => {
                    debug!(target: "host", day, "day elapsed");
                    hooks.push(HookEvent::Day);
                }
                _ => {}
            }
        }

        self.dispatcher.pump(now);
        for hook in &hooks {
            let _ = self.shared.hub.publish(hook);
        }
        let _ = self.dispatcher.flush();
        now
    }

    /// Runs `ticks` ticks.
    pub fn run(&self, ticks: u64) {
        for _ in 0..ticks {
            let _ = self.tick();
        }
    }

    /// Writes plugin storage to the configured file, if any.
    pub fn save_storage(&self) -> Result<()> {
        match &self.config.storage_path {
            Some(path) => self.storage.borrow().save(path),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("mode", &self.mode())
            .field("plugins", &self.plugins.borrow().len())
            .finish_non_exhaustive()
    }
}
