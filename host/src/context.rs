//! The handle plugins use to reach the host.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use parkscript_core::{
    ActionArgs, Coord3, GameActionResult, HookEvent, HookType, MapSize, ParkMessageType,
    PluginId, RequestId, RideId, RideObject, ScriptError, ScriptValue, ThingId, ThingType,
    API_VERSION,
};
use parkscript_system_actions::GameActionDesc;
use parkscript_system_dispatcher::{Dispatcher, Shared};
use parkscript_system_events::Subscription;
use parkscript_system_plugins::{ConfigStore, ConfigStores};
use parkscript_world::{query, GameDate, ParkMessage, PeepAppearance, Ride, Thing, World};

use crate::network::NetworkHandle;

/// Everything a plugin may do, bound to the plugin that owns it.
///
/// Contexts are cheap to clone and may be captured by hook handlers and
/// action callbacks.
#[derive(Clone)]
pub struct ScriptContext {
    shared: Shared,
    dispatcher: Dispatcher,
    storage: Rc<RefCell<ConfigStores>>,
    plugin: Option<(PluginId, String)>,
}

impl ScriptContext {
    pub(crate) fn new(
        shared: Shared,
        dispatcher: Dispatcher,
        storage: Rc<RefCell<ConfigStores>>,
        plugin: Option<(PluginId, String)>,
    ) -> Self {
        Self {
            shared,
            dispatcher,
            storage,
            plugin,
        }
    }

    fn owner(&self) -> Option<PluginId> {
        self.plugin.as_ref().map(|(id, _)| *id)
    }

    /// Plugin the context belongs to; `None` for the host itself.
    #[must_use]
    pub fn plugin(&self) -> Option<PluginId> {
        self.owner()
    }

    /// Version of the scripting API the host implements.
    #[must_use]
    pub const fn api_version(&self) -> u32 {
        API_VERSION
    }

    /// Subscribes to a hook by its script name, such as `interval.tick`.
    pub fn subscribe<F>(&self, hook: &str, handler: F) -> Result<Subscription, ScriptError>
    where
        F: FnMut(&HookEvent) -> anyhow::Result<()> + 'static,
    {
        let hook: HookType = hook.parse()?;
        Ok(self.shared.hub.subscribe(hook, self.owner(), handler))
    }

    /// Registers a game action owned by this plugin.
    pub fn register_game_action(&self, desc: GameActionDesc) -> Result<(), ScriptError> {
        self.shared
            .registry
            .try_borrow_mut()
            .map_err(|_| ScriptError::NestedAction)?
            .register(desc, self.owner())
    }

    /// Predicts an action; see [`Dispatcher::query_action`].
    pub fn query_action<F>(
        &self,
        action: &str,
        args: ActionArgs,
        callback: F,
    ) -> Result<RequestId, ScriptError>
    where
        F: FnOnce(&GameActionResult) + 'static,
    {
        self.dispatcher
            .query_action(self.owner(), action, args, callback)
    }

    /// Runs an action; see [`Dispatcher::execute_action`].
    pub fn execute_action<F>(
        &self,
        action: &str,
        args: ActionArgs,
        callback: F,
    ) -> Result<RequestId, ScriptError>
    where
        F: FnOnce(&GameActionResult) + 'static,
    {
        self.dispatcher
            .execute_action(self.owner(), action, args, callback)
    }

    /// Runs `read` against the world.
    pub fn with_world<R>(&self, read: impl FnOnce(&World) -> R) -> Result<R, ScriptError> {
        let world = self
            .shared
            .world
            .try_borrow()
            .map_err(|_| ScriptError::WorldBusy)?;
        Ok(read(&world))
    }

    /// Dimensions of the map.
    pub fn map_size(&self) -> Result<MapSize, ScriptError> {
        self.with_world(query::map_size)
    }

    /// Current date.
    pub fn date(&self) -> Result<GameDate, ScriptError> {
        self.with_world(query::date)
    }

    /// Handle to an existing ride.
    pub fn ride(&self, id: RideId) -> Result<RideHandle, ScriptError> {
        self.with_world(|world| query::ride(world, id).map(|_| ()))??;
        Ok(RideHandle {
            id,
            world: self.shared.world.clone(),
        })
    }

    /// Handles to every ride.
    pub fn rides(&self) -> Result<Vec<RideHandle>, ScriptError> {
        let ids = self.with_world(|world| {
            query::rides(world)
                .into_iter()
                .map(Ride::id)
                .collect::<Vec<_>>()
        })?;
        Ok(ids
            .into_iter()
            .map(|id| RideHandle {
                id,
                world: self.shared.world.clone(),
            })
            .collect())
    }

    /// Handle to an existing thing.
    pub fn thing(&self, id: ThingId) -> Result<ThingHandle, ScriptError> {
        self.with_world(|world| query::thing(world, id).map(|_| ()))??;
        Ok(ThingHandle {
            id,
            world: self.shared.world.clone(),
        })
    }

    /// Handles to every thing of `kind`.
    pub fn things_of(&self, kind: ThingType) -> Result<Vec<ThingHandle>, ScriptError> {
        let ids = self.with_world(|world| {
            query::things_of(world, kind)
                .into_iter()
                .map(Thing::id)
                .collect::<Vec<_>>()
        })?;
        Ok(ids
            .into_iter()
            .map(|id| ThingHandle {
                id,
                world: self.shared.world.clone(),
            })
            .collect())
    }

    /// Number of things of any kind.
    pub fn num_things(&self) -> Result<usize, ScriptError> {
        self.with_world(query::num_things)
    }

    /// Posts a message to the park news feed of this host only.
    ///
    /// The feed is not replicated: a message posted on the server never
    /// reaches clients, and the reverse. Plugins that need every player to
    /// see a message run on each host or register an action for it.
    pub fn post_message(
        &self,
        kind: ParkMessageType,
        text: impl Into<String>,
        subject: Option<u32>,
    ) -> Result<(), ScriptError> {
        self.shared
            .world
            .try_borrow_mut()
            .map_err(|_| ScriptError::WorldBusy)?
            .park_mut()
            .post_message(ParkMessage {
                kind,
                text: text.into(),
                subject,
            });
        Ok(())
    }

    /// The user configuration.
    #[must_use]
    pub fn configuration(&self) -> StorageHandle {
        self.storage_handle(Scope::Configuration)
    }

    /// Storage shared by every plugin.
    #[must_use]
    pub fn shared_storage(&self) -> StorageHandle {
        self.storage_handle(Scope::Shared)
    }

    /// Storage private to this plugin.
    pub fn local_storage(&self) -> Result<StorageHandle, ScriptError> {
        let (_, name) = self.plugin.as_ref().ok_or(ScriptError::NotRegistered)?;
        Ok(self.storage_handle(Scope::Plugin(name.clone())))
    }

    fn storage_handle(&self, scope: Scope) -> StorageHandle {
        StorageHandle {
            stores: self.storage.clone(),
            scope,
        }
    }

    /// Players, groups and chat of the session.
    #[must_use]
    pub fn network(&self) -> NetworkHandle {
        NetworkHandle::new(self.shared.clone(), self.dispatcher.clone())
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

/// Reference to a ride that stays valid until the ride is demolished.
#[derive(Clone)]
pub struct RideHandle {
    id: RideId,
    world: Rc<RefCell<World>>,
}

impl RideHandle {
    /// Identifier of the ride.
    #[must_use]
    pub const fn id(&self) -> RideId {
        self.id
    }

    fn read<R>(&self, read: impl FnOnce(&Ride) -> R) -> Result<R, ScriptError> {
        let world = self
            .world
            .try_borrow()
            .map_err(|_| ScriptError::WorldBusy)?;
        query::ride(&world, self.id).map(read)
    }

    /// Type metadata of the ride.
    pub fn object(&self) -> Result<RideObject, ScriptError> {
        self.read(|ride| ride.object().clone())
    }

    /// Display name.
    pub fn name(&self) -> Result<String, ScriptError> {
        self.read(|ride| ride.name().to_owned())
    }

    /// Ride type index.
    pub fn ride_type(&self) -> Result<u8, ScriptError> {
        self.read(Ride::ride_type)
    }

    /// Excitement, intensity and nausea ratings, in hundredths.
    pub fn ratings(&self) -> Result<(i32, i32, i32), ScriptError> {
        self.read(|ride| (ride.excitement(), ride.intensity(), ride.nausea()))
    }

    /// Guests that have ridden so far.
    pub fn total_customers(&self) -> Result<u32, ScriptError> {
        self.read(Ride::total_customers)
    }
}

impl std::fmt::Debug for RideHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RideHandle").field("id", &self.id).finish()
    }
}

/// Reference to a thing that stays valid until the thing is removed.
#[derive(Clone)]
pub struct ThingHandle {
    id: ThingId,
    world: Rc<RefCell<World>>,
}

impl ThingHandle {
    /// Identifier of the thing.
    #[must_use]
    pub const fn id(&self) -> ThingId {
        self.id
    }

    fn read<R>(&self, read: impl FnOnce(&Thing) -> R) -> Result<R, ScriptError> {
        let world = self
            .world
            .try_borrow()
            .map_err(|_| ScriptError::WorldBusy)?;
        query::thing(&world, self.id).map(read)
    }

    /// Kind of thing.
    pub fn kind(&self) -> Result<ThingType, ScriptError> {
        self.read(Thing::kind)
    }

    /// Game-unit position.
    pub fn position(&self) -> Result<Coord3, ScriptError> {
        self.read(Thing::position)
    }

    /// Clothing colours, for peeps.
    pub fn peep(&self) -> Result<Option<PeepAppearance>, ScriptError> {
        self.read(|thing| thing.peep().copied())
    }
}

impl std::fmt::Debug for ThingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingHandle").field("id", &self.id).finish()
    }
}

#[derive(Clone, Debug)]
enum Scope {
    Configuration,
    Shared,
    Plugin(String),
}

/// One configuration namespace as seen by a plugin.
#[derive(Clone)]
pub struct StorageHandle {
    stores: Rc<RefCell<ConfigStores>>,
    scope: Scope,
}

impl StorageHandle {
    fn read<R>(&self, read: impl FnOnce(&ConfigStore) -> R) -> R {
        let stores = self.stores.borrow();
        match &self.scope {
            Scope::Configuration => read(stores.configuration()),
            Scope::Shared => read(stores.shared()),
            Scope::Plugin(name) => match stores.plugin(name) {
                Some(store) => read(store),
                None => read(&ConfigStore::new()),
            },
        }
    }

    fn write<R>(&self, write: impl FnOnce(&mut ConfigStore) -> R) -> R {
        let mut stores = self.stores.borrow_mut();
        match &self.scope {
            Scope::Configuration => write(stores.configuration_mut()),
            Scope::Shared => write(stores.shared_mut()),
            Scope::Plugin(name) => write(stores.plugin_mut(name)),
        }
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ScriptValue> {
        self.read(|store| store.get(key).cloned())
    }

    /// Value stored under `key`, or `default`.
    #[must_use]
    pub fn get_or(&self, key: &str, default: impl Into<ScriptValue>) -> ScriptValue {
        let default = default.into();
        self.read(|store| store.get_or(key, default))
    }

    /// Stores `value` under `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ScriptValue>) {
        self.write(|store| store.set(key, value));
    }

    /// Reports whether `key` holds a value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.read(|store| store.has(key))
    }

    /// Entries below `namespace` with the prefix stripped.
    #[must_use]
    pub fn get_all(&self, namespace: &str) -> BTreeMap<String, ScriptValue> {
        self.read(|store| store.get_all(namespace))
    }
}

impl std::fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandle")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
