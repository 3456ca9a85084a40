#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Routing of game action requests.
//!
//! A [`Dispatcher`] runs in one of three roles. In single-player and on the
//! server it checks permissions and runs the action against the shared world
//! immediately. As a client it forwards the request to the server and resolves
//! it when the response arrives. In every role the callback is deferred to the
//! next [`Dispatcher::flush`], so a caller never observes its callback before
//! the request call has returned.
//!
//! Successful executes on the server are replicated to every client. Each peer
//! fires `network.action` for them once its own world has been updated.

mod client;
mod server;
pub mod transport;
pub mod wire;

use std::{
    cell::RefCell,
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

use parkscript_core::{
    ActionArgs, ActionStatus, GameActionResult, HookEvent, NetworkMode, PermissionType, PlayerId,
    PluginId, RequestId, ScriptError,
};
use parkscript_system_actions::ActionRegistry;
use parkscript_system_events::EventHub;
use parkscript_system_permissions::PermissionModel;
use parkscript_world::World;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use client::ClientState;
use server::ServerState;
pub use transport::{loopback, Endpoint, TransportError};
pub use wire::{ActionRequest, ClientMessage, RequestKind, ServerMessage, WireError};

/// State shared by every subsystem of one script host.
#[derive(Clone, Debug)]
pub struct Shared {
    /// The park world.
    pub world: Rc<RefCell<World>>,
    /// Players and groups.
    pub permissions: Rc<RefCell<PermissionModel>>,
    /// Registered game actions.
    pub registry: Rc<RefCell<ActionRegistry>>,
    /// Hook subscriptions.
    pub hub: EventHub,
}

impl Shared {
    /// Wraps the subsystems, creating the event hub last.
    #[must_use]
    pub fn new(world: World, permissions: PermissionModel, registry: ActionRegistry) -> Self {
        let world = Rc::new(RefCell::new(world));
        let permissions = Rc::new(RefCell::new(permissions));
        let registry = Rc::new(RefCell::new(registry));
        Self {
            world,
            permissions,
            registry,
            hub: EventHub::new(),
        }
    }
}

/// Descriptive information a server advertises to joining players.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Longer description.
    pub description: String,
    /// Message shown to players on join.
    pub greeting: String,
    /// Name of the operator.
    pub provider_name: String,
    /// Contact address of the operator.
    pub provider_email: String,
    /// Website of the operator.
    pub provider_website: String,
}

type Callback = Box<dyn FnOnce(&GameActionResult)>;

pub(crate) struct Completion {
    request: RequestId,
    owner: Option<PluginId>,
    result: GameActionResult,
    callback: Callback,
}

impl Completion {
    pub(crate) fn new(
        request: RequestId,
        owner: Option<PluginId>,
        result: GameActionResult,
        callback: Callback,
    ) -> Self {
        Self {
            request,
            owner,
            result,
            callback,
        }
    }
}

enum Role {
    Local { player: PlayerId },
    Server(ServerState),
    Client(ClientState),
}

impl Role {
    const fn mode(&self) -> NetworkMode {
        match self {
            Self::Local { .. } => NetworkMode::None,
            Self::Server(_) => NetworkMode::Server,
            Self::Client(_) => NetworkMode::Client,
        }
    }
}

struct DispatcherState {
    shared: Shared,
    role: Role,
    completions: VecDeque<Completion>,
    next_request: u64,
}

/// Request router for one script host.
///
/// Cloning yields another handle to the same dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    state: Rc<RefCell<DispatcherState>>,
}

impl Dispatcher {
    fn with_role(shared: Shared, role: Role) -> Self {
        Self {
            state: Rc::new(RefCell::new(DispatcherState {
                shared,
                role,
                completions: VecDeque::new(),
                next_request: 1,
            })),
        }
    }

    /// Creates a single-player dispatcher acting for `player`.
    #[must_use]
    pub fn local(shared: Shared, player: PlayerId) -> Self {
        Self::with_role(shared, Role::Local { player })
    }

    /// Creates the authoritative dispatcher of a networked session.
    ///
    /// `host` is the player the server's own scripts act as.
    #[must_use]
    pub fn server(shared: Shared, host: PlayerId, info: ServerInfo) -> Self {
        Self::with_role(shared, Role::Server(ServerState::new(host, info)))
    }

    /// Creates a client connected to a server through `endpoint`.
    ///
    /// Requests unanswered for `timeout_ticks` ticks resolve with a timeout.
    #[must_use]
    pub fn client(shared: Shared, endpoint: Endpoint, name: &str, timeout_ticks: u64) -> Self {
        Self::with_role(
            shared,
            Role::Client(ClientState::connect(endpoint, name, timeout_ticks)),
        )
    }

    /// Network mode of the session.
    #[must_use]
    pub fn mode(&self) -> NetworkMode {
        self.state.borrow().role.mode()
    }

    /// Player this host acts as. A client has none until the server welcomes it.
    #[must_use]
    pub fn local_player(&self) -> Option<PlayerId> {
        match &self.state.borrow().role {
            Role::Local { player } => Some(*player),
            Role::Server(server) => Some(server.host()),
            Role::Client(client) => client.player(),
        }
    }

    /// Subsystems the dispatcher operates on.
    #[must_use]
    pub fn shared(&self) -> Shared {
        self.state.borrow().shared.clone()
    }

    /// Number of results waiting for the next [`Dispatcher::flush`].
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.state.borrow().completions.len()
    }

    /// Predicts the outcome of an action. `callback` receives the result on a
    /// later flush.
    ///
    /// Unknown actions and malformed arguments are returned as errors and the
    /// callback is dropped without being called.
    pub fn query_action<F>(
        &self,
        owner: Option<PluginId>,
        action: &str,
        args: ActionArgs,
        callback: F,
    ) -> Result<RequestId, ScriptError>
    where
        F: FnOnce(&GameActionResult) + 'static,
    {
        self.submit(owner, RequestKind::Query, action, args, Box::new(callback))
    }

    /// Runs an action. `callback` receives the result on a later flush.
    ///
    /// Unknown actions and malformed arguments are returned as errors and the
    /// callback is dropped without being called.
    pub fn execute_action<F>(
        &self,
        owner: Option<PluginId>,
        action: &str,
        args: ActionArgs,
        callback: F,
    ) -> Result<RequestId, ScriptError>
    where
        F: FnOnce(&GameActionResult) + 'static,
    {
        self.submit(owner, RequestKind::Execute, action, args, Box::new(callback))
    }

    fn submit(
        &self,
        owner: Option<PluginId>,
        kind: RequestKind,
        action: &str,
        args: ActionArgs,
        callback: Callback,
    ) -> Result<RequestId, ScriptError> {
        let shared = self.shared();
        validate(&shared, action, &args)?;

        let mut guard = self
            .state
            .try_borrow_mut()
            .map_err(|_| ScriptError::NestedAction)?;
        let state = &mut *guard;
        let request = RequestId::new(state.next_request);
        state.next_request += 1;
        let player = match &mut state.role {
            Role::Local { player } => *player,
            Role::Server(server) => server.host(),
            Role::Client(client) => {
                client.submit(
                    request,
                    owner,
                    kind,
                    action,
                    args,
                    callback,
                    &mut state.completions,
                );
                return Ok(request);
            }
        };
        drop(guard);

        let result = run_authorized(&shared, player, action, &args, kind)?;
        let replicate = kind == RequestKind::Execute && result.is_success();
        {
            let mut state = self.state.borrow_mut();
            if replicate {
                if let Role::Server(server) = &mut state.role {
                    server.broadcast(&ServerMessage::Replicate {
                        player,
                        action: action.to_owned(),
                        args,
                    });
                }
            }
            state
                .completions
                .push_back(Completion::new(request, owner, result.clone(), callback));
        }
        if replicate {
            let _ = shared.hub.publish(&HookEvent::Action {
                player,
                action: action.to_owned(),
                result,
            });
        }
        Ok(request)
    }

    /// Delivers every result that was ready when the flush started and returns
    /// how many callbacks ran.
    ///
    /// Results produced by the callbacks themselves wait for the next flush. A
    /// panicking callback is logged and does not stop the rest.
    pub fn flush(&self) -> usize {
        let batch: Vec<Completion> = self.state.borrow_mut().completions.drain(..).collect();
        let delivered = batch.len();
        for completion in batch {
            let Completion {
                request,
                result,
                callback,
                ..
            } = completion;
            if catch_unwind(AssertUnwindSafe(move || callback(&result))).is_err() {
                warn!(target: "dispatcher", request = request.get(), "action callback panicked");
            }
        }
        delivered
    }

    /// Processes incoming network traffic and expires stale client requests.
    ///
    /// Does nothing in single-player.
    pub fn pump(&self, now_tick: u64) {
        let mode = self.mode();
        match mode {
            NetworkMode::None => {}
            NetworkMode::Server => self.pump_server(),
            NetworkMode::Client => self.pump_client(now_tick),
        }
    }

    /// Drops every pending or ready request made by `plugin` without calling
    /// its callback. Returns how many were dropped.
    pub fn discard_plugin(&self, plugin: PluginId) -> usize {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let before = state.completions.len();
        state
            .completions
            .retain(|completion| completion.owner != Some(plugin));
        let mut discarded = before - state.completions.len();
        if let Role::Client(client) = &mut state.role {
            discarded += client.discard_plugin(plugin);
        }
        if discarded > 0 {
            debug!(target: "dispatcher", plugin = plugin.get(), discarded, "plugin requests discarded");
        }
        discarded
    }

    /// Sends a chat message as the local player.
    ///
    /// The server requires the `chat` permission; a client leaves the check
    /// to the server and fires `network.chat` when the server relays it back.
    pub fn send_chat(&self, message: impl Into<String>) -> Result<(), ScriptError> {
        let message = message.into();
        let shared = self.shared();
        let player = {
            let mut state = self.state.borrow_mut();
            match &mut state.role {
                Role::Local { .. } => {
                    return Err(ScriptError::WrongNetworkMode {
                        expected: "server or client",
                        actual: NetworkMode::None.as_str(),
                    });
                }
                Role::Client(client) => {
                    client.send_chat(message);
                    return Ok(());
                }
                Role::Server(server) => {
                    let host = server.host();
                    shared
                        .permissions
                        .borrow()
                        .require(host, PermissionType::Chat)?;
                    server.broadcast(&ServerMessage::Chat {
                        player: host,
                        message: message.clone(),
                    });
                    host
                }
            }
        };
        let _ = shared.hub.publish(&HookEvent::Chat { player, message });
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Dispatcher")
            .field("mode", &state.role.mode())
            .field("ready", &state.completions.len())
            .finish_non_exhaustive()
    }
}

/// Checks that the action exists and accepts the argument shape.
pub(crate) fn validate(shared: &Shared, action: &str, args: &ActionArgs) -> Result<(), ScriptError> {
    shared
        .registry
        .try_borrow()
        .map_err(|_| ScriptError::NestedAction)?
        .get(action)?
        .validate(args)
}

/// Runs an action for `player` after checking the action's permissions.
pub(crate) fn run_authorized(
    shared: &Shared,
    player: PlayerId,
    action: &str,
    args: &ActionArgs,
    kind: RequestKind,
) -> Result<GameActionResult, ScriptError> {
    let required = shared
        .registry
        .try_borrow()
        .map_err(|_| ScriptError::NestedAction)?
        .get(action)?
        .permissions()
        .to_vec();
    if !shared.permissions.borrow().check(player, &required) {
        debug!(target: "dispatcher", action, player = player.get(), "permission denied");
        return Ok(GameActionResult::failure(
            ActionStatus::Disallowed,
            "Can't do this",
            "Permission denied",
        ));
    }

    let mut registry = shared
        .registry
        .try_borrow_mut()
        .map_err(|_| ScriptError::NestedAction)?;
    let result = match kind {
        RequestKind::Query => {
            let world = shared
                .world
                .try_borrow()
                .map_err(|_| ScriptError::NestedAction)?;
            registry.query(&world, action, args)?
        }
        RequestKind::Execute => {
            let mut world = shared
                .world
                .try_borrow_mut()
                .map_err(|_| ScriptError::NestedAction)?;
            registry.execute(&mut world, action, args)?
        }
    };
    drop(registry);

    if kind == RequestKind::Execute && result.is_success() {
        shared
            .permissions
            .borrow_mut()
            .record_command(player, result.cost);
    }
    debug!(
        target: "dispatcher",
        action,
        player = player.get(),
        kind = ?kind,
        error = %result.error,
        "action handled"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use parkscript_core::HookType;
    use parkscript_system_actions::builtin::{SMALL_SCENERY_PLACE, WATER_SET};
    use parkscript_system_permissions::ADMIN_GROUP;
    use parkscript_world::DEFAULT_LAND_HEIGHT;

    use super::*;

    fn single_player() -> Dispatcher {
        let shared = Shared::new(
            World::new(),
            PermissionModel::new(),
            ActionRegistry::with_builtins(),
        );
        shared
            .permissions
            .borrow_mut()
            .add_player_to_group(PlayerId::new(0), "host", ADMIN_GROUP)
            .expect("admin group exists");
        Dispatcher::local(shared, PlayerId::new(0))
    }

    fn water(height: i32) -> ActionArgs {
        ActionArgs::new()
            .with("x", 2)
            .with("y", 2)
            .with("height", height)
    }

    #[test]
    fn callback_waits_for_flush() {
        let dispatcher = single_player();
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let _ = dispatcher
            .execute_action(None, WATER_SET, water(16), move |result| {
                flag.set(result.is_success());
            })
            .expect("valid request");

        assert!(!called.get(), "callback must not run inside the request call");
        assert_eq!(dispatcher.flush(), 1);
        assert!(called.get());
        assert_eq!(dispatcher.flush(), 0);
    }

    #[test]
    fn validation_errors_are_synchronous() {
        let dispatcher = single_player();
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let error = dispatcher
            .execute_action(None, "teleport", ActionArgs::new(), move |_| flag.set(true))
            .expect_err("unknown action");
        assert_eq!(error, ScriptError::UnknownAction("teleport".to_owned()));

        let flag = called.clone();
        let error = dispatcher
            .query_action(None, WATER_SET, ActionArgs::new().with("x", 1), move |_| {
                flag.set(true)
            })
            .expect_err("missing arguments");
        assert!(matches!(error, ScriptError::InvalidArguments(_)));

        assert_eq!(dispatcher.flush(), 0);
        assert!(!called.get());
    }

    #[test]
    fn requests_made_inside_a_callback_wait_for_the_next_flush() {
        let dispatcher = single_player();
        let inner_done = Rc::new(Cell::new(false));
        let chained = dispatcher.clone();
        let done = inner_done.clone();
        let _ = dispatcher
            .execute_action(None, WATER_SET, water(16), move |_| {
                let _ = chained
                    .execute_action(None, WATER_SET, water(18), move |_| done.set(true))
                    .expect("valid request");
            })
            .expect("valid request");

        assert_eq!(dispatcher.flush(), 1);
        assert!(!inner_done.get());
        assert_eq!(dispatcher.flush(), 1);
        assert!(inner_done.get());
    }

    #[test]
    fn action_hook_fires_only_for_successful_executes() {
        let dispatcher = single_player();
        let shared = dispatcher.shared();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let _token = shared.hub.subscribe(HookType::NetworkAction, None, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        let land = i32::from(DEFAULT_LAND_HEIGHT);
        let args = ActionArgs::new()
            .with("x", 1)
            .with("y", 1)
            .with("z", land)
            .with("object", 4);

        let _ = dispatcher
            .query_action(None, SMALL_SCENERY_PLACE, args.clone(), |_| {})
            .expect("valid");
        let _ = dispatcher
            .execute_action(None, SMALL_SCENERY_PLACE, args.clone(), |_| {})
            .expect("valid");
        let _ = dispatcher
            .execute_action(None, SMALL_SCENERY_PLACE, args, |_| {})
            .expect("valid");

        assert_eq!(seen.get(), 1, "query and rejected execute must not fire");
        assert_eq!(dispatcher.flush(), 3);
    }

    #[test]
    fn chat_needs_a_network_session() {
        let dispatcher = single_player();
        assert!(matches!(
            dispatcher.send_chat("hi"),
            Err(ScriptError::WrongNetworkMode { .. })
        ));
        assert_eq!(dispatcher.mode(), NetworkMode::None);
        assert_eq!(dispatcher.local_player(), Some(PlayerId::new(0)));
    }

    #[test]
    fn discarding_a_plugin_drops_its_ready_results() {
        let dispatcher = single_player();
        let plugin = PluginId::new(3);
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let _ = dispatcher
            .execute_action(Some(plugin), WATER_SET, water(16), move |_| flag.set(true))
            .expect("valid");
        let _ = dispatcher
            .execute_action(None, WATER_SET, water(18), |_| {})
            .expect("valid");

        assert_eq!(dispatcher.discard_plugin(plugin), 1);
        assert_eq!(dispatcher.flush(), 1);
        assert!(!called.get());
    }
}
