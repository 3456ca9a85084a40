use std::collections::{BTreeMap, VecDeque};

use parkscript_core::{
    ActionArgs, ActionStatus, GameActionResult, HookEvent, PlayerId, PluginId, RequestId,
};
use tracing::{debug, error, info, warn};

use crate::{
    transport::{Endpoint, TransportError},
    wire::{ActionRequest, ClientMessage, RequestKind, ServerMessage},
    Callback, Completion, Dispatcher, Role, Shared,
};

struct Pending {
    owner: Option<PluginId>,
    action: String,
    sent_at: u64,
    callback: Callback,
}

pub(crate) struct ClientState {
    endpoint: Endpoint,
    connected: bool,
    player: Option<PlayerId>,
    server_name: Option<String>,
    timeout_ticks: u64,
    clock: u64,
    pending: BTreeMap<RequestId, Pending>,
}

fn disconnected() -> GameActionResult {
    GameActionResult::failure(
        ActionStatus::Disconnected,
        "Disconnected",
        "The connection to the server was lost",
    )
}

impl ClientState {
    /// Opens the session by introducing the player to the server.
    pub(crate) fn connect(endpoint: Endpoint, name: &str, timeout_ticks: u64) -> Self {
        let connected = endpoint
            .send(&ClientMessage::Hello {
                name: name.to_owned(),
            })
            .is_ok();
        Self {
            endpoint,
            connected,
            player: None,
            server_name: None,
            timeout_ticks,
            clock: 0,
            pending: BTreeMap::new(),
        }
    }

    pub(crate) const fn player(&self) -> Option<PlayerId> {
        self.player
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn submit(
        &mut self,
        request: RequestId,
        owner: Option<PluginId>,
        kind: RequestKind,
        action: &str,
        args: ActionArgs,
        callback: Callback,
        completions: &mut VecDeque<Completion>,
    ) {
        if !self.connected {
            completions.push_back(Completion::new(request, owner, disconnected(), callback));
            return;
        }
        let _ = self.pending.insert(
            request,
            Pending {
                owner,
                action: action.to_owned(),
                sent_at: self.clock,
                callback,
            },
        );
        let sent = self.endpoint.send(&ClientMessage::Action(ActionRequest {
            request,
            action: action.to_owned(),
            args,
            kind,
        }));
        if sent.is_err() {
            self.lose_connection(completions);
        }
    }

    pub(crate) fn send_chat(&mut self, message: String) {
        if !self.connected || self.endpoint.send(&ClientMessage::Chat { message }).is_err() {
            warn!(target: "dispatcher", "chat dropped, not connected");
        }
    }

    pub(crate) fn discard_plugin(&mut self, plugin: PluginId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, pending| pending.owner != Some(plugin));
        before - self.pending.len()
    }

    fn receive(&mut self, now: u64) -> Result<Option<ServerMessage>, TransportError> {
        self.clock = now;
        if !self.connected {
            return Ok(None);
        }
        self.endpoint.try_recv()
    }

    /// Resolves every pending request as disconnected.
    fn lose_connection(&mut self, completions: &mut VecDeque<Completion>) {
        self.connected = false;
        for (request, pending) in std::mem::take(&mut self.pending) {
            completions.push_back(Completion::new(
                request,
                pending.owner,
                disconnected(),
                pending.callback,
            ));
        }
    }

    fn resolve(
        &mut self,
        request: RequestId,
        result: GameActionResult,
        completions: &mut VecDeque<Completion>,
    ) {
        match self.pending.remove(&request) {
            Some(pending) => {
                completions.push_back(Completion::new(
                    request,
                    pending.owner,
                    result,
                    pending.callback,
                ));
            }
            None => {
                debug!(target: "dispatcher", request = request.get(), "response to unknown request ignored");
            }
        }
    }

    fn expire(&mut self, now: u64, completions: &mut VecDeque<Completion>) {
        let timeout = self.timeout_ticks;
        let stale: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.saturating_sub(pending.sent_at) >= timeout)
            .map(|(request, _)| *request)
            .collect();
        for request in stale {
            if let Some(pending) = self.pending.remove(&request) {
                warn!(
                    target: "dispatcher",
                    request = request.get(),
                    action = %pending.action,
                    "request timed out"
                );
                completions.push_back(Completion::new(
                    request,
                    pending.owner,
                    GameActionResult::failure(
                        ActionStatus::Timeout,
                        "Timed out",
                        "The server did not answer in time",
                    ),
                    pending.callback,
                ));
            }
        }
    }
}

impl Dispatcher {
    fn with_client<R>(
        &self,
        f: impl FnOnce(&mut ClientState, &mut VecDeque<Completion>) -> R,
    ) -> Option<R> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        match &mut state.role {
            Role::Client(client) => Some(f(client, &mut state.completions)),
            _ => None,
        }
    }

    /// Number of requests sent to the server and not yet answered.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.with_client(|client, _| client.pending.len())
            .unwrap_or(0)
    }

    /// Reports whether the client still has a live connection. Always true
    /// outside client mode.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.with_client(|client, _| client.connected)
            .unwrap_or(true)
    }

    /// Name the server announced in its welcome.
    #[must_use]
    pub fn server_name(&self) -> Option<String> {
        self.with_client(|client, _| client.server_name.clone())
            .flatten()
    }

    pub(crate) fn pump_client(&self, now: u64) {
        let shared = self.shared();
        loop {
            let Some(received) = self.with_client(|client, _| client.receive(now)) else {
                return;
            };
            match received {
                Ok(Some(message)) => self.handle(&shared, message),
                Ok(None) => break,
                Err(TransportError::Disconnected) => {
                    warn!(target: "dispatcher", "connection to server lost");
                    let _ = self.with_client(ClientState::lose_connection);
                    break;
                }
                Err(TransportError::Wire(error)) => {
                    warn!(target: "dispatcher", error = %error, "dropping malformed frame");
                }
            }
        }
        let _ = self.with_client(|client, completions| client.expire(now, completions));
    }

    fn handle(&self, shared: &Shared, message: ServerMessage) {
        match message {
            ServerMessage::Welcome {
                player,
                server_name,
                greeting,
                players,
            } => {
                {
                    let mut permissions = shared.permissions.borrow_mut();
                    for (id, name) in players {
                        let _ = permissions.add_player(id, name);
                    }
                }
                info!(
                    target: "dispatcher",
                    player = player.get(),
                    server = %server_name,
                    greeting = %greeting,
                    "joined server"
                );
                let _ = self.with_client(|client, _| {
                    client.player = Some(player);
                    client.server_name = Some(server_name);
                });
            }
            ServerMessage::Response { request, result } => {
                let _ = self.with_client(|client, completions| {
                    client.resolve(request, result, completions);
                });
            }
            ServerMessage::Replicate {
                player,
                action,
                args,
            } => self.replicate(shared, player, action, &args),
            ServerMessage::Chat { player, message } => {
                let _ = shared.hub.publish(&HookEvent::Chat { player, message });
            }
            ServerMessage::PlayerJoined { player, name } => {
                let _ = shared.permissions.borrow_mut().add_player(player, name);
                let _ = shared.hub.publish(&HookEvent::Join { player });
            }
            ServerMessage::PlayerLeft { player } => {
                let _ = shared.permissions.borrow_mut().remove_player(player);
                let _ = shared.hub.publish(&HookEvent::Leave { player });
            }
            ServerMessage::Kicked { reason } => {
                warn!(target: "dispatcher", reason = %reason, "kicked by server");
                let _ = self.with_client(ClientState::lose_connection);
            }
        }
    }

    /// Applies an action the server already executed. The server checked
    /// permissions, so none are checked here.
    fn replicate(&self, shared: &Shared, player: PlayerId, action: String, args: &ActionArgs) {
        let outcome = match (
            shared.registry.try_borrow_mut(),
            shared.world.try_borrow_mut(),
        ) {
            (Ok(mut registry), Ok(mut world)) => registry.execute(&mut world, &action, args),
            _ => {
                error!(target: "dispatcher", action = %action, "world busy, replicated action lost");
                return;
            }
        };
        match outcome {
            Ok(result) if result.is_success() => {
                shared
                    .permissions
                    .borrow_mut()
                    .record_command(player, result.cost);
                let _ = shared.hub.publish(&HookEvent::Action {
                    player,
                    action,
                    result,
                });
            }
            Ok(result) => {
                error!(
                    target: "dispatcher",
                    action = %action,
                    error = %result.error,
                    "replicated action failed locally, worlds diverged"
                );
            }
            Err(error) => {
                error!(target: "dispatcher", action = %action, error = %error, "cannot replicate action");
            }
        }
    }
}
