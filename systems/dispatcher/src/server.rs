use parkscript_core::{
    ActionStatus, EntityKind, GameActionResult, HookEvent, NetworkMode, PermissionType, PlayerId,
    ScriptError,
};
use parkscript_system_permissions::PermissionModel;
use tracing::{info, warn};

use crate::{
    run_authorized,
    transport::{Endpoint, TransportError},
    validate,
    wire::{ActionRequest, ClientMessage, RequestKind, ServerMessage},
    Dispatcher, Role, ServerInfo, Shared,
};

struct Connection {
    endpoint: Endpoint,
    player: Option<PlayerId>,
    open: bool,
}

pub(crate) struct ServerState {
    host: PlayerId,
    info: ServerInfo,
    connections: Vec<Connection>,
}

impl ServerState {
    pub(crate) fn new(host: PlayerId, info: ServerInfo) -> Self {
        Self {
            host,
            info,
            connections: Vec::new(),
        }
    }

    pub(crate) const fn host(&self) -> PlayerId {
        self.host
    }

    /// Sends `message` to every connection that completed the handshake.
    pub(crate) fn broadcast(&self, message: &ServerMessage) {
        for connection in &self.connections {
            if connection.open && connection.player.is_some() {
                // A failed send surfaces as a disconnect on the next pump.
                let _ = connection.endpoint.send(message);
            }
        }
    }

    fn send_to(&self, index: usize, message: &ServerMessage) {
        if let Some(connection) = self.connections.get(index).filter(|c| c.open) {
            let _ = connection.endpoint.send(message);
        }
    }

    fn receive(&self, index: usize) -> Result<Option<ClientMessage>, TransportError> {
        match self.connections.get(index) {
            Some(connection) if connection.open => connection.endpoint.try_recv(),
            _ => Ok(None),
        }
    }

    fn player_at(&self, index: usize) -> Option<PlayerId> {
        self.connections.get(index).and_then(|c| c.player)
    }

    fn position_of(&self, player: PlayerId) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.open && c.player == Some(player))
    }

    /// Marks the connection closed and returns its player if it had one.
    fn close(&mut self, index: usize) -> Option<PlayerId> {
        let connection = self.connections.get_mut(index)?;
        if !connection.open {
            return None;
        }
        connection.open = false;
        connection.player.take()
    }
}

fn next_free_player(permissions: &PermissionModel) -> Option<PlayerId> {
    (1..=u8::MAX)
        .map(PlayerId::new)
        .find(|id| permissions.player(*id).is_err())
}

impl Dispatcher {
    fn with_server<R>(&self, f: impl FnOnce(&mut ServerState) -> R) -> Option<R> {
        match &mut self.state.borrow_mut().role {
            Role::Server(server) => Some(f(server)),
            _ => None,
        }
    }

    /// Attaches a client connection to the server.
    pub fn accept(&self, endpoint: Endpoint) -> Result<(), ScriptError> {
        let mode = self.mode();
        self.with_server(|server| {
            server.connections.push(Connection {
                endpoint,
                player: None,
                open: true,
            });
        })
        .ok_or(ScriptError::WrongNetworkMode {
            expected: NetworkMode::Server.as_str(),
            actual: mode.as_str(),
        })
    }

    /// Information the server advertises, or `None` when not serving.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        match &self.state.borrow().role {
            Role::Server(server) => Some(server.info.clone()),
            _ => None,
        }
    }

    /// Disconnects `target` on behalf of `by`, who needs `kick_player`.
    pub fn kick_player(&self, by: PlayerId, target: PlayerId) -> Result<(), ScriptError> {
        let shared = self.shared();
        let mode = self.mode();
        let host = self
            .with_server(|server| server.host())
            .ok_or(ScriptError::WrongNetworkMode {
                expected: NetworkMode::Server.as_str(),
                actual: mode.as_str(),
            })?;
        shared
            .permissions
            .borrow()
            .require(by, PermissionType::KickPlayer)?;
        if target == host {
            return Err(ScriptError::InvalidArguments(
                "the host cannot be kicked".to_owned(),
            ));
        }
        let index = self
            .with_server(|server| server.position_of(target))
            .flatten()
            .ok_or_else(|| ScriptError::not_found(EntityKind::Player, target.get()))?;
        let _ = self.with_server(|server| {
            server.send_to(
                index,
                &ServerMessage::Kicked {
                    reason: "kicked by an administrator".to_owned(),
                },
            );
        });
        info!(target: "dispatcher", player = target.get(), by = by.get(), "player kicked");
        self.disconnect(&shared, index);
        Ok(())
    }

    pub(crate) fn pump_server(&self) {
        let shared = self.shared();
        let Some(count) = self.with_server(|server| server.connections.len()) else {
            return;
        };
        for index in 0..count {
            loop {
                let Some(received) = self.with_server(|server| server.receive(index)) else {
                    return;
                };
                match received {
                    Ok(Some(message)) => self.serve(&shared, index, message),
                    Ok(None) => break,
                    Err(TransportError::Disconnected) => {
                        self.disconnect(&shared, index);
                        break;
                    }
                    Err(TransportError::Wire(error)) => {
                        warn!(target: "dispatcher", connection = index, error = %error, "dropping malformed frame");
                    }
                }
            }
        }
        let _ = self.with_server(|server| server.connections.retain(|c| c.open));
    }

    fn serve(&self, shared: &Shared, index: usize, message: ClientMessage) {
        let player = self.with_server(|server| server.player_at(index)).flatten();
        match (message, player) {
            (ClientMessage::Hello { name }, None) => self.welcome(shared, index, name),
            (ClientMessage::Hello { .. }, Some(player)) => {
                warn!(target: "dispatcher", player = player.get(), "repeated handshake ignored");
            }
            (_, None) => {
                warn!(target: "dispatcher", connection = index, "message before handshake ignored");
            }
            (ClientMessage::Action(request), Some(player)) => {
                self.serve_request(shared, index, player, request);
            }
            (ClientMessage::Chat { message }, Some(player)) => {
                if let Err(error) = shared
                    .permissions
                    .borrow()
                    .require(player, PermissionType::Chat)
                {
                    warn!(target: "dispatcher", player = player.get(), error = %error, "chat rejected");
                    return;
                }
                let _ = self.with_server(|server| {
                    server.broadcast(&ServerMessage::Chat {
                        player,
                        message: message.clone(),
                    });
                });
                let _ = shared.hub.publish(&HookEvent::Chat { player, message });
            }
            (ClientMessage::Goodbye, Some(_)) => self.disconnect(shared, index),
        }
    }

    fn welcome(&self, shared: &Shared, index: usize, name: String) {
        let assigned = next_free_player(&shared.permissions.borrow());
        let Some(player) = assigned else {
            warn!(target: "dispatcher", name = %name, "no free player slot");
            let _ = self.with_server(|server| {
                server.send_to(
                    index,
                    &ServerMessage::Kicked {
                        reason: "the server is full".to_owned(),
                    },
                );
                let _ = server.close(index);
            });
            return;
        };

        let roster: Vec<(PlayerId, String)> = shared
            .permissions
            .borrow()
            .players()
            .map(|existing| (existing.id(), existing.name().to_owned()))
            .collect();
        let _ = shared
            .permissions
            .borrow_mut()
            .add_player(player, name.clone());

        let _ = self.with_server(|server| {
            let welcome = ServerMessage::Welcome {
                player,
                server_name: server.info.name.clone(),
                greeting: server.info.greeting.clone(),
                players: roster,
            };
            server.send_to(index, &welcome);
            if let Some(connection) = server.connections.get_mut(index) {
                connection.player = Some(player);
            }
            server.broadcast(&ServerMessage::PlayerJoined {
                player,
                name: name.clone(),
            });
        });
        info!(target: "dispatcher", player = player.get(), name = %name, "player joined");
        let _ = shared.hub.publish(&HookEvent::Join { player });
    }

    fn serve_request(&self, shared: &Shared, index: usize, player: PlayerId, request: ActionRequest) {
        let ActionRequest {
            request,
            action,
            args,
            kind,
        } = request;
        let outcome = validate(shared, &action, &args)
            .and_then(|()| run_authorized(shared, player, &action, &args, kind));
        let result = match outcome {
            Ok(result) => result,
            Err(error) => GameActionResult::failure(
                ActionStatus::InvalidParameters,
                "Invalid request",
                error.to_string(),
            ),
        };

        let replicate = kind == RequestKind::Execute && result.is_success();
        let response = ServerMessage::Response {
            request,
            result: result.clone(),
        };
        let replicated_action = action.clone();
        let _ = self.with_server(move |server| {
            if replicate {
                server.broadcast(&ServerMessage::Replicate {
                    player,
                    action: replicated_action,
                    args,
                });
            }
            server.send_to(index, &response);
        });
        if replicate {
            let _ = shared.hub.publish(&HookEvent::Action {
                player,
                action,
                result,
            });
        }
    }

    fn disconnect(&self, shared: &Shared, index: usize) {
        let Some(player) = self.with_server(|server| server.close(index)).flatten() else {
            return;
        };
        let _ = shared.permissions.borrow_mut().remove_player(player);
        let _ = self.with_server(|server| server.broadcast(&ServerMessage::PlayerLeft { player }));
        info!(target: "dispatcher", player = player.get(), "player left");
        let _ = shared.hub.publish(&HookEvent::Leave { player });
    }
}
