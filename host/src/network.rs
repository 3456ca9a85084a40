use parkscript_core::{GroupId, NetworkMode, PermissionType, PlayerId, ScriptError};
use parkscript_system_dispatcher::{Dispatcher, ServerInfo, Shared};
use parkscript_system_permissions::{Player, PlayerGroup};

/// Players, groups and chat of the current session.
///
/// Group and player changes are only accepted where the permission model is
/// authoritative, that is in single-player and on the server.
#[derive(Clone, Debug)]
pub struct NetworkHandle {
    shared: Shared,
    dispatcher: Dispatcher,
}

impl NetworkHandle {
    pub(crate) fn new(shared: Shared, dispatcher: Dispatcher) -> Self {
        Self { shared, dispatcher }
    }

    fn authorize(&self, permission: PermissionType) -> Result<(), ScriptError> {
        let mode = self.dispatcher.mode();
        let acting = self
            .dispatcher
            .local_player()
            .filter(|_| mode != NetworkMode::Client)
            .ok_or(ScriptError::WrongNetworkMode {
                expected: "none or server",
                actual: mode.as_str(),
            })?;
        self.shared.permissions.borrow().require(acting, permission)
    }

    /// Network mode of the session.
    #[must_use]
    pub fn mode(&self) -> NetworkMode {
        self.dispatcher.mode()
    }

    /// Player this host acts as.
    #[must_use]
    pub fn current_player(&self) -> Option<PlayerId> {
        self.dispatcher.local_player()
    }

    /// Number of players in the session.
    #[must_use]
    pub fn num_players(&self) -> usize {
        self.shared.permissions.borrow().players().count()
    }

    /// Every player ordered by identifier.
    #[must_use]
    pub fn players(&self) -> Vec<Player> {
        self.shared.permissions.borrow().players().cloned().collect()
    }

    /// Looks up a player.
    pub fn player(&self, id: PlayerId) -> Result<Player, ScriptError> {
        self.shared.permissions.borrow().player(id).cloned()
    }

    /// Every group ordered by identifier.
    #[must_use]
    pub fn groups(&self) -> Vec<PlayerGroup> {
        self.shared.permissions.borrow().groups().cloned().collect()
    }

    /// Looks up a group.
    pub fn group(&self, id: GroupId) -> Result<PlayerGroup, ScriptError> {
        self.shared.permissions.borrow().group(id).cloned()
    }

    /// Group assigned to joining players.
    #[must_use]
    pub fn default_group(&self) -> GroupId {
        self.shared.permissions.borrow().default_group()
    }

    /// Changes the default group. Requires `modify_groups`.
    pub fn set_default_group(&self, group: GroupId) -> Result<(), ScriptError> {
        self.authorize(PermissionType::ModifyGroups)?;
        self.shared.permissions.borrow_mut().set_default_group(group)
    }

    /// Creates a group. Requires `modify_groups`.
    pub fn add_group(
        &self,
        name: &str,
        permissions: &[PermissionType],
    ) -> Result<GroupId, ScriptError> {
        self.authorize(PermissionType::ModifyGroups)?;
        self.shared
            .permissions
            .borrow_mut()
            .add_group(name, permissions.iter().copied())
    }

    /// Deletes a group; its players move to the default group. Requires
    /// `modify_groups`.
    pub fn remove_group(&self, group: GroupId) -> Result<(), ScriptError> {
        self.authorize(PermissionType::ModifyGroups)?;
        self.shared.permissions.borrow_mut().remove_group(group)
    }

    /// Replaces every group. Requires `modify_groups`.
    pub fn set_groups(&self, groups: Vec<PlayerGroup>) -> Result<(), ScriptError> {
        self.authorize(PermissionType::ModifyGroups)?;
        self.shared.permissions.borrow_mut().set_groups(groups)
    }

    /// Moves a player to another group. Requires `set_player_group`.
    pub fn set_player_group(&self, player: PlayerId, group: GroupId) -> Result<(), ScriptError> {
        self.authorize(PermissionType::SetPlayerGroup)?;
        self.shared
            .permissions
            .borrow_mut()
            .set_player_group(player, group)
    }

    /// Information the server advertises, when serving.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.dispatcher.server_info()
    }

    /// Sends a chat message as the local player.
    pub fn send_message(&self, message: &str) -> Result<(), ScriptError> {
        self.dispatcher.send_chat(message)
    }

    /// Disconnects a player. Requires `kick_player` and a server session.
    pub fn kick_player(&self, player: PlayerId) -> Result<(), ScriptError> {
        let acting = self
            .dispatcher
            .local_player()
            .ok_or(ScriptError::WrongNetworkMode {
                expected: NetworkMode::Server.as_str(),
                actual: self.dispatcher.mode().as_str(),
            })?;
        self.dispatcher.kick_player(acting, player)
    }
}
