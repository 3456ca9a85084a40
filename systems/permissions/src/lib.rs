#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Player groups and the capability check that gates every game action.
//!
//! A group is a named set of [`PermissionType`] values. Every known player
//! belongs to exactly one existing group; players the model has never seen
//! are treated as members of the default group.

use std::collections::{BTreeMap, BTreeSet};

use parkscript_core::{EntityKind, GroupId, PermissionType, PlayerId, ScriptError};
use tracing::{debug, info};

/// Identifier of the built-in administrator group.
pub const ADMIN_GROUP: GroupId = GroupId::new(0);
/// Identifier of the built-in spectator group.
pub const SPECTATOR_GROUP: GroupId = GroupId::new(1);
/// Identifier of the built-in user group.
pub const USER_GROUP: GroupId = GroupId::new(2);

const USER_EXCLUDED: [PermissionType; 7] = [
    PermissionType::KickPlayer,
    PermissionType::ModifyGroups,
    PermissionType::SetPlayerGroup,
    PermissionType::Cheat,
    PermissionType::PasswordlessLogin,
    PermissionType::ModifyTile,
    PermissionType::EditScenarioOptions,
];

/// Named set of permissions assignable to players.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerGroup {
    id: GroupId,
    name: String,
    permissions: BTreeSet<PermissionType>,
}

impl PlayerGroup {
    /// Creates a group holding the provided permissions.
    #[must_use]
    pub fn new(
        id: GroupId,
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = PermissionType>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Identifier of the group.
    #[must_use]
    pub const fn id(&self) -> GroupId {
        self.id
    }

    /// Display name of the group.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the group.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Permissions granted to members, in declaration order.
    pub fn permissions(&self) -> impl Iterator<Item = PermissionType> + '_ {
        self.permissions.iter().copied()
    }

    /// Replaces the granted permissions.
    pub fn set_permissions(&mut self, permissions: impl IntoIterator<Item = PermissionType>) {
        self.permissions = permissions.into_iter().collect();
    }

    /// Reports whether members hold `permission`.
    #[must_use]
    pub fn has(&self, permission: PermissionType) -> bool {
        self.permissions.contains(&permission)
    }
}

/// A participant of the session and their read-only telemetry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    name: String,
    group: GroupId,
    ping: u32,
    commands_ran: u32,
    money_spent: i64,
}

impl Player {
    /// Identifier of the player.
    #[must_use]
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// Display name of the player.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group the player belongs to.
    #[must_use]
    pub const fn group(&self) -> GroupId {
        self.group
    }

    /// Last measured round trip in milliseconds.
    #[must_use]
    pub const fn ping(&self) -> u32 {
        self.ping
    }

    /// Number of successful actions executed on behalf of the player.
    #[must_use]
    pub const fn commands_ran(&self) -> u32 {
        self.commands_ran
    }

    /// Total cost of the player's successful actions.
    #[must_use]
    pub const fn money_spent(&self) -> i64 {
        self.money_spent
    }
}

/// Registry of groups and players.
#[derive(Clone, Debug)]
pub struct PermissionModel {
    groups: BTreeMap<GroupId, PlayerGroup>,
    players: BTreeMap<PlayerId, Player>,
    default_group: GroupId,
}

impl PermissionModel {
    /// Creates the model with the built-in Admin, Spectator and User groups.
    ///
    /// Spectator is the default group.
    #[must_use]
    pub fn new() -> Self {
        let groups = default_groups()
            .into_iter()
            .map(|group| (group.id(), group))
            .collect();
        Self {
            groups,
            players: BTreeMap::new(),
            default_group: SPECTATOR_GROUP,
        }
    }

    /// Group assigned to new and unknown players.
    #[must_use]
    pub const fn default_group(&self) -> GroupId {
        self.default_group
    }

    /// Changes the default group.
    pub fn set_default_group(&mut self, group: GroupId) -> Result<(), ScriptError> {
        let _ = self.group(group)?;
        self.default_group = group;
        Ok(())
    }

    /// Looks up a group.
    pub fn group(&self, group: GroupId) -> Result<&PlayerGroup, ScriptError> {
        self.groups
            .get(&group)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Group, group.get()))
    }

    /// Looks up a group for editing.
    pub fn group_mut(&mut self, group: GroupId) -> Result<&mut PlayerGroup, ScriptError> {
        self.groups
            .get_mut(&group)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Group, group.get()))
    }

    /// Every group ordered by identifier.
    pub fn groups(&self) -> impl Iterator<Item = &PlayerGroup> {
        self.groups.values()
    }

    /// Creates a group under the lowest free identifier.
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = PermissionType>,
    ) -> Result<GroupId, ScriptError> {
        let id = (0..=u8::MAX)
            .map(GroupId::new)
            .find(|candidate| !self.groups.contains_key(candidate))
            .ok_or_else(|| ScriptError::InvalidArguments("group table is full".to_owned()))?;
        let group = PlayerGroup::new(id, name, permissions);
        info!(target: "permissions", group = id.get(), name = group.name(), "group added");
        let _ = self.groups.insert(id, group);
        Ok(id)
    }

    /// Removes a group, moving its members to the default group.
    pub fn remove_group(&mut self, group: GroupId) -> Result<(), ScriptError> {
        if group == self.default_group {
            return Err(ScriptError::DefaultGroupRemoval(group));
        }
        if self.groups.remove(&group).is_none() {
            return Err(ScriptError::not_found(EntityKind::Group, group.get()));
        }
        self.reassign_orphans();
        info!(target: "permissions", group = group.get(), "group removed");
        Ok(())
    }

    /// Replaces every group at once.
    ///
    /// The default group must survive the replacement. Members of groups that
    /// disappear move to the default group.
    pub fn set_groups(
        &mut self,
        groups: impl IntoIterator<Item = PlayerGroup>,
    ) -> Result<(), ScriptError> {
        let groups: BTreeMap<GroupId, PlayerGroup> = groups
            .into_iter()
            .map(|group| (group.id(), group))
            .collect();
        if !groups.contains_key(&self.default_group) {
            return Err(ScriptError::DefaultGroupRemoval(self.default_group));
        }
        self.groups = groups;
        self.reassign_orphans();
        Ok(())
    }

    /// Registers a player in the default group. Re-adding renames the player.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>) -> &Player {
        let default_group = self.default_group;
        let name = name.into();
        let player = self.players.entry(id).or_insert_with(|| Player {
            id,
            name: String::new(),
            group: default_group,
            ping: 0,
            commands_ran: 0,
            money_spent: 0,
        });
        player.name = name;
        player
    }

    /// Registers a player directly into `group`.
    pub fn add_player_to_group(
        &mut self,
        id: PlayerId,
        name: impl Into<String>,
        group: GroupId,
    ) -> Result<(), ScriptError> {
        let _ = self.group(group)?;
        let _ = self.add_player(id, name);
        self.set_player_group(id, group)
    }

    /// Forgets a player.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Player, ScriptError> {
        self.players
            .remove(&id)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Player, id.get()))
    }

    /// Looks up a player.
    pub fn player(&self, id: PlayerId) -> Result<&Player, ScriptError> {
        self.players
            .get(&id)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Player, id.get()))
    }

    /// Every player ordered by identifier.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Moves a player to another existing group.
    pub fn set_player_group(&mut self, id: PlayerId, group: GroupId) -> Result<(), ScriptError> {
        let _ = self.group(group)?;
        let player = self
            .players
            .get_mut(&id)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Player, id.get()))?;
        player.group = group;
        debug!(target: "permissions", player = id.get(), group = group.get(), "player group changed");
        Ok(())
    }

    /// Group the player belongs to, falling back to the default group.
    #[must_use]
    pub fn group_of(&self, id: PlayerId) -> GroupId {
        self.players
            .get(&id)
            .map_or(self.default_group, |player| player.group)
    }

    /// Reports whether `group` may run an action requiring `required`.
    ///
    /// An empty requirement always passes; otherwise holding any one of the
    /// listed permissions is enough. Unknown groups are denied.
    #[must_use]
    pub fn permits(&self, group: GroupId, required: &[PermissionType]) -> bool {
        if required.is_empty() {
            return true;
        }
        self.groups
            .get(&group)
            .is_some_and(|group| required.iter().any(|permission| group.has(*permission)))
    }

    /// Reports whether `player` may run an action requiring `required`.
    #[must_use]
    pub fn check(&self, player: PlayerId, required: &[PermissionType]) -> bool {
        self.permits(self.group_of(player), required)
    }

    /// Fails with [`ScriptError::PermissionDenied`] unless `player` holds `permission`.
    pub fn require(&self, player: PlayerId, permission: PermissionType) -> Result<(), ScriptError> {
        if self.check(player, &[permission]) {
            Ok(())
        } else {
            Err(ScriptError::PermissionDenied(permission))
        }
    }

    /// Records a successful action for the player's telemetry.
    pub fn record_command(&mut self, id: PlayerId, cost: i64) {
        if let Some(player) = self.players.get_mut(&id) {
            player.commands_ran = player.commands_ran.saturating_add(1);
            player.money_spent = player.money_spent.saturating_add(cost);
        }
    }

    /// Stores the latest measured round trip of a player.
    pub fn set_ping(&mut self, id: PlayerId, ping: u32) {
        if let Some(player) = self.players.get_mut(&id) {
            player.ping = ping;
        }
    }

    fn reassign_orphans(&mut self) {
        let default_group = self.default_group;
        for player in self.players.values_mut() {
            if !self.groups.contains_key(&player.group) {
                debug!(
                    target: "permissions",
                    player = player.id.get(),
                    from = player.group.get(),
                    "moving player to default group"
                );
                player.group = default_group;
            }
        }
    }
}

impl Default for PermissionModel {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in Admin, Spectator and User groups.
#[must_use]
pub fn default_groups() -> Vec<PlayerGroup> {
    vec![
        PlayerGroup::new(ADMIN_GROUP, "Admin", PermissionType::ALL),
        PlayerGroup::new(SPECTATOR_GROUP, "Spectator", [PermissionType::Chat]),
        PlayerGroup::new(
            USER_GROUP,
            "User",
            PermissionType::ALL
                .into_iter()
                .filter(|permission| !USER_EXCLUDED.contains(permission)),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_groups_have_expected_permissions() {
        let model = PermissionModel::new();
        let admin = model.group(ADMIN_GROUP).expect("admin");
        assert_eq!(admin.permissions().count(), PermissionType::ALL.len());

        let spectator = model.group(SPECTATOR_GROUP).expect("spectator");
        assert_eq!(
            spectator.permissions().collect::<Vec<_>>(),
            vec![PermissionType::Chat]
        );

        let user = model.group(USER_GROUP).expect("user");
        assert!(user.has(PermissionType::Scenery));
        assert!(!user.has(PermissionType::KickPlayer));
        assert_eq!(user.permissions().count(), PermissionType::ALL.len() - 7);
    }

    #[test]
    fn empty_requirement_always_passes() {
        let model = PermissionModel::new();
        assert!(model.permits(SPECTATOR_GROUP, &[]));
        assert!(model.permits(GroupId::new(99), &[]));
    }

    #[test]
    fn any_listed_permission_is_enough() {
        let model = PermissionModel::new();
        let required = [PermissionType::Scenery, PermissionType::Chat];
        assert!(model.permits(SPECTATOR_GROUP, &required));
        assert!(!model.permits(SPECTATOR_GROUP, &[PermissionType::Scenery]));
        assert!(!model.permits(GroupId::new(99), &required));
    }

    #[test]
    fn unknown_players_use_the_default_group() {
        let mut model = PermissionModel::new();
        let stranger = PlayerId::new(42);
        assert_eq!(model.group_of(stranger), SPECTATOR_GROUP);
        assert!(!model.check(stranger, &[PermissionType::Scenery]));

        model.set_default_group(USER_GROUP).expect("user exists");
        assert!(model.check(stranger, &[PermissionType::Scenery]));
        assert!(model.set_default_group(GroupId::new(77)).is_err());
    }

    #[test]
    fn telemetry_is_recorded_for_known_players() {
        let mut model = PermissionModel::new();
        let _ = model.add_player(PlayerId::new(1), "alice");
        model.record_command(PlayerId::new(1), 250);
        model.record_command(PlayerId::new(1), -50);
        model.set_ping(PlayerId::new(1), 33);
        model.record_command(PlayerId::new(9), 10);

        let player = model.player(PlayerId::new(1)).expect("known");
        assert_eq!(player.commands_ran(), 2);
        assert_eq!(player.money_spent(), 200);
        assert_eq!(player.ping(), 33);
    }
}
