use parkscript_core::{GroupId, PermissionType, PlayerId, ScriptError};
use parkscript_system_permissions::{
    PermissionModel, PlayerGroup, ADMIN_GROUP, SPECTATOR_GROUP, USER_GROUP,
};

#[test]
fn removing_group_moves_members_to_default() {
    let mut model = PermissionModel::new();
    let builders = model
        .add_group("Builders", [PermissionType::Scenery, PermissionType::Path])
        .expect("free id");
    assert_eq!(builders, GroupId::new(3));

    let bob = PlayerId::new(4);
    model
        .add_player_to_group(bob, "bob", builders)
        .expect("group exists");
    assert!(model.check(bob, &[PermissionType::Path]));

    model.remove_group(builders).expect("not default");

    assert_eq!(
        model.player(bob).expect("still known").group(),
        SPECTATOR_GROUP,
        "members of a removed group must fall back to the default group",
    );
    assert!(!model.check(bob, &[PermissionType::Path]));
}

#[test]
fn default_group_cannot_be_removed() {
    let mut model = PermissionModel::new();
    assert_eq!(
        model.remove_group(SPECTATOR_GROUP),
        Err(ScriptError::DefaultGroupRemoval(SPECTATOR_GROUP))
    );
    assert!(model.remove_group(GroupId::new(200)).is_err());
    assert!(model.group(SPECTATOR_GROUP).is_ok());
}

#[test]
fn replacing_groups_keeps_the_default_and_reassigns_orphans() {
    let mut model = PermissionModel::new();
    let carol = PlayerId::new(2);
    model
        .add_player_to_group(carol, "carol", USER_GROUP)
        .expect("user exists");

    let without_default = vec![PlayerGroup::new(ADMIN_GROUP, "Admin", PermissionType::ALL)];
    assert_eq!(
        model.set_groups(without_default),
        Err(ScriptError::DefaultGroupRemoval(SPECTATOR_GROUP))
    );
    assert_eq!(model.groups().count(), 3, "failed replacement must not change groups");

    model
        .set_groups(vec![
            PlayerGroup::new(ADMIN_GROUP, "Owners", PermissionType::ALL),
            PlayerGroup::new(SPECTATOR_GROUP, "Guests", [PermissionType::Chat]),
        ])
        .expect("default survives");

    assert_eq!(model.group(ADMIN_GROUP).expect("kept").name(), "Owners");
    assert_eq!(model.player(carol).expect("known").group(), SPECTATOR_GROUP);
}

#[test]
fn require_reports_the_missing_permission() {
    let mut model = PermissionModel::new();
    let host = PlayerId::new(0);
    model
        .add_player_to_group(host, "host", ADMIN_GROUP)
        .expect("admin exists");
    let guest = PlayerId::new(1);
    let _ = model.add_player(guest, "guest");

    assert_eq!(model.require(host, PermissionType::KickPlayer), Ok(()));
    assert_eq!(
        model.require(guest, PermissionType::KickPlayer),
        Err(ScriptError::PermissionDenied(PermissionType::KickPlayer))
    );
    assert!(model.set_player_group(PlayerId::new(50), USER_GROUP).is_err());
}
