use std::sync::Arc;

use parkscript_core::{
    ActionArgs, Command, ElementPayload, Event, ExpenditureType, RideId, RideObject,
    SurfaceElement, TileElement, TrackElement,
};
use parkscript_system_actions::{
    builtin::{
        PARK_SET_LOAN, RIDE_DEMOLISH, SCENERY_PRICE, SMALL_SCENERY_PLACE, SMALL_SCENERY_REMOVE,
        TRACK_PIECE_REFUND, WATER_PRICE, WATER_SET,
    },
    ActionRegistry,
};
use parkscript_world::{apply, query, World, DEFAULT_LAND_HEIGHT};

fn scenery_args(x: i32, y: i32, z: i32, object: i32) -> ActionArgs {
    ActionArgs::new()
        .with("x", x)
        .with("y", y)
        .with("z", z)
        .with("object", object)
}

fn build_ride_with_track(world: &mut World, pieces: i32) -> RideId {
    let mut events = Vec::new();
    apply(
        world,
        Command::BuildRide {
            object: Arc::new(RideObject {
                identifier: "MGR1".to_owned(),
                name: "Merry-Go-Round".to_owned(),
                description: String::new(),
                capacity: "16 passengers".to_owned(),
            }),
            ride_type: 12,
            name: "Merry-Go-Round 1".to_owned(),
        },
        &mut events,
    );
    let Some(Event::RideBuilt { ride }) = events.pop() else {
        panic!("ride should be built");
    };
    for x in 0..pieces {
        world
            .map_mut()
            .tile_mut(x, 0)
            .expect("in bounds")
            .push_element(&TileElement::new(
                16,
                20,
                ElementPayload::Track(TrackElement {
                    track_type: 0,
                    sequence: 0,
                    ride,
                    station: 0,
                    has_chain_lift: false,
                }),
            ));
    }
    ride
}

#[test]
fn query_predicts_execute_for_every_builtin() {
    let mut world = World::new();
    let mut registry = ActionRegistry::with_builtins();
    let ride = build_ride_with_track(&mut world, 2);
    let land = i32::from(DEFAULT_LAND_HEIGHT);

    let requests = vec![
        (SMALL_SCENERY_PLACE, scenery_args(4, 4, land, 9)),
        (SMALL_SCENERY_PLACE, scenery_args(4, 4, land, 9)),
        (SMALL_SCENERY_PLACE, scenery_args(4, 4, land + 2, 3)),
        (SMALL_SCENERY_PLACE, scenery_args(4, 4, land - 1, 3)),
        (SMALL_SCENERY_PLACE, scenery_args(400, 4, land, 3)),
        (SMALL_SCENERY_REMOVE, scenery_args(4, 4, land, 9)),
        (SMALL_SCENERY_REMOVE, scenery_args(4, 4, land, 9)),
        (WATER_SET, ActionArgs::new().with("x", 1).with("y", 1).with("height", 18)),
        (WATER_SET, ActionArgs::new().with("x", 1).with("y", 1).with("height", 1)),
        (RIDE_DEMOLISH, ActionArgs::new().with("ride", i32::from(ride.get()))),
        (RIDE_DEMOLISH, ActionArgs::new().with("ride", i32::from(ride.get()))),
        (PARK_SET_LOAN, ActionArgs::new().with("value", 15_000)),
        (PARK_SET_LOAN, ActionArgs::new().with("value", 90_000)),
    ];

    for (id, args) in requests {
        let predicted = registry.query(&world, id, &args).expect("known action");
        let actual = registry.execute(&mut world, id, &args).expect("known action");
        assert_eq!(
            predicted.is_success(),
            actual.is_success(),
            "{id} query and execute disagree on success for {args:?}",
        );
        assert_eq!(predicted.cost, actual.cost, "{id} cost differs for {args:?}");
    }
}

#[test]
fn scenery_placement_checks_occupancy_and_charges() {
    let mut world = World::new();
    let mut registry = ActionRegistry::with_builtins();
    let land = i32::from(DEFAULT_LAND_HEIGHT);
    let cash = query::park(&world).cash();

    let placed = registry
        .execute(&mut world, SMALL_SCENERY_PLACE, &scenery_args(2, 3, land, 7))
        .expect("known action");
    assert!(placed.is_success());
    assert_eq!(placed.expenditure_type, ExpenditureType::Landscaping);
    assert_eq!(placed.position.x(), 2 * 32);
    assert_eq!(query::park(&world).cash(), cash - SCENERY_PRICE);

    let again = registry
        .execute(&mut world, SMALL_SCENERY_PLACE, &scenery_args(2, 3, land, 7))
        .expect("known action");
    assert_eq!(again.error, "item_already_placed");

    let blocked = registry
        .execute(&mut world, SMALL_SCENERY_PLACE, &scenery_args(2, 3, land + 1, 8))
        .expect("known action");
    assert_eq!(blocked.error, "no_clearance");

    let tile = query::tile(&world, 2, 3).expect("in bounds");
    assert_eq!(tile.num_elements(), 2, "rejected placements must not touch the tile");
}

#[test]
fn placement_on_unowned_land_is_rejected() {
    let mut world = World::new();
    let mut registry = ActionRegistry::with_builtins();
    world
        .map_mut()
        .tile_mut(5, 5)
        .expect("in bounds")
        .set_element(
            0,
            &TileElement::new(
                DEFAULT_LAND_HEIGHT,
                DEFAULT_LAND_HEIGHT,
                ElementPayload::Surface(SurfaceElement::default()),
            ),
        )
        .expect("surface exists");

    let result = registry
        .execute(
            &mut world,
            SMALL_SCENERY_PLACE,
            &scenery_args(5, 5, i32::from(DEFAULT_LAND_HEIGHT), 1),
        )
        .expect("known action");
    assert_eq!(result.error, "not_owned");
}

#[test]
fn demolition_refunds_track_and_forgets_the_ride() {
    let mut world = World::new();
    let mut registry = ActionRegistry::with_builtins();
    let ride = build_ride_with_track(&mut world, 3);
    let cash = query::park(&world).cash();

    let result = registry
        .execute(
            &mut world,
            RIDE_DEMOLISH,
            &ActionArgs::new().with("ride", i32::from(ride.get())),
        )
        .expect("known action");

    assert!(result.is_success());
    assert_eq!(result.cost, -3 * TRACK_PIECE_REFUND);
    assert_eq!(query::park(&world).cash(), cash + 3 * TRACK_PIECE_REFUND);
    assert!(query::ride(&world, ride).is_err());
    assert_eq!(query::tile(&world, 0, 0).expect("tile").num_elements(), 1);
}

#[test]
fn water_and_loan_update_the_world() {
    let mut world = World::new();
    let mut registry = ActionRegistry::with_builtins();
    let cash = query::park(&world).cash();

    let water = registry
        .execute(
            &mut world,
            WATER_SET,
            &ActionArgs::new().with("x", 0).with("y", 0).with("height", 16),
        )
        .expect("known action");
    assert_eq!(water.cost, WATER_PRICE);
    let surface = query::surface(&world, 0, 0)
        .expect("in bounds")
        .expect("surface");
    assert_eq!(surface.1.water_height, 16);

    let loan = registry
        .execute(&mut world, PARK_SET_LOAN, &ActionArgs::new().with("value", 5_000))
        .expect("known action");
    assert!(loan.is_success());
    assert_eq!(query::park(&world).bank_loan(), 5_000);
    assert_eq!(query::park(&world).cash(), cash - WATER_PRICE - 5_000);

    let unpaid = registry
        .execute(&mut world, PARK_SET_LOAN, &ActionArgs::new().with("value", 0))
        .expect("known action");
    assert_eq!(unpaid.error, "insufficient_funds");

    let refused = registry
        .execute(
            &mut world,
            PARK_SET_LOAN,
            &ActionArgs::new().with("value", 1_000_000),
        )
        .expect("known action");
    assert_eq!(refused.error, "disallowed");
}

#[test]
fn malformed_arguments_fail_validation() {
    let registry = ActionRegistry::with_builtins();
    let desc = registry.get(SMALL_SCENERY_PLACE).expect("registered");
    assert!(desc.validate(&ActionArgs::new().with("x", 1)).is_err());
    assert!(desc
        .validate(&scenery_args(1, 1, 14, 2).with("object", "tree"))
        .is_err());
    assert!(desc.validate(&scenery_args(1, 1, 14, 2)).is_ok());
    assert!(registry.get("fly").is_err());
}
