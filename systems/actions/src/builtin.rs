//! Actions every host provides regardless of loaded plugins.
//!
//! Tile arguments (`x`, `y`) are tile coordinates; heights (`z`, `height`)
//! are in height units. Each action computes a plan against a shared borrow
//! of the world; the query handler reports the plan and the execute handler
//! recomputes and applies it, so both phases reject identical requests.

use parkscript_core::{
    ActionArgs, ActionStatus, Command, Coord3, ElementPayload, Event, ExpenditureType,
    GameActionResult, PermissionType, RideId, SceneryElement, ScriptError, TileElement,
};
use parkscript_world::{apply, query, World};
use tracing::warn;

use crate::{ActionRegistry, GameActionDesc};

/// Identifier of the small scenery placement action.
pub const SMALL_SCENERY_PLACE: &str = "smallsceneryplace";
/// Identifier of the small scenery removal action.
pub const SMALL_SCENERY_REMOVE: &str = "smallsceneryremove";
/// Identifier of the ride demolition action.
pub const RIDE_DEMOLISH: &str = "ridedemolish";
/// Identifier of the water height action.
pub const WATER_SET: &str = "waterset";
/// Identifier of the bank loan action.
pub const PARK_SET_LOAN: &str = "parksetloan";

/// Price of placing one small scenery item.
pub const SCENERY_PRICE: i64 = 25;
/// Price of removing one small scenery item.
pub const SCENERY_REMOVAL_PRICE: i64 = 5;
/// Refund per track piece when a ride is demolished.
pub const TRACK_PIECE_REFUND: i64 = 40;
/// Price of changing the water height of a tile.
pub const WATER_PRICE: i64 = 70;

/// Game units per height unit.
pub const COORDS_Z_STEP: i32 = 8;

const SCENERY_CLEARANCE: u8 = 4;
const MIN_WATER_HEIGHT: u8 = 2;
const MAX_WATER_HEIGHT: u8 = 254;

/// Registers every built-in action.
pub(crate) fn install(registry: &mut ActionRegistry) {
    let actions = [
        small_scenery_place(),
        small_scenery_remove(),
        ride_demolish(),
        water_set(),
        park_set_loan(),
    ];
    for desc in actions {
        if let Err(error) = registry.register(desc, None) {
            warn!(target: "actions", %error, "built-in action already registered");
        }
    }
}

fn position(x: i32, y: i32, z: u8) -> Coord3 {
    Coord3::from_tile(x, y, i32::from(z) * COORDS_Z_STEP)
}

fn rejected(status: ActionStatus, title: &str, message: &str) -> GameActionResult {
    GameActionResult::failure(status, title, message)
}

fn invalid(error: &ScriptError) -> GameActionResult {
    rejected(
        ActionStatus::InvalidParameters,
        "Invalid parameters",
        &error.to_string(),
    )
}

fn report<P>(
    plan: Result<P, GameActionResult>,
    result: impl FnOnce(&P) -> GameActionResult,
) -> GameActionResult {
    match plan {
        Ok(plan) => result(&plan),
        Err(rejection) => rejection,
    }
}

struct TileTarget {
    x: i32,
    y: i32,
    z: u8,
}

fn tile_target(args: &ActionArgs, height_key: &str) -> Result<TileTarget, ScriptError> {
    Ok(TileTarget {
        x: args.int_as("x")?,
        y: args.int_as("y")?,
        z: args.int_as(height_key)?,
    })
}

fn colour(args: &ActionArgs, key: &str) -> Result<u8, ScriptError> {
    match args.get(key) {
        Some(_) => args.int_as(key),
        None => Ok(0),
    }
}

fn validate_scenery(args: &ActionArgs) -> Result<(), ScriptError> {
    let _ = tile_target(args, "z")?;
    let _: u16 = args.int_as("object")?;
    Ok(())
}

struct SceneryPlacement {
    target: TileTarget,
    scenery: SceneryElement,
}

fn plan_scenery_placement(
    world: &World,
    args: &ActionArgs,
) -> Result<SceneryPlacement, GameActionResult> {
    let target = tile_target(args, "z").map_err(|error| invalid(&error))?;
    let scenery = SceneryElement {
        object: args.int_as("object").map_err(|error| invalid(&error))?,
        primary_colour: colour(args, "primaryColour").map_err(|error| invalid(&error))?,
        secondary_colour: colour(args, "secondaryColour").map_err(|error| invalid(&error))?,
    };

    let tile = query::tile(world, target.x, target.y).map_err(|_| {
        rejected(
            ActionStatus::InvalidParameters,
            "Can't position this here",
            "Off edge of map",
        )
    })?;
    let elements = tile.elements().map_err(|error| invalid(&error))?;
    let Some((land_height, fields)) = elements.iter().find_map(|element| {
        element
            .as_surface()
            .map(|fields| (element.base_z, *fields))
    }) else {
        return Err(rejected(
            ActionStatus::InvalidParameters,
            "Can't position this here",
            "Tile has no land",
        ));
    };
    if !fields.has_ownership() {
        return Err(rejected(
            ActionStatus::NotOwned,
            "Can't position this here",
            "Land not owned by park",
        ));
    }
    if target.z < land_height {
        return Err(rejected(
            ActionStatus::TooLow,
            "Can't position this here",
            "Too low",
        ));
    }
    let Some(clearance) = target.z.checked_add(SCENERY_CLEARANCE) else {
        return Err(rejected(
            ActionStatus::TooHigh,
            "Can't position this here",
            "Too high",
        ));
    };
    for element in elements.iter().filter(|element| element.as_surface().is_none()) {
        if !element.overlaps(target.z, clearance) {
            continue;
        }
        let duplicate = element.base_z == target.z
            && element.as_small_scenery().map(|placed| placed.object) == Some(scenery.object);
        return Err(if duplicate {
            rejected(
                ActionStatus::ItemAlreadyPlaced,
                "Can't position this here",
                "The same item is already here",
            )
        } else {
            rejected(
                ActionStatus::NoClearance,
                "Can't position this here",
                "Something is in the way",
            )
        });
    }

    Ok(SceneryPlacement { target, scenery })
}

fn small_scenery_place() -> GameActionDesc {
    let result = |plan: &SceneryPlacement| {
        GameActionResult::success(
            position(plan.target.x, plan.target.y, plan.target.z),
            SCENERY_PRICE,
            ExpenditureType::Landscaping,
        )
    };
    GameActionDesc::new(
        SMALL_SCENERY_PLACE,
        move |world, args| report(plan_scenery_placement(world, args), result),
        move |world, args| {
            let plan = match plan_scenery_placement(world, args) {
                Ok(plan) => plan,
                Err(rejection) => return rejection,
            };
            let placed = TileElement::new(
                plan.target.z,
                plan.target.z + SCENERY_CLEARANCE,
                ElementPayload::SmallScenery(plan.scenery),
            );
            match world.map_mut().tile_mut(plan.target.x, plan.target.y) {
                Ok(mut tile) => {
                    tile.push_element(&placed);
                    result(&plan)
                }
                Err(error) => invalid(&error),
            }
        },
    )
    .requires(PermissionType::Scenery)
    .validated_by(validate_scenery)
}

struct SceneryRemoval {
    target: TileTarget,
    index: usize,
}

fn plan_scenery_removal(
    world: &World,
    args: &ActionArgs,
) -> Result<SceneryRemoval, GameActionResult> {
    let target = tile_target(args, "z").map_err(|error| invalid(&error))?;
    let object: u16 = args.int_as("object").map_err(|error| invalid(&error))?;
    let tile = query::tile(world, target.x, target.y).map_err(|error| invalid(&error))?;
    let elements = tile.elements().map_err(|error| invalid(&error))?;
    let index = elements
        .iter()
        .position(|element| {
            element.base_z == target.z
                && element.as_small_scenery().map(|placed| placed.object) == Some(object)
        })
        .ok_or_else(|| {
            rejected(
                ActionStatus::InvalidParameters,
                "Can't remove this",
                "No such scenery at that location",
            )
        })?;
    Ok(SceneryRemoval { target, index })
}

fn small_scenery_remove() -> GameActionDesc {
    let result = |plan: &SceneryRemoval| {
        GameActionResult::success(
            position(plan.target.x, plan.target.y, plan.target.z),
            SCENERY_REMOVAL_PRICE,
            ExpenditureType::Landscaping,
        )
    };
    GameActionDesc::new(
        SMALL_SCENERY_REMOVE,
        move |world, args| report(plan_scenery_removal(world, args), result),
        move |world, args| {
            let plan = match plan_scenery_removal(world, args) {
                Ok(plan) => plan,
                Err(rejection) => return rejection,
            };
            let removed = world
                .map_mut()
                .tile_mut(plan.target.x, plan.target.y)
                .and_then(|mut tile| tile.remove_element(plan.index));
            match removed {
                Ok(()) => result(&plan),
                Err(error) => invalid(&error),
            }
        },
    )
    .requires(PermissionType::Scenery)
    .validated_by(validate_scenery)
}

struct Demolition {
    ride: RideId,
    track_pieces: i64,
}

fn plan_demolition(world: &World, args: &ActionArgs) -> Result<Demolition, GameActionResult> {
    let ride = RideId::new(args.int_as("ride").map_err(|error| invalid(&error))?);
    if query::ride(world, ride).is_err() {
        return Err(rejected(
            ActionStatus::InvalidParameters,
            "Can't demolish ride",
            "Ride not found",
        ));
    }
    let track_pieces = query::map(world)
        .tiles()
        .filter_map(|tile| tile.elements().ok())
        .flatten()
        .filter(|element| element.as_track().map(|track| track.ride) == Some(ride))
        .count();
    Ok(Demolition {
        ride,
        track_pieces: i64::try_from(track_pieces).unwrap_or(i64::MAX),
    })
}

fn ride_demolish() -> GameActionDesc {
    let result = |plan: &Demolition| {
        GameActionResult::success(
            Coord3::default(),
            -(plan.track_pieces * TRACK_PIECE_REFUND),
            ExpenditureType::RideConstruction,
        )
    };
    GameActionDesc::new(
        RIDE_DEMOLISH,
        move |world, args| report(plan_demolition(world, args), result),
        move |world, args| {
            let plan = match plan_demolition(world, args) {
                Ok(plan) => plan,
                Err(rejection) => return rejection,
            };
            let mut events = Vec::new();
            apply(world, Command::DemolishRide { ride: plan.ride }, &mut events);
            if events.contains(&Event::RideDemolished { ride: plan.ride }) {
                result(&plan)
            } else {
                rejected(
                    ActionStatus::InvalidParameters,
                    "Can't demolish ride",
                    "Ride not found",
                )
            }
        },
    )
    .requires(PermissionType::RemoveRide)
    .validated_by(|args| args.int_as::<u16>("ride").map(|_| ()))
}

struct WaterChange {
    target: TileTarget,
    surface_index: usize,
    changed: bool,
}

fn plan_water(world: &World, args: &ActionArgs) -> Result<WaterChange, GameActionResult> {
    let target = tile_target(args, "height").map_err(|error| invalid(&error))?;
    if target.z != 0 && target.z < MIN_WATER_HEIGHT {
        return Err(rejected(
            ActionStatus::TooLow,
            "Can't change water level",
            "Too low",
        ));
    }
    if target.z > MAX_WATER_HEIGHT {
        return Err(rejected(
            ActionStatus::TooHigh,
            "Can't change water level",
            "Too high",
        ));
    }
    let (surface_index, surface) = query::surface(world, target.x, target.y)
        .map_err(|error| invalid(&error))?
        .ok_or_else(|| {
            rejected(
                ActionStatus::InvalidParameters,
                "Can't change water level",
                "Tile has no land",
            )
        })?;
    if !surface.has_ownership() {
        return Err(rejected(
            ActionStatus::NotOwned,
            "Can't change water level",
            "Land not owned by park",
        ));
    }
    Ok(WaterChange {
        changed: surface.water_height != target.z,
        target,
        surface_index,
    })
}

fn water_set() -> GameActionDesc {
    let result = |plan: &WaterChange| {
        GameActionResult::success(
            position(plan.target.x, plan.target.y, plan.target.z),
            if plan.changed { WATER_PRICE } else { 0 },
            ExpenditureType::Landscaping,
        )
    };
    GameActionDesc::new(
        WATER_SET,
        move |world, args| report(plan_water(world, args), result),
        move |world, args| {
            let plan = match plan_water(world, args) {
                Ok(plan) => plan,
                Err(rejection) => return rejection,
            };
            let updated = world
                .map_mut()
                .tile_mut(plan.target.x, plan.target.y)
                .and_then(|mut tile| {
                    let mut element = tile.element(plan.surface_index)?;
                    if let Some(surface) = element.as_surface_mut() {
                        surface.water_height = plan.target.z;
                    }
                    tile.set_element(plan.surface_index, &element)
                });
            match updated {
                Ok(()) => result(&plan),
                Err(error) => invalid(&error),
            }
        },
    )
    .requires(PermissionType::SetWaterLevel)
    .validated_by(|args| tile_target(args, "height").map(|_| ()))
}

fn plan_loan(world: &World, args: &ActionArgs) -> Result<i64, GameActionResult> {
    let value = args.int("value").map_err(|error| invalid(&error))?;
    let park = query::park(world);
    if value < 0 {
        return Err(rejected(
            ActionStatus::InvalidParameters,
            "Can't change loan",
            "Loan cannot be negative",
        ));
    }
    if value > park.bank_loan() && value > park.max_bank_loan() {
        return Err(rejected(
            ActionStatus::Disallowed,
            "Can't borrow any more money",
            "Bank refuses to increase loan",
        ));
    }
    if value < park.bank_loan() && park.cash() < park.bank_loan() - value {
        return Err(rejected(
            ActionStatus::InsufficientFunds,
            "Can't pay back loan",
            "Not enough cash available",
        ));
    }
    Ok(value)
}

fn park_set_loan() -> GameActionDesc {
    let result =
        |_: &i64| GameActionResult::success(Coord3::default(), 0, ExpenditureType::Interest);
    GameActionDesc::new(
        PARK_SET_LOAN,
        move |world, args| report(plan_loan(world, args), result),
        move |world, args| {
            let value = match plan_loan(world, args) {
                Ok(value) => value,
                Err(rejection) => return rejection,
            };
            world.park_mut().set_bank_loan(value);
            result(&value)
        },
    )
    .requires(PermissionType::ParkFunding)
    .validated_by(|args| args.int("value").map(|_| ()))
}
