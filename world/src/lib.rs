#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative park state: tiles, rides, things, finances and the clock.
//!
//! Lifecycle changes flow through [`apply`], which turns a [`Command`] into
//! [`Event`] values. Game action handlers edit tiles and finances through the
//! mutable accessors on [`World`]; everything else reads through [`query`].

pub mod codec;
mod date;
mod map;
mod park;
mod rides;
mod things;

use parkscript_core::{
    Command, EntityKind, Event, MapSize, RejectionReason, RideId, ScriptError, ThingId,
};
use tracing::{debug, warn};

pub use date::GameDate;
pub use map::{Tile, TileMap, TileMut, DEFAULT_LAND_HEIGHT};
pub use park::{Park, ParkMessage};
pub use rides::{Ride, MAX_RIDES};
pub use things::{PeepAppearance, Thing, MAX_THINGS};

use rides::RideTable;
use things::ThingTable;

/// Starting parameters of a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    /// Dimensions of the initial map.
    pub map_size: MapSize,
    /// Ticks in one in-game day.
    pub ticks_per_day: u32,
    /// Opening cash balance.
    pub initial_cash: i64,
    /// Opening bank loan.
    pub initial_bank_loan: i64,
    /// Largest loan the bank grants.
    pub max_bank_loan: i64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_size: MapSize::new(64, 64),
            ticks_per_day: 528,
            initial_cash: 10_000,
            initial_bank_loan: 10_000,
            max_bank_loan: 20_000,
        }
    }
}

/// Represents the authoritative park world.
#[derive(Clone, Debug)]
pub struct World {
    map: TileMap,
    rides: RideTable,
    things: ThingTable,
    park: Park,
    date: GameDate,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world from explicit starting parameters.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            map: TileMap::new(config.map_size),
            rides: RideTable::default(),
            things: ThingTable::default(),
            park: Park::new(
                config.initial_cash,
                config.initial_bank_loan,
                config.max_bank_loan,
            ),
            date: GameDate::new(config.ticks_per_day),
        }
    }

    /// Mutable access to the tile map.
    pub fn map_mut(&mut self) -> &mut TileMap {
        &mut self.map
    }

    /// Mutable access to park finances and the news feed.
    pub fn park_mut(&mut self) -> &mut Park {
        &mut self.park
    }

    /// Mutable access to a ride. Fails once the ride has been demolished.
    pub fn ride_mut(&mut self, ride: RideId) -> Result<&mut Ride, ScriptError> {
        self.rides
            .get_mut(ride)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Ride, ride.get()))
    }

    /// Mutable access to a thing. Fails once the thing has been removed.
    pub fn thing_mut(&mut self, thing: ThingId) -> Result<&mut Thing, ScriptError> {
        self.things
            .get_mut(thing)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Thing, thing.get()))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureMap { size } => {
            world.map = TileMap::new(size);
            world.rides.clear();
            world.things.clear();
            debug!(target: "world", width = size.x(), height = size.y(), "map configured");
            out_events.push(Event::MapConfigured { size });
        }
        Command::Tick => {
            let day = world.date.advance();
            out_events.push(Event::TickAdvanced {
                tick: world.date.ticks_elapsed(),
            });
            if let Some(day) = day {
                out_events.push(Event::DayElapsed { day });
            }
        }
        Command::BuildRide {
            object,
            ride_type,
            name,
        } => match world.rides.allocate(object, ride_type, name) {
            Some(ride) => out_events.push(Event::RideBuilt { ride }),
            None => out_events.push(Event::CommandRejected {
                reason: RejectionReason::EntityLimit,
            }),
        },
        Command::DemolishRide { ride } => {
            if world.rides.remove(ride).is_none() {
                out_events.push(Event::CommandRejected {
                    reason: RejectionReason::MissingRide(ride),
                });
                return;
            }
            let removed = clear_ride_from_map(&mut world.map, ride);
            debug!(target: "world", ride = ride.get(), removed, "ride demolished");
            out_events.push(Event::RideDemolished { ride });
        }
        Command::SpawnThing { kind, position } => match world.things.spawn(kind, position) {
            Some(thing) => out_events.push(Event::ThingSpawned { thing }),
            None => out_events.push(Event::CommandRejected {
                reason: RejectionReason::EntityLimit,
            }),
        },
        Command::MoveThing { thing, position } => match world.things.get_mut(thing) {
            Some(entry) => {
                entry.move_to(position);
                out_events.push(Event::ThingMoved { thing, position });
            }
            None => out_events.push(Event::CommandRejected {
                reason: RejectionReason::MissingThing(thing),
            }),
        },
        Command::RemoveThing { thing } => match world.things.remove(thing) {
            Some(_) => out_events.push(Event::ThingRemoved { thing }),
            None => out_events.push(Event::CommandRejected {
                reason: RejectionReason::MissingThing(thing),
            }),
        },
    }
}

/// Removes track and entrances of `ride` and detaches its queue paths.
///
/// Tiles that fail to decode are left untouched.
fn clear_ride_from_map(map: &mut TileMap, ride: RideId) -> usize {
    let mut removed = 0;
    for mut tile in map.tiles_mut() {
        let elements = match tile.elements() {
            Ok(elements) => elements,
            Err(error) => {
                warn!(
                    target: "world",
                    x = tile.x(),
                    y = tile.y(),
                    %error,
                    "skipping undecodable tile during ride demolition"
                );
                continue;
            }
        };
        for (index, mut element) in elements.into_iter().enumerate().rev() {
            if element.ride() != Some(ride) {
                continue;
            }
            let outcome = match element.as_footpath_mut() {
                Some(path) => {
                    path.ride_index = None;
                    tile.set_element(index, &element)
                }
                None => {
                    removed += 1;
                    tile.remove_element(index)
                }
            };
            if let Err(error) = outcome {
                warn!(target: "world", %error, "failed to update tile during ride demolition");
            }
        }
    }
    removed
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use parkscript_core::{
        EntityKind, MapSize, RideId, ScriptError, SurfaceElement, ThingId, ThingType,
    };

    use super::{GameDate, Park, Ride, Thing, Tile, TileMap, World};

    /// Dimensions of the map in tiles.
    #[must_use]
    pub fn map_size(world: &World) -> MapSize {
        world.map.size()
    }

    /// Provides read-only access to the tile map.
    #[must_use]
    pub fn map(world: &World) -> &TileMap {
        &world.map
    }

    /// Read handle for the tile at `(x, y)`.
    pub fn tile(world: &World, x: i32, y: i32) -> Result<Tile<'_>, ScriptError> {
        world.map.tile(x, y)
    }

    /// Index and fields of the first surface element on the tile.
    pub fn surface(
        world: &World,
        x: i32,
        y: i32,
    ) -> Result<Option<(usize, SurfaceElement)>, ScriptError> {
        let tile = world.map.tile(x, y)?;
        for index in 0..tile.num_elements() {
            if let Some(surface) = tile.element(index)?.as_surface() {
                return Ok(Some((index, *surface)));
            }
        }
        Ok(None)
    }

    /// Looks up a ride. Fails once the ride has been demolished.
    pub fn ride(world: &World, ride: RideId) -> Result<&Ride, ScriptError> {
        world
            .rides
            .get(ride)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Ride, ride.get()))
    }

    /// Every existing ride ordered by identifier.
    #[must_use]
    pub fn rides(world: &World) -> Vec<&Ride> {
        world.rides.iter().collect()
    }

    /// Looks up a thing. Fails once the thing has been removed.
    pub fn thing(world: &World, thing: ThingId) -> Result<&Thing, ScriptError> {
        world
            .things
            .get(thing)
            .ok_or_else(|| ScriptError::not_found(EntityKind::Thing, thing.get()))
    }

    /// Every existing thing of the given kind ordered by identifier.
    #[must_use]
    pub fn things_of(world: &World, kind: ThingType) -> Vec<&Thing> {
        world
            .things
            .iter()
            .filter(|thing| thing.kind() == kind)
            .collect()
    }

    /// Number of existing things of every kind.
    #[must_use]
    pub fn num_things(world: &World) -> usize {
        world.things.len()
    }

    /// Park finances and the news feed.
    #[must_use]
    pub fn park(world: &World) -> &Park {
        &world.park
    }

    /// In-game clock.
    #[must_use]
    pub fn date(world: &World) -> GameDate {
        world.date
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use parkscript_core::{
        Coord3, ElementPayload, EntranceElement, FootpathElement, RideObject, ThingType,
        TileElement, TrackElement,
    };

    fn build_ride(world: &mut World) -> RideId {
        let mut events = Vec::new();
        apply(
            world,
            Command::BuildRide {
                object: Arc::new(RideObject {
                    identifier: "WMOUSE".to_owned(),
                    name: "Wild Mouse".to_owned(),
                    description: String::new(),
                    capacity: "4 passengers".to_owned(),
                }),
                ride_type: 7,
                name: "Wild Mouse 1".to_owned(),
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::RideBuilt { ride }] => *ride,
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn apply_configures_map() {
        let mut world = World::new();
        let mut events = Vec::new();
        let size = MapSize::new(12, 8);

        apply(&mut world, Command::ConfigureMap { size }, &mut events);

        assert_eq!(query::map_size(&world), size);
        assert_eq!(events, vec![Event::MapConfigured { size }]);
        assert!(query::tile(&world, 11, 7).is_ok());
        assert!(query::tile(&world, 12, 7).is_err());
    }

    #[test]
    fn ticks_report_day_boundaries() {
        let mut world = World::with_config(WorldConfig {
            ticks_per_day: 2,
            ..WorldConfig::default()
        });
        let mut events = Vec::new();
        for _ in 0..4 {
            apply(&mut world, Command::Tick, &mut events);
        }
        assert_eq!(
            events,
            vec![
                Event::TickAdvanced { tick: 1 },
                Event::TickAdvanced { tick: 2 },
                Event::DayElapsed { day: 1 },
                Event::TickAdvanced { tick: 3 },
                Event::TickAdvanced { tick: 4 },
                Event::DayElapsed { day: 2 },
            ]
        );
    }

    #[test]
    fn demolishing_ride_clears_its_elements() {
        let mut world = World::new();
        let ride = build_ride(&mut world);
        {
            let mut tile = world.map_mut().tile_mut(3, 3).expect("in bounds");
            tile.push_element(&TileElement::new(
                14,
                18,
                ElementPayload::Track(TrackElement {
                    track_type: 1,
                    sequence: 0,
                    ride,
                    station: 0,
                    has_chain_lift: false,
                }),
            ));
            tile.push_element(&TileElement::new(
                14,
                18,
                ElementPayload::Entrance(EntranceElement {
                    ride: Some(ride),
                    ..EntranceElement::default()
                }),
            ));
        }
        world
            .map_mut()
            .tile_mut(3, 4)
            .expect("in bounds")
            .push_element(&TileElement::new(
                14,
                16,
                ElementPayload::Footpath(FootpathElement {
                    is_queue: true,
                    ride_index: Some(ride),
                    ..FootpathElement::default()
                }),
            ));

        let mut events = Vec::new();
        apply(&mut world, Command::DemolishRide { ride }, &mut events);

        assert_eq!(events, vec![Event::RideDemolished { ride }]);
        assert_eq!(
            query::ride(&world, ride).err(),
            Some(ScriptError::not_found(EntityKind::Ride, ride.get()))
        );
        assert_eq!(query::tile(&world, 3, 3).expect("tile").num_elements(), 1);
        let queue = query::tile(&world, 3, 4)
            .expect("tile")
            .element(1)
            .expect("decodes");
        assert_eq!(queue.as_footpath().map(|path| path.ride_index), Some(None));
    }

    #[test]
    fn demolishing_missing_ride_is_rejected() {
        let mut world = World::new();
        let mut events = Vec::new();
        let ride = RideId::new(40);
        apply(&mut world, Command::DemolishRide { ride }, &mut events);
        assert_eq!(
            events,
            vec![Event::CommandRejected {
                reason: RejectionReason::MissingRide(ride),
            }]
        );
    }

    #[test]
    fn things_can_be_filtered_by_kind() {
        let mut world = World::new();
        let mut events = Vec::new();
        for kind in [ThingType::Peep, ThingType::Duck, ThingType::Peep] {
            apply(
                &mut world,
                Command::SpawnThing {
                    kind,
                    position: Coord3::from_tile(1, 1, 112),
                },
                &mut events,
            );
        }
        assert_eq!(query::num_things(&world), 3);
        assert_eq!(query::things_of(&world, ThingType::Peep).len(), 2);
        assert!(query::things_of(&world, ThingType::Car).is_empty());

        let duck = ThingId::new(1);
        apply(&mut world, Command::RemoveThing { thing: duck }, &mut events);
        assert!(query::thing(&world, duck).is_err());
        assert!(world.thing_mut(duck).is_err());
    }
}
