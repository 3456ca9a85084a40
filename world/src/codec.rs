//! Fixed-size binary layout of tile elements.
//!
//! Every element occupies [`ELEMENT_SIZE`] bytes: the type tag, a reserved
//! flag byte, base and clearance heights, followed by a per-tag payload.
//! Multi-byte fields are little endian. An all-zero element decodes to a flat
//! surface so freshly inserted elements are always well-formed.

use parkscript_core::{
    ElementPayload, EntranceElement, FootpathAddition, FootpathAdditionStatus, FootpathElement,
    RideId, SceneryElement, ScriptError, SurfaceElement, TileElement, TileElementType,
    TrackElement, WallElement,
};

/// Number of bytes occupied by one encoded element.
pub const ELEMENT_SIZE: usize = 16;

const NO_RIDE: u16 = 0xFFFF;

const TAG: usize = 0;
const BASE_Z: usize = 2;
const CLEARANCE_Z: usize = 3;
const PAYLOAD: usize = 4;

const FOOTPATH_SLOPED: u8 = 1 << 0;
const FOOTPATH_QUEUE: u8 = 1 << 1;
const FOOTPATH_HAS_ADDITION: u8 = 1 << 2;
const FOOTPATH_ADDITION_BROKEN: u8 = 1 << 3;
const TRACK_CHAIN_LIFT: u8 = 1 << 0;

/// Encodes a typed element into its binary representation.
#[must_use]
pub fn encode(element: &TileElement) -> [u8; ELEMENT_SIZE] {
    let mut raw = [0_u8; ELEMENT_SIZE];
    raw[TAG] = element.element_type().tag();
    raw[BASE_Z] = element.base_z;
    raw[CLEARANCE_Z] = element.clearance_z;

    let payload = &mut raw[PAYLOAD..];
    match &element.payload {
        ElementPayload::Surface(surface) => {
            payload[0] = surface.slope;
            payload[1] = surface.surface_style;
            payload[2] = surface.edge_style;
            payload[3] = surface.water_height;
            payload[4] = surface.grass_length;
            payload[5] = surface.ownership;
            payload[6] = surface.park_fences;
        }
        ElementPayload::Footpath(footpath) => {
            let mut flags = 0;
            if footpath.is_sloped {
                flags |= FOOTPATH_SLOPED;
            }
            if footpath.is_queue {
                flags |= FOOTPATH_QUEUE;
            }
            payload[0] = footpath.footpath_type;
            payload[2] = footpath.edges;
            payload[3] = footpath.corners;
            write_u16(payload, 4, ride_or_none(footpath.ride_index));
            if let Some(addition) = footpath.addition {
                flags |= FOOTPATH_HAS_ADDITION;
                if addition.is_broken {
                    flags |= FOOTPATH_ADDITION_BROKEN;
                }
                payload[6] = addition.object;
                payload[7] = addition.status.north;
                payload[8] = addition.status.east;
                payload[9] = addition.status.south;
                payload[10] = addition.status.west;
            }
            payload[1] = flags;
        }
        ElementPayload::Track(track) => {
            write_u16(payload, 0, track.track_type);
            payload[2] = track.sequence;
            write_u16(payload, 3, track.ride.get());
            payload[5] = track.station;
            payload[6] = if track.has_chain_lift { TRACK_CHAIN_LIFT } else { 0 };
        }
        ElementPayload::SmallScenery(scenery) | ElementPayload::LargeScenery(scenery) => {
            write_u16(payload, 0, scenery.object);
            payload[2] = scenery.primary_colour;
            payload[3] = scenery.secondary_colour;
        }
        ElementPayload::Entrance(entrance) => {
            write_u16(payload, 0, entrance.object);
            payload[2] = entrance.sequence;
            write_u16(payload, 3, ride_or_none(entrance.ride));
            payload[5] = entrance.station;
        }
        ElementPayload::Wall(wall) => {
            write_u16(payload, 0, wall.object);
        }
        ElementPayload::Banner | ElementPayload::Corrupt => {}
    }

    raw
}

/// Decodes the element stored at `index` from its binary representation.
///
/// Fails with [`ScriptError::InvalidElementTag`] when the tag byte does not
/// name a known element type.
pub fn decode(index: usize, raw: &[u8; ELEMENT_SIZE]) -> Result<TileElement, ScriptError> {
    let tag = raw[TAG];
    let element_type =
        TileElementType::from_tag(tag).ok_or(ScriptError::InvalidElementTag { index, tag })?;
    let payload = &raw[PAYLOAD..];

    let decoded = match element_type {
        TileElementType::Surface => ElementPayload::Surface(SurfaceElement {
            slope: payload[0],
            surface_style: payload[1],
            edge_style: payload[2],
            water_height: payload[3],
            grass_length: payload[4],
            ownership: payload[5],
            park_fences: payload[6],
        }),
        TileElementType::Footpath => {
            let flags = payload[1];
            let addition = (flags & FOOTPATH_HAS_ADDITION != 0).then(|| FootpathAddition {
                object: payload[6],
                is_broken: flags & FOOTPATH_ADDITION_BROKEN != 0,
                status: FootpathAdditionStatus {
                    north: payload[7],
                    east: payload[8],
                    south: payload[9],
                    west: payload[10],
                },
            });
            ElementPayload::Footpath(FootpathElement {
                footpath_type: payload[0],
                is_sloped: flags & FOOTPATH_SLOPED != 0,
                is_queue: flags & FOOTPATH_QUEUE != 0,
                edges: payload[2],
                corners: payload[3],
                ride_index: optional_ride(read_u16(payload, 4)),
                addition,
            })
        }
        TileElementType::Track => ElementPayload::Track(TrackElement {
            track_type: read_u16(payload, 0),
            sequence: payload[2],
            ride: RideId::new(read_u16(payload, 3)),
            station: payload[5],
            has_chain_lift: payload[6] & TRACK_CHAIN_LIFT != 0,
        }),
        TileElementType::SmallScenery => ElementPayload::SmallScenery(read_scenery(payload)),
        TileElementType::LargeScenery => ElementPayload::LargeScenery(read_scenery(payload)),
        TileElementType::Entrance => ElementPayload::Entrance(EntranceElement {
            object: read_u16(payload, 0),
            sequence: payload[2],
            ride: optional_ride(read_u16(payload, 3)),
            station: payload[5],
        }),
        TileElementType::Wall => ElementPayload::Wall(WallElement {
            object: read_u16(payload, 0),
        }),
        TileElementType::Banner => ElementPayload::Banner,
        TileElementType::Corrupt => ElementPayload::Corrupt,
    };

    Ok(TileElement::new(raw[BASE_Z], raw[CLEARANCE_Z], decoded))
}

fn read_scenery(payload: &[u8]) -> SceneryElement {
    SceneryElement {
        object: read_u16(payload, 0),
        primary_colour: payload[2],
        secondary_colour: payload[3],
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn write_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn ride_or_none(ride: Option<RideId>) -> u16 {
    ride.map_or(NO_RIDE, |ride| ride.get())
}

fn optional_ride(raw: u16) -> Option<RideId> {
    (raw != NO_RIDE).then(|| RideId::new(raw))
}
