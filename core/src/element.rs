//! Typed tile element variants.

use serde::{Deserialize, Serialize};

use crate::RideId;

/// Ownership flag: the park owns construction rights above the tile.
pub const OWNERSHIP_CONSTRUCTION_RIGHTS_OWNED: u8 = 1 << 4;
/// Ownership flag: the park owns the land.
pub const OWNERSHIP_OWNED: u8 = 1 << 5;
/// Ownership flag: construction rights can be purchased.
pub const OWNERSHIP_CONSTRUCTION_RIGHTS_AVAILABLE: u8 = 1 << 6;
/// Ownership flag: the land can be purchased.
pub const OWNERSHIP_AVAILABLE: u8 = 1 << 7;

/// Closed set of tile element type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileElementType {
    /// Terrain surface.
    Surface,
    /// Footpath or queue line.
    Footpath,
    /// Piece of ride track.
    Track,
    /// Single-tile scenery item.
    SmallScenery,
    /// Ride entrance or exit, or park entrance.
    Entrance,
    /// Wall or fence.
    Wall,
    /// Piece of a multi-tile scenery item.
    LargeScenery,
    /// Banner.
    Banner,
    /// Defect placeholder with no payload.
    Corrupt,
}

impl TileElementType {
    /// Binary tag stored in the first byte of an encoded element.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Surface => 0,
            Self::Footpath => 1,
            Self::Track => 2,
            Self::SmallScenery => 3,
            Self::Entrance => 4,
            Self::Wall => 5,
            Self::LargeScenery => 6,
            Self::Banner => 7,
            Self::Corrupt => 8,
        }
    }

    /// Resolves a binary tag, returning `None` for unknown values.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Surface),
            1 => Some(Self::Footpath),
            2 => Some(Self::Track),
            3 => Some(Self::SmallScenery),
            4 => Some(Self::Entrance),
            5 => Some(Self::Wall),
            6 => Some(Self::LargeScenery),
            7 => Some(Self::Banner),
            8 => Some(Self::Corrupt),
            _ => None,
        }
    }

    /// Script-facing name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Surface => "surface",
            Self::Footpath => "footpath",
            Self::Track => "track",
            Self::SmallScenery => "small_scenery",
            Self::Entrance => "entrance",
            Self::Wall => "wall",
            Self::LargeScenery => "large_scenery",
            Self::Banner => "banner",
            Self::Corrupt => "corrupt",
        }
    }
}

/// One structural or decorative item occupying a tile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileElement {
    /// Height of the bottom of the element in height units.
    pub base_z: u8,
    /// Height of the top of the element in height units.
    pub clearance_z: u8,
    /// Variant-specific fields.
    pub payload: ElementPayload,
}

impl TileElement {
    /// Creates a new element.
    #[must_use]
    pub const fn new(base_z: u8, clearance_z: u8, payload: ElementPayload) -> Self {
        Self {
            base_z,
            clearance_z,
            payload,
        }
    }

    /// Type tag of the element.
    #[must_use]
    pub const fn element_type(&self) -> TileElementType {
        self.payload.element_type()
    }

    /// Reports whether the vertical span of the element overlaps `[base_z, clearance_z)`.
    #[must_use]
    pub fn overlaps(&self, base_z: u8, clearance_z: u8) -> bool {
        self.base_z < clearance_z && base_z < self.clearance_z
    }

    /// Surface payload, if this is a surface element.
    #[must_use]
    pub fn as_surface(&self) -> Option<&SurfaceElement> {
        match &self.payload {
            ElementPayload::Surface(surface) => Some(surface),
            _ => None,
        }
    }

    /// Mutable surface payload, if this is a surface element.
    pub fn as_surface_mut(&mut self) -> Option<&mut SurfaceElement> {
        match &mut self.payload {
            ElementPayload::Surface(surface) => Some(surface),
            _ => None,
        }
    }

    /// Footpath payload, if this is a footpath element.
    #[must_use]
    pub fn as_footpath(&self) -> Option<&FootpathElement> {
        match &self.payload {
            ElementPayload::Footpath(footpath) => Some(footpath),
            _ => None,
        }
    }

    /// Mutable footpath payload, if this is a footpath element.
    pub fn as_footpath_mut(&mut self) -> Option<&mut FootpathElement> {
        match &mut self.payload {
            ElementPayload::Footpath(footpath) => Some(footpath),
            _ => None,
        }
    }

    /// Track payload, if this is a track element.
    #[must_use]
    pub fn as_track(&self) -> Option<&TrackElement> {
        match &self.payload {
            ElementPayload::Track(track) => Some(track),
            _ => None,
        }
    }

    /// Small scenery payload, if this is a small scenery element.
    #[must_use]
    pub fn as_small_scenery(&self) -> Option<&SceneryElement> {
        match &self.payload {
            ElementPayload::SmallScenery(scenery) => Some(scenery),
            _ => None,
        }
    }

    /// Entrance payload, if this is an entrance element.
    #[must_use]
    pub fn as_entrance(&self) -> Option<&EntranceElement> {
        match &self.payload {
            ElementPayload::Entrance(entrance) => Some(entrance),
            _ => None,
        }
    }

    /// Wall payload, if this is a wall element.
    #[must_use]
    pub fn as_wall(&self) -> Option<&WallElement> {
        match &self.payload {
            ElementPayload::Wall(wall) => Some(wall),
            _ => None,
        }
    }

    /// Large scenery payload, if this is a large scenery element.
    #[must_use]
    pub fn as_large_scenery(&self) -> Option<&SceneryElement> {
        match &self.payload {
            ElementPayload::LargeScenery(scenery) => Some(scenery),
            _ => None,
        }
    }

    /// Ride that owns this element, for track and ride entrance elements.
    #[must_use]
    pub fn ride(&self) -> Option<RideId> {
        match &self.payload {
            ElementPayload::Track(track) => Some(track.ride),
            ElementPayload::Entrance(entrance) => entrance.ride,
            ElementPayload::Footpath(footpath) => footpath.ride_index,
            _ => None,
        }
    }
}

/// Variant-specific fields of a tile element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementPayload {
    /// Terrain surface.
    Surface(SurfaceElement),
    /// Footpath or queue line.
    Footpath(FootpathElement),
    /// Ride track.
    Track(TrackElement),
    /// Single-tile scenery.
    SmallScenery(SceneryElement),
    /// Entrance or exit.
    Entrance(EntranceElement),
    /// Wall or fence.
    Wall(WallElement),
    /// Multi-tile scenery piece.
    LargeScenery(SceneryElement),
    /// Banner.
    Banner,
    /// Defect placeholder.
    Corrupt,
}

impl ElementPayload {
    /// Type tag of the payload.
    #[must_use]
    pub const fn element_type(&self) -> TileElementType {
        match self {
            Self::Surface(_) => TileElementType::Surface,
            Self::Footpath(_) => TileElementType::Footpath,
            Self::Track(_) => TileElementType::Track,
            Self::SmallScenery(_) => TileElementType::SmallScenery,
            Self::Entrance(_) => TileElementType::Entrance,
            Self::Wall(_) => TileElementType::Wall,
            Self::LargeScenery(_) => TileElementType::LargeScenery,
            Self::Banner => TileElementType::Banner,
            Self::Corrupt => TileElementType::Corrupt,
        }
    }
}

/// Terrain surface fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceElement {
    /// Corner slope bitmask.
    pub slope: u8,
    /// Terrain surface style index.
    pub surface_style: u8,
    /// Terrain edge style index.
    pub edge_style: u8,
    /// Water height in height units, zero for dry land.
    pub water_height: u8,
    /// Grass growth stage.
    pub grass_length: u8,
    /// Ownership flag set.
    pub ownership: u8,
    /// Park fence edge bitmask.
    pub park_fences: u8,
}

impl SurfaceElement {
    /// Reports whether the park owns the land.
    #[must_use]
    pub const fn has_ownership(&self) -> bool {
        self.ownership & OWNERSHIP_OWNED != 0
    }

    /// Reports whether the park owns construction rights above the land.
    #[must_use]
    pub const fn has_construction_rights(&self) -> bool {
        self.ownership & OWNERSHIP_CONSTRUCTION_RIGHTS_OWNED != 0
    }
}

/// Footpath fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootpathElement {
    /// Footpath surface object index.
    pub footpath_type: u8,
    /// Whether the path is sloped.
    pub is_sloped: bool,
    /// Whether the path is a queue line.
    pub is_queue: bool,
    /// Connected edge bitmask.
    pub edges: u8,
    /// Connected corner bitmask.
    pub corners: u8,
    /// Ride served by the queue, if any.
    pub ride_index: Option<RideId>,
    /// Bench, bin, lamp or other addition placed on the path.
    pub addition: Option<FootpathAddition>,
}

impl FootpathElement {
    /// Removes the path addition.
    pub fn remove_addition(&mut self) {
        self.addition = None;
    }
}

/// Item placed on a footpath.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootpathAddition {
    /// Path addition object index.
    pub object: u8,
    /// Whether the addition was vandalised.
    pub is_broken: bool,
    /// Per-edge fill state used by bins.
    pub status: FootpathAdditionStatus,
}

/// Per-edge status of a footpath addition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootpathAdditionStatus {
    /// North edge state.
    pub north: u8,
    /// East edge state.
    pub east: u8,
    /// South edge state.
    pub south: u8,
    /// West edge state.
    pub west: u8,
}

/// Ride track fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackElement {
    /// Track piece type.
    pub track_type: u16,
    /// Index of this tile within the track piece.
    pub sequence: u8,
    /// Ride owning the track.
    pub ride: RideId,
    /// Station index the piece belongs to.
    pub station: u8,
    /// Whether the piece has a chain lift.
    pub has_chain_lift: bool,
}

/// Small or large scenery fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneryElement {
    /// Scenery object index.
    pub object: u16,
    /// Primary colour index.
    pub primary_colour: u8,
    /// Secondary colour index.
    pub secondary_colour: u8,
}

/// Entrance or exit fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntranceElement {
    /// Entrance object index.
    pub object: u16,
    /// Index of this tile within the entrance.
    pub sequence: u8,
    /// Ride served by the entrance, `None` for the park entrance.
    pub ride: Option<RideId>,
    /// Station index served by the entrance.
    pub station: u8,
}

/// Wall fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallElement {
    /// Wall object index.
    pub object: u16,
}
