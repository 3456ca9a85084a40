use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use parkscript_core::{Command, MapSize, ScriptError};
use parkscript_world::{apply, query, World};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "park";
const SNAPSHOT_VERSION: &str = "v1";

/// Prefix written before the map dimensions and payload.
pub(crate) const SNAPSHOT_HEADER: &str = "park:v1";
const FIELD_DELIMITER: char = ':';

/// Encoded tile data of a whole map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MapSnapshot {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Element bytes of every tile in row-major order.
    pub(crate) tiles: Vec<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    tiles: Vec<Vec<u8>>,
}

/// Reasons a map string cannot be read or applied.
#[derive(Debug, Error)]
pub(crate) enum MapTransferError {
    #[error("map string was empty")]
    Empty,
    #[error("map string is missing the {0} field")]
    MissingField(&'static str),
    #[error("map prefix '{0}' is not supported")]
    InvalidPrefix(String),
    #[error("map version '{0}' is not supported")]
    UnsupportedVersion(String),
    #[error("could not parse map dimensions '{0}'")]
    InvalidDimensions(String),
    #[error("map has {expected} tiles but the payload holds {actual}")]
    TileCount { expected: usize, actual: usize },
    #[error("could not decode map payload")]
    Encoding(#[from] base64::DecodeError),
    #[error("could not parse map payload")]
    Payload(#[from] serde_json::Error),
    #[error("map tile rejected")]
    Tile(#[from] ScriptError),
}

impl MapSnapshot {
    /// Captures the tiles of `world`.
    pub(crate) fn capture(world: &World) -> Self {
        let size = query::map_size(world);
        Self {
            width: size.x(),
            height: size.y(),
            tiles: query::map(world)
                .tiles()
                .map(|tile| tile.data().to_vec())
                .collect(),
        }
    }

    /// Single-line form suitable for pasting.
    pub(crate) fn encode(&self) -> Result<String, MapTransferError> {
        let json = serde_json::to_vec(&Payload {
            tiles: self.tiles.clone(),
        })?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{SNAPSHOT_HEADER}:{}x{}:{encoded}",
            self.width, self.height
        ))
    }

    pub(crate) fn decode(value: &str) -> Result<Self, MapTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MapTransferError::Empty);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(MapTransferError::MissingField("prefix"))?;
        let version = parts
            .next()
            .ok_or(MapTransferError::MissingField("version"))?;
        let dimensions = parts
            .next()
            .ok_or(MapTransferError::MissingField("dimensions"))?;
        let payload = parts
            .next()
            .ok_or(MapTransferError::MissingField("payload"))?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(MapTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(MapTransferError::UnsupportedVersion(version.to_owned()));
        }

        let (width, height) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
        let Payload { tiles } = serde_json::from_slice(&bytes)?;
        let expected = MapSize::new(width, height).tile_count();
        if tiles.len() != expected {
            return Err(MapTransferError::TileCount {
                expected,
                actual: tiles.len(),
            });
        }

        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    /// Replaces the map of `world` with the snapshot.
    ///
    /// Rides and things are cleared along with the old map.
    pub(crate) fn restore(&self, world: &mut World) -> Result<(), MapTransferError> {
        let size = MapSize::new(self.width, self.height);
        let mut events = Vec::new();
        apply(world, Command::ConfigureMap { size }, &mut events);
        let width = self.width as usize;
        for (index, data) in self.tiles.iter().enumerate() {
            let x = (index % width) as i32;
            let y = (index / width) as i32;
            world.map_mut().tile_mut(x, y)?.set_data(data)?;
        }
        Ok(())
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), MapTransferError> {
    let invalid = || MapTransferError::InvalidDimensions(dimensions.to_owned());
    let (width, height) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;
    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}
