//! Tile storage and the handles scripts use to read and edit tiles.

use parkscript_core::{
    ElementPayload, MapSize, ScriptError, SurfaceElement, TileElement,
    OWNERSHIP_CONSTRUCTION_RIGHTS_OWNED, OWNERSHIP_OWNED,
};

use crate::codec::{self, ELEMENT_SIZE};

/// Height at which the terrain of a freshly configured map sits.
pub const DEFAULT_LAND_HEIGHT: u8 = 14;

/// Dense grid of tiles, each owning the encoded bytes of its elements.
#[derive(Clone, Debug)]
pub struct TileMap {
    size: MapSize,
    tiles: Vec<Vec<u8>>,
}

impl TileMap {
    /// Creates a map where every tile holds a single park-owned flat surface.
    #[must_use]
    pub fn new(size: MapSize) -> Self {
        let surface = TileElement::new(
            DEFAULT_LAND_HEIGHT,
            DEFAULT_LAND_HEIGHT,
            ElementPayload::Surface(SurfaceElement {
                ownership: OWNERSHIP_OWNED | OWNERSHIP_CONSTRUCTION_RIGHTS_OWNED,
                ..SurfaceElement::default()
            }),
        );
        let encoded = codec::encode(&surface).to_vec();
        Self {
            size,
            tiles: vec![encoded; size.tile_count()],
        }
    }

    /// Dimensions of the map in tiles.
    #[must_use]
    pub const fn size(&self) -> MapSize {
        self.size
    }

    /// Read handle for the tile at `(x, y)`.
    pub fn tile(&self, x: i32, y: i32) -> Result<Tile<'_>, ScriptError> {
        let index = self.index_of(x, y)?;
        Ok(Tile {
            x,
            y,
            data: &self.tiles[index],
        })
    }

    /// Edit handle for the tile at `(x, y)`.
    pub fn tile_mut(&mut self, x: i32, y: i32) -> Result<TileMut<'_>, ScriptError> {
        let index = self.index_of(x, y)?;
        Ok(TileMut {
            x,
            y,
            data: &mut self.tiles[index],
        })
    }

    /// Iterates over every tile in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile<'_>> {
        let width = self.size.x() as usize;
        self.tiles.iter().enumerate().map(move |(index, data)| Tile {
            x: (index % width) as i32,
            y: (index / width) as i32,
            data,
        })
    }

    pub(crate) fn tiles_mut(&mut self) -> impl Iterator<Item = TileMut<'_>> {
        let width = self.size.x() as usize;
        self.tiles
            .iter_mut()
            .enumerate()
            .map(move |(index, data)| TileMut {
                x: (index % width) as i32,
                y: (index / width) as i32,
                data,
            })
    }

    fn index_of(&self, x: i32, y: i32) -> Result<usize, ScriptError> {
        if !self.size.contains(x, y) {
            return Err(ScriptError::OutOfBounds { x, y });
        }
        Ok(y as usize * self.size.x() as usize + x as usize)
    }
}

/// Read-only view of one tile.
#[derive(Clone, Copy, Debug)]
pub struct Tile<'a> {
    x: i32,
    y: i32,
    data: &'a [u8],
}

impl<'a> Tile<'a> {
    /// Tile x coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Tile y coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Number of elements stacked on the tile.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.data.len() / ELEMENT_SIZE
    }

    /// Decodes the element at `index`.
    pub fn element(&self, index: usize) -> Result<TileElement, ScriptError> {
        decode_at(self.data, index)
    }

    /// Decodes every element on the tile, bottom first.
    pub fn elements(&self) -> Result<Vec<TileElement>, ScriptError> {
        (0..self.num_elements())
            .map(|index| self.element(index))
            .collect()
    }

    /// Encoded bytes of every element on the tile.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// Mutable view of one tile.
#[derive(Debug)]
pub struct TileMut<'a> {
    x: i32,
    y: i32,
    data: &'a mut Vec<u8>,
}

impl TileMut<'_> {
    /// Tile x coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Tile y coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Number of elements stacked on the tile.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.data.len() / ELEMENT_SIZE
    }

    /// Decodes the element at `index`.
    pub fn element(&self, index: usize) -> Result<TileElement, ScriptError> {
        decode_at(self.data.as_slice(), index)
    }

    /// Decodes every element on the tile, bottom first.
    pub fn elements(&self) -> Result<Vec<TileElement>, ScriptError> {
        (0..self.num_elements())
            .map(|index| self.element(index))
            .collect()
    }

    /// Encoded bytes of every element on the tile.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Re-encodes the element at `index` in place.
    pub fn set_element(&mut self, index: usize, element: &TileElement) -> Result<(), ScriptError> {
        let range = self.element_range(index)?;
        self.data[range].copy_from_slice(&codec::encode(element));
        Ok(())
    }

    /// Inserts a zeroed element at `index`, shifting later elements up.
    ///
    /// `index` equal to the element count appends. Returns the decoded new
    /// element, which is always a flat surface at height zero.
    pub fn insert_element(&mut self, index: usize) -> Result<TileElement, ScriptError> {
        let len = self.num_elements();
        if index > len {
            return Err(ScriptError::IndexOutOfRange { index, len });
        }
        let offset = index * ELEMENT_SIZE;
        let _ = self
            .data
            .splice(offset..offset, [0_u8; ELEMENT_SIZE])
            .count();
        self.element(index)
    }

    /// Appends an encoded copy of `element` on top of the stack.
    pub fn push_element(&mut self, element: &TileElement) {
        self.data.extend_from_slice(&codec::encode(element));
    }

    /// Removes the element at `index`, shifting later elements down.
    pub fn remove_element(&mut self, index: usize) -> Result<(), ScriptError> {
        let range = self.element_range(index)?;
        let _ = self.data.drain(range).count();
        Ok(())
    }

    /// Replaces the encoded bytes of the tile.
    ///
    /// The length must be a whole number of elements. Tags are not checked
    /// here; a bad tag surfaces on the next typed read of that element.
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), ScriptError> {
        if data.len() % ELEMENT_SIZE != 0 {
            return Err(ScriptError::InvalidArguments(format!(
                "tile data length {} is not a multiple of {ELEMENT_SIZE}",
                data.len()
            )));
        }
        self.data.clear();
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn element_range(&self, index: usize) -> Result<std::ops::Range<usize>, ScriptError> {
        let len = self.num_elements();
        if index >= len {
            return Err(ScriptError::IndexOutOfRange { index, len });
        }
        let start = index * ELEMENT_SIZE;
        Ok(start..start + ELEMENT_SIZE)
    }
}

fn decode_at(data: &[u8], index: usize) -> Result<TileElement, ScriptError> {
    let len = data.len() / ELEMENT_SIZE;
    if index >= len {
        return Err(ScriptError::IndexOutOfRange { index, len });
    }
    let start = index * ELEMENT_SIZE;
    let raw: &[u8; ELEMENT_SIZE] = data
        .get(start..start + ELEMENT_SIZE)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(ScriptError::IndexOutOfRange { index, len })?;
    codec::decode(index, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkscript_core::{TileElementType, WallElement};

    fn wall(object: u16) -> TileElement {
        TileElement::new(14, 18, ElementPayload::Wall(WallElement { object }))
    }

    #[test]
    fn tile_handle_echoes_coordinates() {
        let map = TileMap::new(MapSize::new(5, 4));
        for (x, y) in [(0, 0), (4, 0), (0, 3), (2, 1)] {
            let tile = map.tile(x, y).expect("in bounds");
            assert_eq!((tile.x(), tile.y()), (x, y));
        }
        assert_eq!(
            map.tile(5, 0).err(),
            Some(ScriptError::OutOfBounds { x: 5, y: 0 })
        );
        assert!(map.tile(0, -1).is_err());
    }

    #[test]
    fn fresh_tile_holds_owned_surface() {
        let map = TileMap::new(MapSize::new(2, 2));
        let tile = map.tile(1, 1).expect("in bounds");
        assert_eq!(tile.num_elements(), 1);
        let surface = tile.element(0).expect("decodes");
        let fields = surface.as_surface().expect("surface");
        assert!(fields.has_ownership());
        assert!(fields.has_construction_rights());
        assert_eq!(surface.base_z, DEFAULT_LAND_HEIGHT);
    }

    #[test]
    fn insert_then_remove_restores_tile() {
        let mut map = TileMap::new(MapSize::new(1, 1));
        let mut tile = map.tile_mut(0, 0).expect("in bounds");
        tile.push_element(&wall(7));
        let before = tile.data().to_vec();

        let inserted = tile.insert_element(1).expect("insert");
        assert_eq!(inserted.element_type(), TileElementType::Surface);
        assert_eq!(tile.num_elements(), 3);
        assert_eq!(tile.element(2).expect("shifted"), wall(7));

        tile.remove_element(1).expect("remove");
        assert_eq!(tile.data(), before.as_slice());
    }

    #[test]
    fn insert_at_count_appends() {
        let mut map = TileMap::new(MapSize::new(1, 1));
        let mut tile = map.tile_mut(0, 0).expect("in bounds");
        let _ = tile.insert_element(1).expect("append");
        assert_eq!(tile.num_elements(), 2);
        assert_eq!(
            tile.insert_element(4).err(),
            Some(ScriptError::IndexOutOfRange { index: 4, len: 2 })
        );
    }

    #[test]
    fn huge_indices_are_out_of_range() {
        let mut map = TileMap::new(MapSize::new(1, 1));
        let tile = map.tile(0, 0).expect("in bounds");
        assert_eq!(
            tile.element(usize::MAX).err(),
            Some(ScriptError::IndexOutOfRange {
                index: usize::MAX,
                len: 1
            })
        );

        let mut tile = map.tile_mut(0, 0).expect("in bounds");
        assert_eq!(
            tile.element(usize::MAX).err(),
            Some(ScriptError::IndexOutOfRange {
                index: usize::MAX,
                len: 1
            })
        );
        assert!(tile.remove_element(usize::MAX).is_err());
        assert!(tile.insert_element(usize::MAX).is_err());
        assert!(tile.set_element(usize::MAX, &wall(1)).is_err());
        assert_eq!(tile.num_elements(), 1);
    }

    #[test]
    fn raw_write_must_be_whole_elements() {
        let mut map = TileMap::new(MapSize::new(1, 1));
        let mut tile = map.tile_mut(0, 0).expect("in bounds");
        assert!(matches!(
            tile.set_data(&[0; 17]),
            Err(ScriptError::InvalidArguments(_))
        ));
        assert_eq!(tile.num_elements(), 1);
    }

    #[test]
    fn raw_write_with_bad_tag_fails_on_typed_read() {
        let mut map = TileMap::new(MapSize::new(1, 1));
        let mut tile = map.tile_mut(0, 0).expect("in bounds");
        let mut raw = vec![0_u8; ELEMENT_SIZE * 2];
        raw[ELEMENT_SIZE] = 0xee;
        tile.set_data(&raw).expect("length is valid");

        assert!(tile.element(0).is_ok());
        assert_eq!(
            tile.element(1).err(),
            Some(ScriptError::InvalidElementTag { index: 1, tag: 0xee })
        );
        assert!(tile.elements().is_err());
    }

    #[test]
    fn set_element_is_visible_through_raw_bytes() {
        let mut map = TileMap::new(MapSize::new(1, 1));
        let mut tile = map.tile_mut(0, 0).expect("in bounds");
        tile.set_element(0, &wall(300)).expect("in range");
        assert_eq!(tile.data(), codec::encode(&wall(300)).as_slice());
        assert!(tile.set_element(1, &wall(1)).is_err());
    }
}
