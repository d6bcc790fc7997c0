use thiserror::Error;

use crate::math::{inset, Vec2};

/// Tile id to collision flag. Ids past the end of the table are open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSet {
    solid: Vec<bool>,
}

impl TileSet {
    pub fn new(solid: Vec<bool>) -> Self {
        Self { solid }
    }

    pub fn set_solid(&mut self, tile_id: u32, solid: bool) {
        let index = tile_id as usize;
        if index >= self.solid.len() {
            self.solid.resize(index + 1, false);
        }
        self.solid[index] = solid;
    }

    pub fn is_solid(&self, tile_id: u32) -> bool {
        self.solid.get(tile_id as usize).copied().unwrap_or(false)
    }
}

/// Row-major tile ids, `width * height` long.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    width: u32,
    height: u32,
    tiles: Vec<u32>,
}

impl Layer {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        tiles: Vec<u32>,
    ) -> Result<Self, TilemapError> {
        let name = name.into();
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch {
                layer: name,
                expected,
                actual,
            });
        }
        Ok(Self {
            name,
            width,
            height,
            tiles,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index_of(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: i64, y: i64) -> Option<u32> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch in layer '{layer}': expected {expected}, got {actual}")]
    TileCountMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("tile size must be finite and positive, got {width}x{height}")]
    InvalidTileSize { width: f32, height: f32 },
    #[error("map has no tile layers")]
    NoLayers,
    #[error("layer index {index} out of range (map has {count} layers)")]
    LayerMissing { index: usize, count: usize },
    #[error("no map is loaded")]
    NotLoaded,
}

/// Immutable per-level tile data. Coordinates are world units with tile
/// (0,0) spanning `[0, tile_width) x [0, tile_height)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    tile_width: f32,
    tile_height: f32,
    layers: Vec<Layer>,
    tileset: TileSet,
}

impl TileMap {
    pub fn new(
        tile_width: f32,
        tile_height: f32,
        layers: Vec<Layer>,
        tileset: TileSet,
    ) -> Result<Self, TilemapError> {
        let valid = |size: f32| size.is_finite() && size > 0.0;
        if !valid(tile_width) || !valid(tile_height) {
            return Err(TilemapError::InvalidTileSize {
                width: tile_width,
                height: tile_height,
            });
        }
        if layers.is_empty() {
            return Err(TilemapError::NoLayers);
        }
        Ok(Self {
            tile_width,
            tile_height,
            layers,
            tileset,
        })
    }

    /// Builds a single-layer map from rows of `#` (solid) and `.` (open).
    pub fn from_ascii(
        tile_width: f32,
        tile_height: f32,
        rows: &[&str],
    ) -> Result<Self, TilemapError> {
        let height = rows.len() as u32;
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0) as u32;
        let tiles = rows
            .iter()
            .flat_map(|row| row.chars().map(|cell| u32::from(cell == '#')))
            .collect::<Vec<_>>();
        let layer = Layer::new("ascii", width, height, tiles)?;
        Self::new(
            tile_width,
            tile_height,
            vec![layer],
            TileSet::new(vec![false, true]),
        )
    }

    pub fn tile_width(&self) -> f32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> f32 {
        self.tile_height
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn tileset(&self) -> &TileSet {
        &self.tileset
    }

    pub fn collision_view(&self, layer_index: usize) -> Result<CollisionView<'_>, TilemapError> {
        let layer = self
            .layers
            .get(layer_index)
            .ok_or(TilemapError::LayerMissing {
                index: layer_index,
                count: self.layers.len(),
            })?;
        Ok(CollisionView {
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            layer,
            tileset: &self.tileset,
        })
    }
}

/// One layer of a map bound to its tileset for solidity queries.
#[derive(Debug, Clone, Copy)]
pub struct CollisionView<'a> {
    tile_width: f32,
    tile_height: f32,
    layer: &'a Layer,
    tileset: &'a TileSet,
}

impl<'a> CollisionView<'a> {
    pub fn tile_width(&self) -> f32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> f32 {
        self.tile_height
    }

    pub fn layer(&self) -> &'a Layer {
        self.layer
    }

    /// World size of the layer in world units.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(
            self.layer.width() as f32 * self.tile_width,
            self.layer.height() as f32 * self.tile_height,
        )
    }

    pub fn tile_coord(&self, x: f32, y: f32) -> (i64, i64) {
        (
            (x / self.tile_width).floor() as i64,
            (y / self.tile_height).floor() as i64,
        )
    }

    pub fn tile_center(&self, tile_x: i64, tile_y: i64) -> Vec2 {
        Vec2::new(
            (tile_x as f32 + 0.5) * self.tile_width,
            (tile_y as f32 + 0.5) * self.tile_height,
        )
    }

    /// Solidity of the tile under a world point. Outside the layer is open.
    pub fn is_solid(&self, x: f32, y: f32) -> bool {
        let (tile_x, tile_y) = self.tile_coord(x, y);
        self.is_tile_solid(tile_x, tile_y)
    }

    pub fn is_tile_solid(&self, tile_x: i64, tile_y: i64) -> bool {
        self.layer
            .tile_at(tile_x, tile_y)
            .is_some_and(|tile_id| self.tileset.is_solid(tile_id))
    }

    /// Whether the half-open box `[left, left+width) x [top, top+height)`
    /// overlaps any solid tile. Samples every tile step along the edges plus
    /// the far corners, so boxes up to any size are covered.
    pub fn box_collides(&self, left: f32, top: f32, width: f32, height: f32) -> bool {
        let right = left + width;
        let bottom = top + height;
        let right_in = inset(right);
        let bottom_in = inset(bottom);

        let mut x = left;
        while x < right {
            if self.is_solid(x, top) || self.is_solid(x, bottom_in) {
                return true;
            }
            x += self.tile_width;
        }

        if self.is_solid(right_in, top) || self.is_solid(right_in, bottom_in) {
            return true;
        }

        let mut y = top + self.tile_height;
        while y < bottom {
            if self.is_solid(left, y) || self.is_solid(right_in, y) {
                return true;
            }
            y += self.tile_height;
        }

        false
    }
}
