use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::tilemap::{Layer, TileMap, TileSet, TilemapError};

const COLLISION_PROPERTY: &str = "collision";

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse map json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("map has no tile layers")]
    NoTileLayers,
    #[error("invalid map shape: {0}")]
    Shape(#[from] TilemapError),
}

#[derive(Debug, Deserialize)]
struct TiledMap {
    tilewidth: f32,
    tileheight: f32,
    #[serde(default)]
    layers: Vec<TiledLayer>,
    #[serde(default)]
    tilesets: Vec<TiledTileset>,
}

#[derive(Debug, Deserialize)]
struct TiledLayer {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    data: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct TiledTileset {
    #[serde(default = "default_firstgid")]
    firstgid: u32,
    #[serde(default)]
    tiles: Vec<TiledTile>,
}

#[derive(Debug, Deserialize)]
struct TiledTile {
    id: u32,
    #[serde(default)]
    properties: Vec<TiledProperty>,
}

#[derive(Debug, Deserialize)]
struct TiledProperty {
    name: String,
    #[serde(default)]
    value: Value,
}

fn default_firstgid() -> u32 {
    1
}

pub fn load_tiled_map(path: &Path) -> Result<TileMap, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tiled_map(&raw)
}

/// Builds a [`TileMap`] from Tiled JSON. Layer tile ids stay global ids;
/// the tileset table is keyed by `firstgid + local id`.
pub fn parse_tiled_map(raw: &str) -> Result<TileMap, MapLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let map = serde_path_to_error::deserialize::<_, TiledMap>(&mut deserializer).map_err(
        |error| {
            let path = error.path().to_string();
            MapLoadError::Parse {
                path,
                message: error.into_inner().to_string(),
            }
        },
    )?;

    let mut tileset = TileSet::default();
    for set in &map.tilesets {
        for tile in &set.tiles {
            if tile
                .properties
                .iter()
                .any(|property| property.name == COLLISION_PROPERTY && is_truthy(&property.value))
            {
                tileset.set_solid(set.firstgid + tile.id, true);
            }
        }
    }

    let layers = map
        .layers
        .into_iter()
        .filter(|layer| layer.kind == "tilelayer")
        .map(|layer| Layer::new(layer.name, layer.width, layer.height, layer.data))
        .collect::<Result<Vec<_>, _>>()?;
    if layers.is_empty() {
        return Err(MapLoadError::NoTileLayers);
    }

    Ok(TileMap::new(map.tilewidth, map.tileheight, layers, tileset)?)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}
